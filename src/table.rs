//! Worksheet normalization.
//!
//! The Sheets API hands back a ragged grid of strings: blank or repeated
//! headers, rows trimmed of trailing blanks, merged cells that show up as empty
//! strings below their first row. [`normalize`] turns that into a [`Table`]
//! with resolved headers, forward-filled cells and a numeric hours column.

use serde::Serialize;

use crate::error::{DashboardError, Result};

/// Header used for blank header cells.
pub const UNNAMED_HEADER: &str = "Unnamed";

/// Name of the column coerced to numbers during normalization.
pub const HOURS_COLUMN: &str = "Hr";

/// A single normalized cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Missing,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text as shown on the page; missing cells render empty.
    pub fn display(&self) -> String {
        match self {
            Cell::Missing => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Parse an hours value. Anything that is not a finite number counts as 0.
pub fn parse_hours(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

/// Resolve raw header cells into column names.
///
/// Headers are trimmed and blanks become [`UNNAMED_HEADER`]. A header seen
/// before gets its 0-based occurrence count appended, so the first occurrence
/// keeps the bare name, the second gets `1`, the third `2`, and so on. The
/// suffixed names are not checked against other headers.
pub fn resolve_headers(raw: &[String]) -> Vec<String> {
    let mut seen: Vec<(String, usize)> = Vec::new();
    raw.iter()
        .map(|header| {
            let trimmed = header.trim();
            let base = if trimmed.is_empty() {
                UNNAMED_HEADER.to_string()
            } else {
                trimmed.to_string()
            };

            let count = match seen.iter_mut().find(|(name, _)| *name == base) {
                Some((_, n)) => {
                    let current = *n;
                    *n += 1;
                    current
                }
                None => {
                    seen.push((base.clone(), 1));
                    0
                }
            };

            if count == 0 {
                base
            } else {
                format!("{}{}", base, count)
            }
        })
        .collect()
}

/// A normalized worksheet: resolved headers plus rows aligned with them.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from resolved headers and raw data rows.
    ///
    /// Short rows are padded with missing cells and cells past the last header
    /// are dropped. Empty strings become [`Cell::Missing`].
    pub fn from_rows(headers: Vec<String>, data: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = data
            .into_iter()
            .map(|raw_row| {
                let mut row: Vec<Cell> = raw_row
                    .into_iter()
                    .take(width)
                    .map(|value| {
                        if value.is_empty() {
                            Cell::Missing
                        } else {
                            Cell::Text(value)
                        }
                    })
                    .collect();
                row.resize(width, Cell::Missing);
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column with this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of the named column, top to bottom.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Cell> + use<'a>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Replace each missing cell with the nearest non-missing value above it in
    /// the same column. Leading missing cells stay missing.
    pub fn forward_fill(&mut self) {
        for col in 0..self.headers.len() {
            let mut last: Option<Cell> = None;
            for row in self.rows.iter_mut() {
                if row[col].is_missing() {
                    if let Some(prev) = &last {
                        row[col] = prev.clone();
                    }
                } else {
                    last = Some(row[col].clone());
                }
            }
        }
    }

    /// Coerce every cell of `column` to a number, 0 when it does not parse.
    /// Returns false if the column does not exist.
    pub fn coerce_numeric(&mut self, column: &str) -> bool {
        let Some(idx) = self.column_index(column) else {
            return false;
        };
        for row in self.rows.iter_mut() {
            let value = match &row[idx] {
                Cell::Number(n) => *n,
                Cell::Text(s) => parse_hours(s),
                Cell::Missing => 0.0,
            };
            row[idx] = Cell::Number(value);
        }
        true
    }

    /// Keep only the rows for which `keep` returns true.
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Cell]) -> bool,
    {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|r| keep(r.as_slice())).cloned().collect(),
        }
    }

    /// Render the table back to a raw grid, header row first.
    pub fn to_raw(&self) -> Vec<Vec<String>> {
        let mut raw = Vec::with_capacity(self.rows.len() + 1);
        raw.push(self.headers.clone());
        raw.extend(
            self.rows
                .iter()
                .map(|row| row.iter().map(Cell::display).collect()),
        );
        raw
    }
}

/// Normalize a raw worksheet grid into a [`Table`].
///
/// An empty grid is reported as [`DashboardError::NoDataFound`]; callers keep
/// an empty table in that case.
pub fn normalize(raw: Vec<Vec<String>>, worksheet: &str) -> Result<Table> {
    let mut rows = raw.into_iter();
    let Some(header_row) = rows.next() else {
        return Err(DashboardError::NoDataFound(worksheet.to_string()));
    };

    let headers = resolve_headers(&header_row);
    let mut table = Table::from_rows(headers, rows.collect());
    table.forward_fill();
    table.coerce_numeric(HOURS_COLUMN);
    Ok(table)
}
