//! Student lookup and hour totals.
//!
//! Given a normalized [`Table`] and a student's [`FilterCriteria`], select the
//! student's rows for one month, check the display columns are present and
//! build a [`StudentSummary`] with total and per-subject hours.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::ColumnSchema;
use crate::error::{DashboardError, Result};
use crate::table::{Cell, Table};

/// Shortest name fragment accepted for verification.
pub const MIN_NAME_FRAGMENT: usize = 4;

/// What the student typed in: month, id and part of their name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    month: String,
    student_id: String,
    name_fragment: String,
}

impl FilterCriteria {
    /// Build criteria from raw form input.
    ///
    /// The id and name fragment are trimmed and lowercased; the month is kept
    /// as selected. Fails with `IncompleteCriteria` if the month or id is empty
    /// or the name fragment is shorter than [`MIN_NAME_FRAGMENT`] characters.
    pub fn new(month: &str, student_id: &str, name_fragment: &str) -> Result<Self> {
        let student_id = student_id.trim().to_lowercase();
        let name_fragment = name_fragment.trim().to_lowercase();

        if month.is_empty() {
            return Err(DashboardError::IncompleteCriteria(
                "Please select a month.".to_string(),
            ));
        }
        if student_id.is_empty() {
            return Err(DashboardError::IncompleteCriteria(
                "Please enter your Student ID.".to_string(),
            ));
        }
        if name_fragment.chars().count() < MIN_NAME_FRAGMENT {
            return Err(DashboardError::IncompleteCriteria(format!(
                "Please enter at least {} characters of your name.",
                MIN_NAME_FRAGMENT
            )));
        }

        Ok(Self {
            month: month.to_string(),
            student_id,
            name_fragment,
        })
    }

    pub fn month(&self) -> &str {
        &self.month
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn name_fragment(&self) -> &str {
        &self.name_fragment
    }
}

/// One class session of a verified student, projected onto the display columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSession {
    pub date: String,
    pub subject: String,
    pub hours: f64,
    pub teacher: String,
    pub chapter: String,
    pub class_type: String,
}

/// One row of the subject breakdown; the sum is labelled "Total Hours".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectHours {
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Total Hours")]
    pub total_hours: f64,
}

/// Everything shown to a verified student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub student_name: String,
    pub month: String,
    /// Display column names, in the order of the [`ClassSession`] fields
    pub columns: Vec<String>,
    pub sessions: Vec<ClassSession>,
    pub total_hours: f64,
    pub subject_hours: Vec<SubjectHours>,
}

impl StudentSummary {
    /// Total hours with two decimals.
    pub fn total_hours_display(&self) -> String {
        format!("{:.2}", self.total_hours)
    }

    pub fn total_hours_line(&self) -> String {
        format!(
            "Total Hours for {}th month: {}",
            self.month,
            self.total_hours_display()
        )
    }

    pub fn welcome_line(&self) -> String {
        format!("Welcome, {}!", self.student_name)
    }
}

/// Sorted distinct values of the month column; missing cells are skipped.
pub fn month_options(table: &Table, schema: &ColumnSchema) -> Result<Vec<String>> {
    let cells = table
        .column(&schema.month)
        .ok_or_else(|| DashboardError::MonthColumnMissing {
            column: schema.month.clone(),
            available: table.headers().to_vec(),
        })?;

    let months: BTreeSet<String> = cells
        .filter(|c| !c.is_missing())
        .map(Cell::display)
        .collect();
    Ok(months.into_iter().collect())
}

fn missing_columns(table: &Table, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .filter(|name| !table.has_column(name))
        .map(|name| name.to_string())
        .collect()
}

fn require_columns(table: &Table, names: &[&str]) -> Result<()> {
    let missing = missing_columns(table, names);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DashboardError::MissingRequiredColumns {
            missing,
            available: table.headers().to_vec(),
        })
    }
}

/// Rows matching all three criteria.
///
/// Month must match exactly, the id cell (trimmed, lowercased) must equal the
/// id and the name cell (lowercased) must contain the fragment. Missing cells
/// never match.
pub fn select_rows(table: &Table, schema: &ColumnSchema, criteria: &FilterCriteria) -> Result<Table> {
    let Some(month_idx) = table.column_index(&schema.month) else {
        return Err(DashboardError::MonthColumnMissing {
            column: schema.month.clone(),
            available: table.headers().to_vec(),
        });
    };
    let (Some(id_idx), Some(name_idx)) = (
        table.column_index(&schema.student_id),
        table.column_index(&schema.student_name),
    ) else {
        return Err(DashboardError::MissingRequiredColumns {
            missing: missing_columns(
                table,
                &[schema.student_id.as_str(), schema.student_name.as_str()],
            ),
            available: table.headers().to_vec(),
        });
    };

    Ok(table.filter_rows(|row| {
        let month_matches = !row[month_idx].is_missing() && row[month_idx].display() == criteria.month;
        let id_matches = match &row[id_idx] {
            Cell::Missing => false,
            cell => cell.display().trim().to_lowercase() == criteria.student_id,
        };
        let name_matches = match &row[name_idx] {
            Cell::Missing => false,
            cell => cell.display().to_lowercase().contains(&criteria.name_fragment),
        };
        month_matches && id_matches && name_matches
    }))
}

/// Look up a student and total their hours for the selected month.
///
/// An empty match is always `VerificationFailed`, whichever criterion failed.
pub fn summarize(
    table: &Table,
    schema: &ColumnSchema,
    criteria: &FilterCriteria,
) -> Result<StudentSummary> {
    let matched = select_rows(table, schema, criteria)?;
    if matched.is_empty() {
        return Err(DashboardError::VerificationFailed);
    }

    let student_name = matched
        .cell(0, &schema.student_name)
        .map(Cell::display)
        .unwrap_or_default();

    let required = schema.required();
    require_columns(&matched, &required)?;

    let text = |row: usize, column: &str| {
        matched
            .cell(row, column)
            .map(Cell::display)
            .unwrap_or_default()
    };

    let sessions: Vec<ClassSession> = (0..matched.len())
        .map(|row| ClassSession {
            date: text(row, &schema.date),
            subject: text(row, &schema.subject),
            hours: matched
                .cell(row, &schema.hours)
                .map(cell_hours)
                .unwrap_or(0.0),
            teacher: text(row, &schema.teacher),
            chapter: text(row, &schema.chapter),
            class_type: text(row, &schema.class_type),
        })
        .collect();

    let total_hours = sessions.iter().map(|s| s.hours).sum();
    let subject_hours = subject_totals(&matched, schema);

    Ok(StudentSummary {
        student_name,
        month: criteria.month.clone(),
        columns: required.iter().map(|c| c.to_string()).collect(),
        sessions,
        total_hours,
        subject_hours,
    })
}

fn cell_hours(cell: &Cell) -> f64 {
    match cell {
        Cell::Number(n) => *n,
        Cell::Text(s) => crate::table::parse_hours(s),
        Cell::Missing => 0.0,
    }
}

/// Hours summed per subject, one entry per distinct subject, sorted by subject.
/// Rows without a subject are left out.
fn subject_totals(matched: &Table, schema: &ColumnSchema) -> Vec<SubjectHours> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for row in 0..matched.len() {
        let Some(subject) = matched.cell(row, &schema.subject) else {
            continue;
        };
        if subject.is_missing() {
            continue;
        }
        let hours = matched.cell(row, &schema.hours).map(cell_hours).unwrap_or(0.0);
        *totals.entry(subject.display()).or_insert(0.0) += hours;
    }

    totals
        .into_iter()
        .map(|(subject, total_hours)| SubjectHours {
            subject,
            total_hours,
        })
        .collect()
}
