//! Per-session dashboard controller.
//!
//! A [`Dashboard`] owns one user's cached worksheet and the result of their
//! last successful verification. It moves between three states:
//!
//! - **Uninitialized**: nothing fetched yet
//! - **Loaded**: a table is cached (possibly empty, if the fetch failed)
//! - **Verified**: a lookup matched and its summary is held
//!
//! The cache is only ever replaced as a whole, by [`Dashboard::refresh`],
//! [`Dashboard::replace`] or [`Dashboard::invalidate`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ColumnSchema;
use crate::error::{DashboardError, Result};
use crate::report::{self, FilterCriteria, StudentSummary};
use crate::sheets::SheetSource;
use crate::table::{Table, normalize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DashboardState {
    Uninitialized,
    Loaded,
    Verified,
}

/// A fetched worksheet and what happened while fetching it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub table: Arc<Table>,
    pub worksheet: String,
    pub fetched_at: DateTime<Utc>,
    /// Why the table is empty, if the fetch or normalization failed
    pub load_error: Option<DashboardError>,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    schema: ColumnSchema,
    snapshot: Option<Snapshot>,
    verified: Option<StudentSummary>,
}

impl Dashboard {
    pub fn new(schema: ColumnSchema) -> Self {
        Self {
            schema,
            snapshot: None,
            verified: None,
        }
    }

    pub fn state(&self) -> DashboardState {
        match (&self.snapshot, &self.verified) {
            (None, _) => DashboardState::Uninitialized,
            (Some(_), None) => DashboardState::Loaded,
            (Some(_), Some(_)) => DashboardState::Verified,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn table(&self) -> Option<&Table> {
        self.snapshot.as_ref().map(|s| s.table.as_ref())
    }

    pub fn summary(&self) -> Option<&StudentSummary> {
        self.verified.as_ref()
    }

    /// Fetch the worksheet if nothing is cached yet. Returns the error of the
    /// load that produced the current cache, if any.
    pub async fn ensure_loaded<S: SheetSource>(&mut self, source: &S) -> Option<DashboardError> {
        if self.snapshot.is_none() {
            // The error is kept in the snapshot and returned below.
            let _ = self.refresh(source).await;
        }
        self.snapshot.as_ref().and_then(|s| s.load_error.clone())
    }

    /// Re-fetch the worksheet and replace the cache, whatever the current
    /// state. On failure an empty table is cached and the error returned.
    pub async fn refresh<S: SheetSource>(&mut self, source: &S) -> Result<()> {
        let worksheet = source.worksheet().to_string();
        let loaded = match source.fetch_rows().await {
            Ok(raw) => normalize(raw, &worksheet),
            Err(e) => Err(e),
        };

        let (table, load_error) = match loaded {
            Ok(table) => (table, None),
            Err(e) => {
                log::warn!("Caching empty table for '{}': {}", worksheet, e);
                (Table::empty(), Some(e))
            }
        };

        self.install(Snapshot {
            table: Arc::new(table),
            worksheet,
            fetched_at: Utc::now(),
            load_error: load_error.clone(),
        });

        match load_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Put an already-normalized table in the cache.
    pub fn replace(&mut self, table: Table, worksheet: impl Into<String>) {
        self.install(Snapshot {
            table: Arc::new(table),
            worksheet: worksheet.into(),
            fetched_at: Utc::now(),
            load_error: None,
        });
    }

    /// Drop the cache; the next [`Dashboard::ensure_loaded`] fetches again.
    pub fn invalidate(&mut self) {
        self.snapshot = None;
        self.verified = None;
    }

    fn install(&mut self, snapshot: Snapshot) {
        log::debug!(
            "Cached {} rows from '{}'",
            snapshot.table.len(),
            snapshot.worksheet
        );
        self.snapshot = Some(snapshot);
        self.verified = None;
    }

    /// The cached snapshot if it holds rows. An empty cache reports the error
    /// that emptied it, or `NoDataFound` if the worksheet really had no rows.
    fn loaded_table(&self) -> Result<&Snapshot> {
        match &self.snapshot {
            Some(snapshot) if !snapshot.table.is_empty() => Ok(snapshot),
            Some(Snapshot {
                load_error: Some(err),
                ..
            }) => Err(err.clone()),
            Some(snapshot) => Err(DashboardError::NoDataFound(snapshot.worksheet.clone())),
            None => Err(DashboardError::NoDataFound(String::new())),
        }
    }

    /// Months the student can choose from.
    pub fn months(&self) -> Result<Vec<String>> {
        let snapshot = self.loaded_table()?;
        report::month_options(&snapshot.table, &self.schema)
    }

    /// Look the student up in the cached table.
    ///
    /// A match moves the dashboard to Verified; any failure leaves it Loaded.
    pub fn verify(&mut self, criteria: &FilterCriteria) -> Result<&StudentSummary> {
        self.verified = None;
        let snapshot = self.loaded_table()?;
        let summary = report::summarize(&snapshot.table, &self.schema, criteria)?;
        log::info!(
            "Verified lookup for month {} ({} sessions)",
            summary.month,
            summary.sessions.len()
        );
        Ok(self.verified.insert(summary))
    }

    /// Validate raw form input, then [`Dashboard::verify`] it.
    pub fn verify_input(
        &mut self,
        month: &str,
        student_id: &str,
        name_fragment: &str,
    ) -> Result<&StudentSummary> {
        self.verified = None;
        let criteria = FilterCriteria::new(month, student_id, name_fragment)?;
        self.verify(&criteria)
    }
}
