//! Error types for the dashboard.
//!
//! Every failure the dashboard can hit is one of these variants. None of them is
//! fatal: the controller converts fetch failures into an empty table and the
//! HTTP layer turns every variant into a message for the page.

use serde::Serialize;
use thiserror::Error;

/// Result type for dashboard operations.
pub type Result<T> = std::result::Result<T, DashboardError>;

/// How a message is shown on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    /// The secret entry holding the service-account key is absent
    #[error("Google credentials not found: {0}")]
    CredentialMissing(String),

    /// The secret entry exists but is not a service-account key
    #[error("Google credentials could not be parsed: {0}")]
    CredentialInvalid(String),

    #[error(
        "Spreadsheet with ID '{0}' not found. Check the spreadsheet ID and permissions."
    )]
    SpreadsheetNotFound(String),

    #[error("Worksheet '{0}' not found in the spreadsheet. Verify the worksheet name.")]
    WorksheetNotFound(String),

    /// The Sheets API answered with an error, or did not answer in time
    #[error("Google Sheets API error fetching data from '{worksheet}': {message}")]
    UpstreamApi { worksheet: String, message: String },

    #[error("Unexpected error connecting to Google Sheets: {0}")]
    UnexpectedTransport(String),

    #[error("No data found in worksheet '{0}'.")]
    NoDataFound(String),

    #[error(
        "Month data ('{column}' column) not found. Available columns are: {}",
        available.join(", ")
    )]
    MonthColumnMissing {
        column: String,
        available: Vec<String>,
    },

    #[error(
        "The following required columns are missing: {}. Available columns: {}",
        missing.join(", "),
        available.join(", ")
    )]
    MissingRequiredColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("{0}")]
    IncompleteCriteria(String),

    /// Never says which of month, id or name failed
    #[error("Verification failed. Please check your details.")]
    VerificationFailed,
}

impl DashboardError {
    /// Conditions that leave the page usable are warnings; the rest are errors.
    pub fn severity(&self) -> Severity {
        match self {
            DashboardError::NoDataFound(_)
            | DashboardError::MonthColumnMissing { .. }
            | DashboardError::IncompleteCriteria(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }
}
