//! Google Sheets access.
//!
//! [`SheetSource`] is the seam between the dashboard and wherever the rows
//! come from. [`GoogleSheetsClient`] reads a worksheet through the Sheets v4
//! API with a service-account key; [`MemorySource`] serves fixed rows.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use google_sheets4::{Sheets, hyper_rustls, yup_oauth2};
use hyper_util::{client::legacy::connect::HttpConnector, rt::TokioExecutor};

use crate::config::DashboardConfig;
use crate::credentials::load_credentials;
use crate::error::{DashboardError, Result};

/// OAuth scopes requested for the service account.
pub const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/drive.file",
];

type Hub = Sheets<hyper_rustls::HttpsConnector<HttpConnector>>;

/// Somewhere a worksheet can be read from.
pub trait SheetSource: Send + Sync {
    /// Name of the worksheet, used in messages.
    fn worksheet(&self) -> &str;

    /// All rows of the worksheet as text, header row first.
    fn fetch_rows(&self) -> impl Future<Output = Result<Vec<Vec<String>>>> + Send;
}

/// Which call an API error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// Opening the spreadsheet
    Spreadsheet,
    /// Reading the worksheet values
    Values,
}

/// Reads one worksheet of one spreadsheet. A fresh authenticated connection is
/// built for every fetch.
#[derive(Debug, Clone)]
pub struct GoogleSheetsClient {
    spreadsheet_id: String,
    worksheet: String,
    secrets_path: PathBuf,
    credentials_entry: String,
    timeout: Duration,
}

impl GoogleSheetsClient {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        worksheet: impl Into<String>,
        secrets_path: impl Into<PathBuf>,
        credentials_entry: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            worksheet: worksheet.into(),
            secrets_path: secrets_path.into(),
            credentials_entry: credentials_entry.into(),
            timeout,
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(
            config.spreadsheet_id.clone(),
            config.worksheet.clone(),
            config.secrets_path.clone(),
            config.credentials_entry.clone(),
            config.fetch_timeout(),
        )
    }

    async fn connect(&self) -> Result<Hub> {
        let key = load_credentials(&self.secrets_path, &self.credentials_entry)?;

        let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|e| {
                DashboardError::UnexpectedTransport(format!("failed to build authenticator: {}", e))
            })?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| DashboardError::UnexpectedTransport(format!("no TLS roots: {}", e)))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = hyper_util::client::legacy::Client::builder(TokioExecutor::new()).build(connector);

        Ok(Sheets::new(client, auth))
    }

    async fn fetch(&self) -> Result<Vec<Vec<String>>> {
        let hub = self.connect().await?;

        let opened = within(
            self.timeout,
            &self.worksheet,
            hub.spreadsheets()
                .get(&self.spreadsheet_id)
                .add_scopes(SCOPES)
                .doit(),
        )
        .await?;
        let (_, spreadsheet) = opened.map_err(|e| {
            classify_error(e, FetchStage::Spreadsheet, &self.spreadsheet_id, &self.worksheet)
        })?;

        let titles: Vec<String> = spreadsheet
            .sheets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|sheet| sheet.properties.and_then(|p| p.title))
            .collect();
        if !titles.iter().any(|t| *t == self.worksheet) {
            log::warn!(
                "Worksheet '{}' not in spreadsheet (found: {:?})",
                self.worksheet,
                titles
            );
            return Err(DashboardError::WorksheetNotFound(self.worksheet.clone()));
        }

        let range = quote_sheet_name(&self.worksheet);
        let read = within(
            self.timeout,
            &self.worksheet,
            hub.spreadsheets()
                .values_get(&self.spreadsheet_id, &range)
                .add_scopes(SCOPES)
                .doit(),
        )
        .await?;
        let (_, values) = read.map_err(|e| {
            classify_error(e, FetchStage::Values, &self.spreadsheet_id, &self.worksheet)
        })?;

        Ok(values
            .values
            .unwrap_or_default()
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }
}

impl SheetSource for GoogleSheetsClient {
    fn worksheet(&self) -> &str {
        &self.worksheet
    }

    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>> {
        log::info!(
            "Fetching worksheet '{}' from spreadsheet {}",
            self.worksheet,
            self.spreadsheet_id
        );
        let rows = self.fetch().await;
        match &rows {
            Ok(rows) => log::info!("Fetched {} rows from '{}'", rows.len(), self.worksheet),
            Err(e) => log::error!("Fetch from '{}' failed: {}", self.worksheet, e),
        }
        rows
    }
}

/// Run one Sheets call, giving up after `limit`. Expiry is an upstream error.
pub async fn within<F: Future>(limit: Duration, worksheet: &str, call: F) -> Result<F::Output> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| DashboardError::UpstreamApi {
            worksheet: worksheet.to_string(),
            message: format!("no response within {}s", limit.as_secs()),
        })
}

/// A1 range covering a whole worksheet: the quoted sheet name.
pub fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

/// Render a JSON cell value as the text the sheet shows.
pub fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Map a Sheets API error onto the dashboard's error kinds.
pub fn classify_error(
    err: google_sheets4::Error,
    stage: FetchStage,
    spreadsheet_id: &str,
    worksheet: &str,
) -> DashboardError {
    use google_sheets4::Error;

    let upstream = |message: String| DashboardError::UpstreamApi {
        worksheet: worksheet.to_string(),
        message,
    };

    match err {
        Error::BadRequest(body) => {
            let code = body["error"]["code"].as_u64().unwrap_or(0);
            let message = body["error"]["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            match (stage, code) {
                (FetchStage::Spreadsheet, 404) => {
                    DashboardError::SpreadsheetNotFound(spreadsheet_id.to_string())
                }
                (FetchStage::Values, 400) if message.contains("Unable to parse range") => {
                    DashboardError::WorksheetNotFound(worksheet.to_string())
                }
                _ => upstream(format!("{} ({})", message, code)),
            }
        }
        Error::Failure(response) => {
            classify_status(response.status().as_u16(), stage, spreadsheet_id, worksheet)
        }
        Error::MissingToken(e) => upstream(format!("authentication failed: {}", e)),
        other => DashboardError::UnexpectedTransport(other.to_string()),
    }
}

/// Map a bare HTTP failure status onto the dashboard's error kinds.
pub fn classify_status(
    status: u16,
    stage: FetchStage,
    spreadsheet_id: &str,
    worksheet: &str,
) -> DashboardError {
    match (stage, status) {
        (FetchStage::Spreadsheet, 404) => {
            DashboardError::SpreadsheetNotFound(spreadsheet_id.to_string())
        }
        _ => DashboardError::UpstreamApi {
            worksheet: worksheet.to_string(),
            message: format!("HTTP {}", status),
        },
    }
}

/// In-memory worksheet. Serves whatever rows (or error) it currently holds and
/// counts how often it was read.
#[derive(Debug)]
pub struct MemorySource {
    worksheet: String,
    rows: Mutex<Result<Vec<Vec<String>>>>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new(worksheet: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            worksheet: worksheet.into(),
            rows: Mutex::new(Ok(rows)),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing(worksheet: impl Into<String>, err: DashboardError) -> Self {
        Self {
            worksheet: worksheet.into(),
            rows: Mutex::new(Err(err)),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Replace what the next fetch returns.
    pub fn set_rows(&self, rows: Vec<Vec<String>>) {
        if let Ok(mut guard) = self.rows.lock() {
            *guard = Ok(rows);
        }
    }

    pub fn set_error(&self, err: DashboardError) {
        if let Ok(mut guard) = self.rows.lock() {
            *guard = Err(err);
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SheetSource for MemorySource {
    fn worksheet(&self) -> &str {
        &self.worksheet
    }

    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.rows.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => Err(DashboardError::UnexpectedTransport(
                "in-memory source poisoned".to_string(),
            )),
        }
    }
}
