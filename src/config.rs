// Dashboard configuration
// Loaded from dashboard.toml (or the path given on the command line)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Spreadsheet the dashboard reads from
pub const DEFAULT_SPREADSHEET_ID: &str = "17_Slyn6u0G6oHSzzXIpuuxPhzxx4ayOKYkXfQTLtk-Y";
pub const DEFAULT_WORKSHEET: &str = "Student Data";
pub const DEFAULT_CREDENTIALS_ENTRY: &str = "google_credentials_new_project";
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.toml";

/// Header names the dashboard looks for in the worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSchema {
    pub month: String,
    pub student_id: String,
    pub student_name: String,
    pub date: String,
    pub subject: String,
    pub hours: String,
    pub teacher: String,
    pub chapter: String,
    pub class_type: String,
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self {
            month: "MM".to_string(),
            student_id: "Student ID".to_string(),
            student_name: "Student".to_string(),
            date: "Date".to_string(),
            subject: "Subject".to_string(),
            hours: "Hr".to_string(),
            teacher: "Teachers Name".to_string(),
            chapter: "Chapter taken".to_string(),
            class_type: "Type of class".to_string(),
        }
    }
}

impl ColumnSchema {
    /// The columns shown for a verified student, in display order.
    pub fn required(&self) -> [&str; 6] {
        [
            self.date.as_str(),
            self.subject.as_str(),
            self.hours.as_str(),
            self.teacher.as_str(),
            self.chapter.as_str(),
            self.class_type.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Address the HTTP server listens on
    pub bind_addr: String,

    pub spreadsheet_id: String,
    pub worksheet: String,

    /// Streamlit-style secrets file holding the service-account key
    pub secrets_path: PathBuf,

    /// Table in the secrets file whose `data` field is the key JSON
    pub credentials_entry: String,

    /// Upper bound for each Sheets API call
    pub fetch_timeout_secs: u64,

    /// Idle sessions older than this are dropped
    pub session_ttl_secs: u64,

    /// Local files served under /static
    pub static_dir: PathBuf,

    pub title: String,
    pub logo_url: Option<String>,

    pub columns: ColumnSchema,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8501".to_string(),
            spreadsheet_id: DEFAULT_SPREADSHEET_ID.to_string(),
            worksheet: DEFAULT_WORKSHEET.to_string(),
            secrets_path: PathBuf::from("secrets.toml"),
            credentials_entry: DEFAULT_CREDENTIALS_ENTRY.to_string(),
            fetch_timeout_secs: 30,
            session_ttl_secs: 24 * 60 * 60,
            static_dir: PathBuf::from("static"),
            title: "Angle Belearn: Student Dashboard".to_string(),
            logo_url: Some("https://anglebelearn.kayool.com/assets/logo/angle_170x50.png".to_string()),
            columns: ColumnSchema::default(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is not an error: the built-in defaults are returned. A
    /// file that exists but cannot be read or parsed is.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!(
                "No config file at {}, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        Self::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
