use std::env;
use std::path::PathBuf;

use student_dashboard::app;
use student_dashboard::config::{DEFAULT_CONFIG_FILE, DashboardConfig};

/// Main entry point for the dashboard server
///
/// The only argument is an optional path to the TOML config file; without it
/// `dashboard.toml` in the working directory is used if present.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = DashboardConfig::load(&config_path)?;

    log::info!(
        "Serving worksheet '{}' of spreadsheet {}",
        config.worksheet,
        config.spreadsheet_id
    );

    app::run(config).await
}
