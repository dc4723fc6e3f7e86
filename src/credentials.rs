//! Service-account credential loading.
//!
//! Credentials live in a TOML secrets file laid out like a Streamlit
//! `secrets.toml`: one table per secret, with the service-account key JSON in
//! its `data` field. A table that spells out the key fields directly is
//! accepted too.

use std::fs;
use std::path::{Path, PathBuf};

use google_sheets4::yup_oauth2::ServiceAccountKey;

use crate::error::{DashboardError, Result};

/// A parsed secrets file.
#[derive(Debug, Clone, Default)]
pub struct SecretStore {
    source: Option<PathBuf>,
    table: toml::Table,
}

impl SecretStore {
    /// Read and parse a secrets file.
    ///
    /// An unreadable or malformed file yields `CredentialMissing`, since no
    /// entry can be found in it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            DashboardError::CredentialMissing(format!(
                "cannot read secrets file {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut store = Self::from_toml(&content).map_err(|e| match e {
            DashboardError::CredentialMissing(msg) => DashboardError::CredentialMissing(format!(
                "{} ({})",
                msg,
                path.display()
            )),
            other => other,
        })?;
        store.source = Some(path.to_path_buf());
        Ok(store)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content).map_err(|e| {
            DashboardError::CredentialMissing(format!("secrets file is not valid TOML: {}", e))
        })?;
        Ok(Self {
            source: None,
            table,
        })
    }

    /// Parse the named entry as a service-account key.
    pub fn service_account(&self, entry: &str) -> Result<ServiceAccountKey> {
        let value = self.table.get(entry).ok_or_else(|| {
            DashboardError::CredentialMissing(format!("no '{}' entry{}", entry, self.location()))
        })?;

        let section = value.as_table().ok_or_else(|| {
            DashboardError::CredentialInvalid(format!("'{}' is not a table", entry))
        })?;

        match section.get("data") {
            Some(toml::Value::String(json)) => parse_service_account_json(json),
            Some(_) => Err(DashboardError::CredentialInvalid(format!(
                "'{}.data' must be a string of JSON",
                entry
            ))),
            None if section.contains_key("client_email") => toml::Value::Table(section.clone())
                .try_into::<ServiceAccountKey>()
                .map_err(|e| DashboardError::CredentialInvalid(e.to_string())),
            None => Err(DashboardError::CredentialMissing(format!(
                "'{}' has no 'data' field{}",
                entry,
                self.location()
            ))),
        }
    }

    fn location(&self) -> String {
        match &self.source {
            Some(path) => format!(" in {}", path.display()),
            None => String::new(),
        }
    }
}

/// Parse a JSON-encoded service-account key.
pub fn parse_service_account_json(json: &str) -> Result<ServiceAccountKey> {
    serde_json::from_str(json).map_err(|e| DashboardError::CredentialInvalid(e.to_string()))
}

/// Load the service-account key named `entry` from the secrets file at `path`.
pub fn load_credentials(path: &Path, entry: &str) -> Result<ServiceAccountKey> {
    let key = SecretStore::from_file(path)?.service_account(entry)?;
    log::debug!("Loaded service account {}", key.client_email);
    Ok(key)
}
