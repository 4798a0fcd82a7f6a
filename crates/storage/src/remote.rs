//! HTTP client for the remote tabular service.
//!
//! The service exposes one tab of one spreadsheet as a grid of cells:
//!
//! - `GET  {endpoint}/spreadsheets/{sheet}/tabs/{tab}/values` returns
//!   `{"values": [[header...], [cell...], ...]}`
//! - `PUT` on the same path with the same body shape overwrites the tab.
//!
//! Requests carry `Authorization: Bearer {token}` and a global timeout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use elvtrace_core::encoding::percent_encode;
use elvtrace_core::schema::{header_row, is_blank_row, record_to_row, HeaderMap};
use elvtrace_core::TraceRecord;
use serde::{Deserialize, Serialize};

use crate::backend::TableBackend;
use crate::error::StorageError;

pub const DEFAULT_SPREADSHEET: &str = "ELV_Plastic_Traceability";
pub const DEFAULT_TAB: &str = "trace_records";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where the remote table lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub credentials_file: PathBuf,
    pub spreadsheet: String,
    pub tab: String,
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(credentials_file: impl Into<PathBuf>) -> Self {
        RemoteConfig {
            credentials_file: credentials_file.into(),
            spreadsheet: DEFAULT_SPREADSHEET.to_string(),
            tab: DEFAULT_TAB.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Contents of the credentials file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCredentials {
    pub endpoint: String,
    pub token: String,
}

impl RemoteCredentials {
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::Config(format!(
                "could not read credentials '{}': {}",
                path.display(),
                e
            ))
        })?;
        let creds: RemoteCredentials = serde_json::from_str(&content).map_err(|e| {
            StorageError::Config(format!(
                "malformed credentials '{}': {}",
                path.display(),
                e
            ))
        })?;
        if creds.endpoint.trim().is_empty() || creds.token.trim().is_empty() {
            return Err(StorageError::Config(format!(
                "credentials '{}' need both endpoint and token",
                path.display()
            )));
        }
        Ok(creds)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ValuesPayload {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// The remote tab as a [`TableBackend`].
pub struct RemoteTable {
    agent: ureq::Agent,
    url: String,
    token: String,
    location: String,
}

impl RemoteTable {
    /// Load credentials and read the tab once. Any failure means the remote
    /// is unusable.
    pub fn connect(config: &RemoteConfig) -> Result<Self, StorageError> {
        let creds = RemoteCredentials::load(&config.credentials_file)?;
        let table = Self::with_credentials(&creds, config);
        table.fetch()?;
        tracing::info!(location = %table.location, "connected to remote table");
        Ok(table)
    }

    /// Build a client without contacting the service.
    pub fn with_credentials(creds: &RemoteCredentials, config: &RemoteConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build();
        let endpoint = creds.endpoint.trim_end_matches('/');
        RemoteTable {
            agent: ureq::Agent::new_with_config(agent_config),
            url: format!(
                "{}/spreadsheets/{}/tabs/{}/values",
                endpoint,
                percent_encode(&config.spreadsheet),
                percent_encode(&config.tab)
            ),
            token: creds.token.clone(),
            location: format!("{}/{} at {}", config.spreadsheet, config.tab, endpoint),
        }
    }

    fn fetch(&self) -> Result<Vec<Vec<String>>, StorageError> {
        let response = self
            .agent
            .get(&self.url)
            .header("Authorization", &format!("Bearer {}", self.token))
            .call()
            .map_err(|e| classify_http_error(e, "read"))?;
        let payload = response
            .into_body()
            .read_json::<ValuesPayload>()
            .map_err(|e| {
                StorageError::RemoteUnavailable(format!("could not parse values response: {}", e))
            })?;
        Ok(payload
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }
}

impl TableBackend for RemoteTable {
    fn read_all(&self) -> Result<Vec<TraceRecord>, StorageError> {
        rows_to_records(&self.fetch()?, &self.location)
    }

    fn write_all(&self, records: &[TraceRecord]) -> Result<(), StorageError> {
        let mut values = Vec::with_capacity(records.len() + 1);
        values.push(header_row());
        values.extend(records.iter().map(record_to_row));

        self.agent
            .put(&self.url)
            .header("Authorization", &format!("Bearer {}", self.token))
            .send_json(&serde_json::json!({ "values": values }))
            .map_err(|e| classify_http_error(e, "write"))?;

        tracing::debug!(location = %self.location, rows = records.len(), "wrote remote table");
        Ok(())
    }

    fn describe(&self) -> String {
        self.location.clone()
    }
}

/// Cells come back as strings, numbers or nulls.
fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// First row is the header. A grid with no rows is an empty table.
fn rows_to_records(rows: &[Vec<String>], location: &str) -> Result<Vec<TraceRecord>, StorageError> {
    let Some((header, body)) = rows.split_first() else {
        return Ok(Vec::new());
    };
    if is_blank_row(header) {
        return Ok(Vec::new());
    }
    let map = HeaderMap::resolve(header).map_err(|e| StorageError::malformed(location, e))?;
    let mut records = Vec::with_capacity(body.len());
    for (i, row) in body.iter().enumerate() {
        if is_blank_row(row) {
            continue;
        }
        let record = map
            .record_from_row(row)
            .map_err(|e| StorageError::malformed(location, format!("row {}: {}", i + 2, e)))?;
        records.push(record);
    }
    Ok(records)
}

fn classify_http_error(err: ureq::Error, operation: &str) -> StorageError {
    let msg = match &err {
        ureq::Error::StatusCode(401) => "401 Unauthorized, check the token".to_string(),
        ureq::Error::StatusCode(403) => "403 Forbidden, token lacks access".to_string(),
        ureq::Error::StatusCode(404) => "404 Not Found, check spreadsheet and tab".to_string(),
        ureq::Error::StatusCode(status) => format!("server returned {}", status),
        ureq::Error::Timeout(_) => "request timed out".to_string(),
        other => other.to_string(),
    };
    StorageError::RemoteUnavailable(format!("{} failed: {}", operation, msg))
}
