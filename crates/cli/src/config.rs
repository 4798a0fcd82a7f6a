//! Runtime configuration for `elvtrace`.
//!
//! Settings come from an optional TOML file, then environment overrides.
//! Everything is resolved once at startup.
//!
//! # Example
//!
//! ```toml
//! data_file = "/var/lib/elvtrace/plastic_trace_data.csv"
//! public_base_url = "https://trace.example.com"
//! port = 8080
//!
//! [remote]
//! credentials_file = "/etc/elvtrace/remote.json"
//! spreadsheet = "ELV_Plastic_Traceability"
//! tab = "trace_records"
//! timeout_secs = 10
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use elvtrace_storage::{AdapterConfig, RemoteConfig};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "elvtrace.toml";
pub const DEFAULT_DATA_FILE: &str = "plastic_trace_data.csv";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_PORT: u16 = 8080;

pub const ENV_CONFIG: &str = "ELVTRACE_CONFIG";
pub const ENV_DATA_FILE: &str = "ELVTRACE_DATA_FILE";
pub const ENV_BASE_URL: &str = "ELVTRACE_PUBLIC_BASE_URL";
pub const ENV_REMOTE_CREDENTIALS: &str = "ELVTRACE_REMOTE_CREDENTIALS";

// ── File format ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub data_file: Option<PathBuf>,
    pub public_base_url: Option<String>,
    pub port: Option<u16>,
    pub remote: Option<RemoteSection>,
}

/// `[remote]` section. Present means "try the remote table".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteSection {
    pub credentials_file: Option<PathBuf>,
    pub spreadsheet: Option<String>,
    pub tab: Option<String>,
    pub timeout_secs: Option<u64>,
}

pub fn read_config(path: &Path) -> Result<FileConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read config '{}': {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("invalid config '{}': {}", path.display(), e))
}

// ── Resolved configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_file: PathBuf,
    pub public_base_url: String,
    pub port: u16,
    pub remote: Option<RemoteConfig>,
}

impl Config {
    pub fn adapter_config(&self) -> AdapterConfig {
        AdapterConfig {
            local_path: self.data_file.clone(),
            remote: self.remote.clone(),
        }
    }
}

/// Resolve configuration.
///
/// An explicit `path` (or `ELVTRACE_CONFIG`) must exist; the default
/// `elvtrace.toml` in the working directory is used only if present.
pub fn resolve<E>(path: Option<&Path>, env: E) -> Result<Config, String>
where
    E: Fn(&str) -> Option<String>,
{
    let explicit = path
        .map(Path::to_path_buf)
        .or_else(|| env(ENV_CONFIG).map(PathBuf::from));
    let file = match explicit {
        Some(p) => read_config(&p)?,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                read_config(default)?
            } else {
                FileConfig::default()
            }
        }
    };

    let data_file = env(ENV_DATA_FILE)
        .map(PathBuf::from)
        .or(file.data_file)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));
    let public_base_url = env(ENV_BASE_URL)
        .or(file.public_base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let section = file.remote;
    let credentials = env(ENV_REMOTE_CREDENTIALS)
        .map(PathBuf::from)
        .or_else(|| section.as_ref().and_then(|s| s.credentials_file.clone()));
    let remote = match credentials {
        None => {
            if section.is_some() {
                tracing::warn!("[remote] configured without credentials_file; using local file only");
            }
            None
        }
        Some(credentials_file) => {
            let section = section.unwrap_or_default();
            let mut remote = RemoteConfig::new(credentials_file);
            if let Some(s) = section.spreadsheet {
                remote.spreadsheet = s;
            }
            if let Some(t) = section.tab {
                remote.tab = t;
            }
            if let Some(secs) = section.timeout_secs {
                remote.timeout = Duration::from_secs(secs);
            }
            Some(remote)
        }
    };

    Ok(Config {
        data_file,
        public_base_url,
        port: file.port.unwrap_or(DEFAULT_PORT),
        remote,
    })
}
