//! Local-first persistence with an optional remote mirror.
//!
//! The local file is authoritative for writes: a failed local write fails
//! the call. The remote is attempted once at construction; if that fails it
//! stays off for the adapter's lifetime. Remote failures after that are
//! reported as advisories and never fail a call that the local side
//! completed.

use std::path::PathBuf;

use elvtrace_core::TraceRecord;
use serde::Serialize;

use crate::backend::TableBackend;
use crate::error::StorageError;
use crate::local::LocalCsv;
use crate::remote::{RemoteConfig, RemoteTable};

/// Everything needed to (re)build an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    pub local_path: PathBuf,
    pub remote: Option<RemoteConfig>,
}

/// A value plus the advisories raised while producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    pub advisories: Vec<String>,
}

impl<T> Outcome<T> {
    fn new(value: T, advisories: Vec<String>) -> Self {
        Outcome { value, advisories }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageInfo {
    pub backend: BackendKind,
    pub local: String,
    pub local_backup_present: bool,
    pub remote_available: bool,
    pub remote: Option<String>,
}

pub struct PersistenceAdapter {
    config: Option<AdapterConfig>,
    local: Box<dyn TableBackend>,
    remote: Option<Box<dyn TableBackend>>,
    startup_advisories: Vec<String>,
}

fn advise(advisories: &mut Vec<String>, message: String) {
    tracing::warn!("{}", message);
    advisories.push(message);
}

impl PersistenceAdapter {
    /// Build from configuration: local file always, remote if configured and
    /// reachable.
    pub fn connect(config: AdapterConfig) -> Self {
        let local: Box<dyn TableBackend> = Box::new(LocalCsv::new(&config.local_path));
        let mut advisories = Vec::new();
        let remote: Option<Box<dyn TableBackend>> = match &config.remote {
            None => None,
            Some(remote_config) => match RemoteTable::connect(remote_config) {
                Ok(table) => Some(Box::new(table)),
                Err(e) => {
                    advise(
                        &mut advisories,
                        format!("remote table disabled, using local file only: {}", e),
                    );
                    None
                }
            },
        };
        PersistenceAdapter {
            config: Some(config),
            local,
            remote,
            startup_advisories: advisories,
        }
    }

    /// Build from ready-made backends. A remote given as `Err` is treated
    /// like a failed connection.
    pub fn with_backends(
        local: Box<dyn TableBackend>,
        remote: Option<Result<Box<dyn TableBackend>, StorageError>>,
    ) -> Self {
        let mut advisories = Vec::new();
        let remote = match remote {
            None => None,
            Some(Ok(backend)) => Some(backend),
            Some(Err(e)) => {
                advise(
                    &mut advisories,
                    format!("remote table disabled, using local file only: {}", e),
                );
                None
            }
        };
        PersistenceAdapter {
            config: None,
            local,
            remote,
            startup_advisories: advisories,
        }
    }

    /// A fresh adapter from the same configuration. Adapters built from
    /// backends have nothing to reconnect and are returned as they are.
    pub fn reinitialize(self) -> Self {
        self.reconnect().unwrap_or(self)
    }

    /// Like [`reinitialize`](Self::reinitialize) without giving up `self`;
    /// `None` when there is no configuration to rebuild from.
    pub fn reconnect(&self) -> Option<Self> {
        let config = self.config.clone()?;
        tracing::info!("reinitializing persistence");
        Some(Self::connect(config))
    }

    /// Advisories raised while connecting.
    pub fn startup_advisories(&self) -> &[String] {
        &self.startup_advisories
    }

    pub fn remote_available(&self) -> bool {
        self.remote.is_some()
    }

    pub fn load(&self) -> Result<Outcome<Vec<TraceRecord>>, StorageError> {
        let mut advisories = Vec::new();
        let Some(remote) = &self.remote else {
            return Ok(Outcome::new(self.local.read_all()?, advisories));
        };

        match remote.read_all() {
            Ok(rows) if !rows.is_empty() => Ok(Outcome::new(rows, advisories)),
            Ok(_) => {
                let local_rows = self.local.read_all()?;
                if !local_rows.is_empty() {
                    match remote.write_all(&local_rows) {
                        Ok(()) => tracing::info!(
                            rows = local_rows.len(),
                            "remote table was empty, copied local rows into it"
                        ),
                        Err(e) => advise(
                            &mut advisories,
                            format!("could not copy local rows to empty remote table: {}", e),
                        ),
                    }
                }
                Ok(Outcome::new(local_rows, advisories))
            }
            Err(e) => {
                advise(
                    &mut advisories,
                    format!("remote read failed, using local file: {}", e),
                );
                Ok(Outcome::new(self.local.read_all()?, advisories))
            }
        }
    }

    pub fn save(&self, records: &[TraceRecord]) -> Result<Outcome<()>, StorageError> {
        let mut advisories = Vec::new();
        self.local.write_all(records)?;
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.write_all(records) {
                advise(
                    &mut advisories,
                    format!("saved locally, remote write failed: {}", e),
                );
            }
        }
        Ok(Outcome::new((), advisories))
    }

    /// Push the local table to the remote wholesale. Returns the row count.
    pub fn sync_to_remote(&self) -> Result<Outcome<usize>, StorageError> {
        let Some(remote) = &self.remote else {
            return Err(StorageError::RemoteUnavailable(
                "no remote table is connected".to_string(),
            ));
        };
        let rows = self.local.read_all()?;
        remote.write_all(&rows)?;
        tracing::info!(rows = rows.len(), "synced local table to remote");
        Ok(Outcome::new(rows.len(), Vec::new()))
    }

    pub fn storage_info(&self) -> StorageInfo {
        StorageInfo {
            backend: if self.remote.is_some() {
                BackendKind::Remote
            } else {
                BackendKind::Local
            },
            local: self.local.describe(),
            local_backup_present: self.local.is_present(),
            remote_available: self.remote.is_some(),
            remote: self.remote.as_ref().map(|r| r.describe()),
        }
    }

    /// The local table, regardless of remote state.
    pub fn read_local(&self) -> Result<Vec<TraceRecord>, StorageError> {
        self.local.read_all()
    }
}
