//! Session-gated operations over the record store.
//!
//! Both the CLI and the HTTP server go through [`TraceService`]. Every
//! gated operation takes the caller's session explicitly and checks it
//! before touching storage, so a refused call has no effect.

use std::collections::{BTreeMap, BTreeSet};

use elvtrace_codegen::{label_bundle, ScanLabel};
use elvtrace_core::batch::{batch_name_of, fresh_code, normalize_code, opening_record};
use elvtrace_core::clock::{file_stamp, format_timestamp, parse_date};
use elvtrace_core::demo::demo_records;
use elvtrace_core::query::{self, BatchSummary, Completeness, Summary};
use elvtrace_core::{
    authorize, AccessError, Capability, Clock, CredentialTable, DateRange, NewBatch, RecordFilter,
    Role, Session, Stage, StageEntry, SystemClock, TraceRecord, ValidationError,
};
use elvtrace_export::{parse_delimited_text, ExportArtifact, ExportError, ExportFormat};
use elvtrace_storage::{PersistenceAdapter, RecordStore, StorageError, StorageInfo};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use time::Date;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Codegen(#[from] elvtrace_codegen::CodegenError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("batch '{0}' not found")]
    UnknownBatch(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

// ── Views ────────────────────────────────────────────────────────────────────

/// What a scan of a batch label shows.
#[derive(Debug, Clone, Serialize)]
pub struct ScanView {
    pub batch_code: String,
    pub batch_name: String,
    pub history: Vec<TraceRecord>,
}

#[derive(Debug, Clone)]
pub struct CreatedBatch {
    pub record: TraceRecord,
    pub label: ScanLabel,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub summary: Summary,
    pub completeness: BTreeMap<String, Completeness>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub username: String,
    pub role: Role,
    pub capabilities: Vec<Capability>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        SessionInfo {
            username: session.username.clone(),
            role: session.role,
            capabilities: session.role.permissions().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub username: String,
    pub role: Role,
}

/// Build a record filter from loosely typed inputs.
///
/// `stages` is a comma-separated list; an empty string selects no stages.
/// Dates are `YYYY-MM-DD` and inclusive; a missing bound is open.
pub fn build_filter(
    batch_code: Option<&str>,
    stages: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<RecordFilter, ServiceError> {
    let mut filter = RecordFilter::default();
    if let Some(code) = batch_code.map(str::trim).filter(|c| !c.is_empty()) {
        filter.batch_code = Some(normalize_code(code));
    }
    if let Some(list) = stages {
        let parsed: Result<BTreeSet<Stage>, _> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<Stage>())
            .collect();
        filter.stages = Some(parsed.map_err(|e| ServiceError::BadRequest(e.to_string()))?);
    }
    let date = |raw: &str| {
        parse_date(raw).ok_or_else(|| {
            ServiceError::BadRequest(format!("invalid date '{}', expected YYYY-MM-DD", raw))
        })
    };
    let start = from.map(date).transpose()?;
    let end = to.map(date).transpose()?;
    if start.is_some() || end.is_some() {
        filter.date_range = Some(DateRange::new(
            start.unwrap_or(Date::MIN),
            end.unwrap_or(Date::MAX),
        ));
    }
    Ok(filter)
}

// ── Service ──────────────────────────────────────────────────────────────────

pub struct TraceService {
    store: RecordStore,
    credentials: CredentialTable,
    clock: Box<dyn Clock>,
    rng: StdRng,
    base_url: String,
}

impl TraceService {
    pub fn new(
        store: RecordStore,
        credentials: CredentialTable,
        clock: Box<dyn Clock>,
        base_url: impl Into<String>,
    ) -> Self {
        TraceService {
            store,
            credentials,
            clock,
            rng: StdRng::from_entropy(),
            base_url: base_url.into(),
        }
    }

    /// Connect storage from configuration with the built-in accounts and
    /// the system clock.
    pub fn open(config: &Config) -> Self {
        let adapter = PersistenceAdapter::connect(config.adapter_config());
        TraceService::new(
            RecordStore::new(adapter),
            CredentialTable::builtin(),
            Box::new(SystemClock),
            config.public_base_url.clone(),
        )
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Advisories raised by storage since the last call.
    pub fn drain_advisories(&mut self) -> Vec<String> {
        self.store.drain_advisories()
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Session, ServiceError> {
        match self.credentials.login(username, password) {
            Some(session) => {
                tracing::info!(user = %session.username, role = %session.role, "login");
                Ok(session)
            }
            None => {
                tracing::warn!(user = %username, "failed login");
                Err(ServiceError::InvalidCredentials)
            }
        }
    }

    fn records(&mut self) -> Result<Vec<TraceRecord>, ServiceError> {
        Ok(self.store.load_all()?)
    }

    fn now(&self) -> String {
        format_timestamp(self.clock.now())
    }

    fn require_batch(records: &[TraceRecord], code: &str) -> Result<String, ServiceError> {
        batch_name_of(records, code)
            .map(str::to_string)
            .ok_or_else(|| ServiceError::UnknownBatch(code.to_string()))
    }

    // ── Scan ─────────────────────────────────────────────────────────────────

    /// Batch details and timeline for a scanned label.
    pub fn scan(&mut self, session: Option<&Session>, code: &str) -> Result<ScanView, ServiceError> {
        authorize(session, Capability::Scan)?;
        let code = normalize_code(code);
        let records = self.records()?;
        let batch_name = Self::require_batch(&records, &code)?;
        let history = query::batch_history(&records, &code);
        Ok(ScanView {
            batch_code: code,
            batch_name,
            history,
        })
    }

    /// Append a stage event for an existing batch.
    pub fn submit_stage(
        &mut self,
        session: Option<&Session>,
        entry: StageEntry,
    ) -> Result<TraceRecord, ServiceError> {
        authorize(session, Capability::Scan)?;
        entry.validate()?;
        let code = normalize_code(&entry.batch_code);
        let records = self.records()?;
        let batch_name = batch_name_of(&records, &code)
            .map(str::to_string)
            .ok_or(ValidationError::UnknownBatch(code))?;
        let record = entry.into_record(&batch_name, self.now());
        Ok(self.store.append_one(record)?)
    }

    // ── Labels ───────────────────────────────────────────────────────────────

    /// Open a batch under a fresh code and render its label.
    pub fn create_batch(
        &mut self,
        session: Option<&Session>,
        request: NewBatch,
    ) -> Result<CreatedBatch, ServiceError> {
        authorize(session, Capability::GenerateCode)?;
        request.validate()?;
        let records = self.records()?;
        let code = fresh_code(&mut self.rng, &records);
        let created_by = session.map(|s| s.username.as_str()).unwrap_or("system");
        let record = opening_record(&code, request.batch_name.trim(), created_by, self.now());
        let label = elvtrace_codegen::generate(&code, &self.base_url)?;
        let record = self.store.append_one(record)?;
        tracing::info!(batch = %code, name = %record.batch_name, "batch created");
        Ok(CreatedBatch { record, label })
    }

    pub fn list_batches(&mut self, session: Option<&Session>) -> Result<Vec<BatchSummary>, ServiceError> {
        authorize(session, Capability::GenerateCode)?;
        Ok(query::created_batches(&self.records()?))
    }

    pub fn batch_label(&mut self, session: Option<&Session>, code: &str) -> Result<ScanLabel, ServiceError> {
        authorize(session, Capability::GenerateCode)?;
        let code = normalize_code(code);
        Self::require_batch(&self.records()?, &code)?;
        Ok(elvtrace_codegen::generate(&code, &self.base_url)?)
    }

    /// ZIP of every batch label.
    pub fn label_bundle(&mut self, session: Option<&Session>) -> Result<(String, Vec<u8>), ServiceError> {
        authorize(session, Capability::GenerateCode)?;
        let batches = query::created_batches(&self.records()?);
        let bytes = label_bundle(&batches, &self.base_url)?;
        Ok((format!("qr_labels_{}.zip", file_stamp(self.clock.now())), bytes))
    }

    // ── Query ────────────────────────────────────────────────────────────────

    /// Matching records, newest first.
    pub fn query(
        &mut self,
        session: Option<&Session>,
        filter: &RecordFilter,
    ) -> Result<Vec<TraceRecord>, ServiceError> {
        authorize(session, Capability::Query)?;
        let records = self.records()?;
        Ok(query::sort_for_display(query::filter(&records, filter)))
    }

    pub fn history(&mut self, session: Option<&Session>, code: &str) -> Result<Vec<TraceRecord>, ServiceError> {
        authorize(session, Capability::Query)?;
        let code = normalize_code(code);
        let records = self.records()?;
        Self::require_batch(&records, &code)?;
        Ok(query::batch_history(&records, &code))
    }

    pub fn stats(&mut self, session: Option<&Session>) -> Result<Stats, ServiceError> {
        authorize(session, Capability::Query)?;
        let records = self.records()?;
        Ok(Stats {
            summary: query::summary(&records),
            completeness: query::batch_completeness(&records),
        })
    }

    // ── Download ─────────────────────────────────────────────────────────────

    /// Export the table, optionally restricted to `codes`.
    pub fn export(
        &mut self,
        session: Option<&Session>,
        format: ExportFormat,
        codes: &[String],
    ) -> Result<ExportArtifact, ServiceError> {
        authorize(session, Capability::Download)?;
        let codes: Vec<String> = codes
            .iter()
            .map(|c| normalize_code(c))
            .filter(|c| !c.is_empty())
            .collect();
        let records = query::select_codes(&self.records()?, &codes);
        Ok(ExportArtifact::build(&records, format, self.clock.now())?)
    }

    // ── Admin ────────────────────────────────────────────────────────────────

    /// Backend status without an access check, for startup reporting.
    pub fn storage_info_unchecked(&self) -> StorageInfo {
        self.store.storage_info()
    }

    pub fn storage_info(&self, session: Option<&Session>) -> Result<StorageInfo, ServiceError> {
        authorize(session, Capability::Admin)?;
        Ok(self.store.storage_info())
    }

    pub fn sync_to_remote(&mut self, session: Option<&Session>) -> Result<usize, ServiceError> {
        authorize(session, Capability::Admin)?;
        Ok(self.store.sync_to_remote()?)
    }

    pub fn clear(&mut self, session: Option<&Session>) -> Result<(), ServiceError> {
        authorize(session, Capability::Admin)?;
        self.store.replace_all(&[])?;
        tracing::warn!(user = ?session.map(|s| &s.username), "table cleared");
        Ok(())
    }

    /// Replace the table with a delimited-text backup. Returns the row count.
    pub fn import(&mut self, session: Option<&Session>, bytes: &[u8]) -> Result<usize, ServiceError> {
        authorize(session, Capability::Admin)?;
        let records = parse_delimited_text(bytes)?;
        self.store.replace_all(&records)?;
        Ok(records.len())
    }

    /// The local file's contents as a delimited-text download.
    pub fn backup(&mut self, session: Option<&Session>) -> Result<ExportArtifact, ServiceError> {
        authorize(session, Capability::Admin)?;
        let records = self.store.read_local()?;
        let now = self.clock.now();
        let mut artifact = ExportArtifact::build(&records, ExportFormat::Csv, now)?;
        artifact.file_name = format!("plastic_trace_backup_{}.csv", file_stamp(now));
        Ok(artifact)
    }

    pub fn reinitialize(&mut self, session: Option<&Session>) -> Result<StorageInfo, ServiceError> {
        authorize(session, Capability::Admin)?;
        self.store.reinitialize();
        Ok(self.store.storage_info())
    }

    pub fn accounts(&self, session: Option<&Session>) -> Result<Vec<AccountView>, ServiceError> {
        authorize(session, Capability::Admin)?;
        Ok(self
            .credentials
            .accounts()
            .iter()
            .map(|a| AccountView {
                username: a.username.clone(),
                role: a.role,
            })
            .collect())
    }

    /// Load the demo batches into an empty table. Returns the number of
    /// rows written; an occupied table is left alone.
    pub fn seed_demo(&mut self, session: Option<&Session>) -> Result<usize, ServiceError> {
        authorize(session, Capability::Admin)?;
        if !self.records()?.is_empty() {
            tracing::info!("table not empty, demo data skipped");
            return Ok(0);
        }
        let demo = demo_records(self.clock.now());
        self.store.replace_all(&demo)?;
        Ok(demo.len())
    }
}
