//! elvtrace-core: the trace record model and everything that reads it.
//!
//! A batch of recycled material is tracked as a flat, append-only table of
//! [`TraceRecord`]s, one per stage event. This crate owns the shape of that
//! table and the pure logic over it:
//!
//! - [`schema`] -- the one column layout shared by every backend and export
//! - [`delimited`] -- the UTF-8 (BOM) delimited-text codec for that layout
//! - [`access`] -- credential table, roles, capabilities, sessions
//! - [`query`] -- filters, histograms, completeness and display ordering
//! - [`submission`] -- validation of incoming stage entries and new batches
//!
//! Storage lives in `elvtrace-storage`; nothing in here performs I/O.

pub mod access;
pub mod batch;
pub mod clock;
pub mod delimited;
pub mod demo;
pub mod encoding;
pub mod query;
pub mod record;
pub mod schema;
pub mod submission;

// ── Convenience re-exports: key types ────────────────────────────────

pub use access::{authorize, AccessError, Capability, CredentialTable, Role, Session};
pub use clock::{Clock, SystemClock};
pub use query::{DateRange, RecordFilter};
pub use record::{Stage, TraceRecord};
pub use schema::{Column, SchemaError, COLUMNS};
pub use submission::{NewBatch, StageEntry, ValidationError};
