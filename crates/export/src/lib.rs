//! Downloadable renderings of the trace table.
//!
//! Both formats share the column layout from `elvtrace_core::schema`, and
//! both produce identical bytes for identical input.

mod artifact;
mod workbook;

use elvtrace_core::delimited::{self, DelimitedError};
use elvtrace_core::TraceRecord;

pub use artifact::{ExportArtifact, ExportFormat};
pub use workbook::{to_workbook, SHEET_NAME};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Delimited(#[from] DelimitedError),

    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("unknown export format '{0}' (expected csv or xlsx)")]
    UnknownFormat(String),
}

/// UTF-8 CSV with a byte-order mark and the canonical header row.
pub fn to_delimited_text(records: &[TraceRecord]) -> Result<Vec<u8>, ExportError> {
    Ok(delimited::encode(records)?)
}

/// Inverse of [`to_delimited_text`]; used when importing a backup.
pub fn parse_delimited_text(bytes: &[u8]) -> Result<Vec<TraceRecord>, ExportError> {
    Ok(delimited::decode(bytes)?)
}
