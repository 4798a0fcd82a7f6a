use std::fmt;
use std::str::FromStr;

use elvtrace_core::clock::file_stamp;
use elvtrace_core::TraceRecord;
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::{to_delimited_text, to_workbook, ExportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// A rendered download: bytes plus what a client needs to save them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: &'static str,
}

impl ExportArtifact {
    /// Render `records` in `format`, named after `generated_at`.
    pub fn build(
        records: &[TraceRecord],
        format: ExportFormat,
        generated_at: PrimitiveDateTime,
    ) -> Result<Self, ExportError> {
        let bytes = match format {
            ExportFormat::Csv => to_delimited_text(records)?,
            ExportFormat::Xlsx => to_workbook(records)?,
        };
        let file_name = format!(
            "plastic_trace_data_{}.{}",
            file_stamp(generated_at),
            format.extension()
        );
        tracing::info!(%format, rows = records.len(), file = %file_name, "export rendered");
        Ok(ExportArtifact {
            bytes,
            file_name,
            mime: format.mime(),
        })
    }
}
