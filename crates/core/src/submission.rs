//! Validation of what callers submit, before anything touches storage.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::batch::normalize_code;
use crate::record::{Stage, TraceRecord};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("batch code is required")]
    MissingBatchCode,

    #[error("batch name is required")]
    MissingBatchName,

    #[error("operator name is required")]
    MissingOperator,

    #[error("batch '{0}' does not exist")]
    UnknownBatch(String),

    #[error("stage '{0}' is recorded by the system and cannot be submitted")]
    SystemStage(Stage),

    #[error("weight must be nonnegative, got {0}")]
    NegativeWeight(Decimal),
}

/// A stage event submitted from the entry form (scan landing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntry {
    pub batch_code: String,
    pub stage: Stage,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub weight_kg: Option<Decimal>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub product_model: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl StageEntry {
    pub fn new(batch_code: impl Into<String>, stage: Stage, operator: impl Into<String>) -> Self {
        StageEntry {
            batch_code: batch_code.into(),
            stage,
            operator: operator.into(),
            weight_kg: None,
            source: None,
            destination: None,
            product_model: None,
            notes: None,
            location: None,
        }
    }

    /// Check the entry in isolation. Batch existence is checked by the caller
    /// against the table.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if normalize_code(&self.batch_code).is_empty() {
            return Err(ValidationError::MissingBatchCode);
        }
        if self.stage.is_system() {
            return Err(ValidationError::SystemStage(self.stage));
        }
        if self.operator.trim().is_empty() {
            return Err(ValidationError::MissingOperator);
        }
        if let Some(w) = self.weight_kg {
            if w.is_sign_negative() && !w.is_zero() {
                return Err(ValidationError::NegativeWeight(w));
            }
        }
        Ok(())
    }

    /// Build the stored record. `batch_name` is always the batch's existing
    /// name; it is never taken from the submitter.
    pub fn into_record(self, batch_name: &str, timestamp: String) -> TraceRecord {
        TraceRecord {
            batch_code: normalize_code(&self.batch_code),
            batch_name: batch_name.to_string(),
            stage: self.stage,
            operator: self.operator.trim().to_string(),
            timestamp,
            weight_kg: self.weight_kg,
            source: clean(self.source),
            destination: clean(self.destination),
            product_model: clean(self.product_model),
            notes: clean(self.notes),
            location: clean(self.location),
        }
    }
}

/// Request to open a new batch and generate its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatch {
    pub batch_name: String,
}

impl NewBatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_name.trim().is_empty() {
            return Err(ValidationError::MissingBatchName);
        }
        Ok(())
    }
}
