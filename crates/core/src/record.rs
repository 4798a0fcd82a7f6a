use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::schema::SchemaError;

/// A step in a batch's processing lifecycle, in lifecycle order.
///
/// `Created` is written by the system when a batch label is generated and is
/// never submitted by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Stage {
    Created,
    Shipped,
    Transported,
    Received,
    Reprocessed,
    Manufactured,
    Sold,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Created,
        Stage::Shipped,
        Stage::Transported,
        Stage::Received,
        Stage::Reprocessed,
        Stage::Manufactured,
        Stage::Sold,
    ];

    /// Name written to the table.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Created => "Created",
            Stage::Shipped => "Shipped",
            Stage::Transported => "Transported",
            Stage::Received => "Received",
            Stage::Reprocessed => "Reprocessed",
            Stage::Manufactured => "Manufactured",
            Stage::Sold => "Sold",
        }
    }

    /// Label used by data files written before stages had English names.
    pub fn legacy_label(self) -> &'static str {
        match self {
            Stage::Created => "初始建立",
            Stage::Shipped => "出廠",
            Stage::Transported => "運輸",
            Stage::Received => "後端機構接收",
            Stage::Reprocessed => "再生處理",
            Stage::Manufactured => "產品製造",
            Stage::Sold => "銷售",
        }
    }

    /// Parse a stage name case-insensitively, accepting legacy labels.
    pub fn parse(raw: &str) -> Option<Stage> {
        let raw = raw.trim();
        Stage::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(raw) || s.legacy_label() == raw)
    }

    pub fn is_system(self) -> bool {
        self == Stage::Created
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::parse(s).ok_or_else(|| SchemaError::UnknownStage(s.to_string()))
    }
}

impl TryFrom<String> for Stage {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        stage.as_str().to_string()
    }
}

/// One stage event for one batch. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub batch_code: String,
    pub batch_name: String,
    pub stage: Stage,
    pub operator: String,
    /// `YYYY-MM-DD HH:MM:SS`, fixed at insert.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl TraceRecord {
    /// A record with only the required fields set.
    pub fn new(
        batch_code: impl Into<String>,
        batch_name: impl Into<String>,
        stage: Stage,
        operator: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        TraceRecord {
            batch_code: batch_code.into(),
            batch_name: batch_name.into(),
            stage,
            operator: operator.into(),
            timestamp: timestamp.into(),
            weight_kg: None,
            source: None,
            destination: None,
            product_model: None,
            notes: None,
            location: None,
        }
    }
}
