//! The single column layout of the trace table.
//!
//! The local file, the remote table and every export use these headers in
//! this order. Rows travel as plain strings; [`HeaderMap`] maps a header row
//! back onto columns so a table whose columns were reordered still loads.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::record::{Stage, TraceRecord};

/// On-disk header names, in column order.
pub const COLUMNS: [&str; 11] = [
    "qr_id",
    "batch_name",
    "stage",
    "operator",
    "timestamp",
    "weight_kg",
    "source",
    "destination",
    "product_model",
    "notes",
    "location",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    BatchCode,
    BatchName,
    Stage,
    Operator,
    Timestamp,
    WeightKg,
    Source,
    Destination,
    ProductModel,
    Notes,
    Location,
}

impl Column {
    pub const ALL: [Column; 11] = [
        Column::BatchCode,
        Column::BatchName,
        Column::Stage,
        Column::Operator,
        Column::Timestamp,
        Column::WeightKg,
        Column::Source,
        Column::Destination,
        Column::ProductModel,
        Column::Notes,
        Column::Location,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn header(self) -> &'static str {
        COLUMNS[self.index()]
    }

    pub fn from_header(name: &str) -> Option<Column> {
        let name = name.trim().trim_start_matches('\u{feff}');
        Column::ALL.into_iter().find(|c| c.header() == name)
    }

    /// Columns without which a row cannot be interpreted.
    pub fn is_required(self) -> bool {
        matches!(self, Column::BatchCode | Column::Stage | Column::Timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("empty value in required column '{0}'")]
    EmptyRequired(&'static str),

    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("invalid weight '{0}': expected a nonnegative number")]
    InvalidWeight(String),
}

pub fn header_row() -> Vec<String> {
    COLUMNS.iter().map(|h| h.to_string()).collect()
}

/// Cell values of `record` in column order. Absent optionals are empty.
pub fn record_to_row(record: &TraceRecord) -> Vec<String> {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    vec![
        record.batch_code.clone(),
        record.batch_name.clone(),
        record.stage.as_str().to_string(),
        record.operator.clone(),
        record.timestamp.clone(),
        record.weight_kg.map(|w| w.to_string()).unwrap_or_default(),
        opt(&record.source),
        opt(&record.destination),
        opt(&record.product_model),
        opt(&record.notes),
        opt(&record.location),
    ]
}

/// Parse a weight cell. Empty means "not recorded".
pub fn parse_weight(raw: &str) -> Result<Option<Decimal>, SchemaError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| SchemaError::InvalidWeight(raw.to_string()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(SchemaError::InvalidWeight(raw.to_string()));
    }
    Ok(Some(value))
}

/// Column positions resolved from a header row.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    positions: [Option<usize>; 11],
}

impl HeaderMap {
    /// Resolve header names to positions. Unknown headers are ignored;
    /// missing optional columns read as empty.
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Result<Self, SchemaError> {
        let mut positions = [None; 11];
        for (i, h) in headers.iter().enumerate() {
            if let Some(col) = Column::from_header(h.as_ref()) {
                positions[col.index()].get_or_insert(i);
            }
        }
        for col in Column::ALL {
            if col.is_required() && positions[col.index()].is_none() {
                return Err(SchemaError::MissingColumn(col.header()));
            }
        }
        Ok(HeaderMap { positions })
    }

    /// The canonical layout, for rows known to be in column order.
    pub fn canonical() -> Self {
        let mut positions = [None; 11];
        for col in Column::ALL {
            positions[col.index()] = Some(col.index());
        }
        HeaderMap { positions }
    }

    /// Cell text exactly as stored; a missing cell reads as empty.
    fn cell<'a, S: AsRef<str>>(&self, row: &'a [S], col: Column) -> &'a str {
        self.positions[col.index()]
            .and_then(|i| row.get(i))
            .map(|s| s.as_ref())
            .unwrap_or("")
    }

    fn optional<S: AsRef<str>>(&self, row: &[S], col: Column) -> Option<String> {
        let v = self.cell(row, col);
        if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    }

    fn required<S: AsRef<str>>(&self, row: &[S], col: Column) -> Result<String, SchemaError> {
        let v = self.cell(row, col);
        if v.trim().is_empty() {
            return Err(SchemaError::EmptyRequired(col.header()));
        }
        Ok(v.to_string())
    }

    pub fn record_from_row<S: AsRef<str>>(&self, row: &[S]) -> Result<TraceRecord, SchemaError> {
        let stage_raw = self.required(row, Column::Stage)?;
        Ok(TraceRecord {
            batch_code: self.required(row, Column::BatchCode)?,
            batch_name: self.cell(row, Column::BatchName).to_string(),
            stage: stage_raw.parse()?,
            operator: self.cell(row, Column::Operator).to_string(),
            timestamp: self.required(row, Column::Timestamp)?,
            weight_kg: parse_weight(self.cell(row, Column::WeightKg))?,
            source: self.optional(row, Column::Source),
            destination: self.optional(row, Column::Destination),
            product_model: self.optional(row, Column::ProductModel),
            notes: self.optional(row, Column::Notes),
            location: self.optional(row, Column::Location),
        })
    }
}

/// True when every cell of `row` is blank.
pub fn is_blank_row<S: AsRef<str>>(row: &[S]) -> bool {
    row.iter().all(|c| c.as_ref().trim().is_empty())
}
