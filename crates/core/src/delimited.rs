//! Delimited-text codec for the trace table.
//!
//! Output is UTF-8 with a leading byte-order mark so spreadsheet tools pick
//! the right encoding. Input may carry the BOM or not.

use crate::record::TraceRecord;
use crate::schema::{header_row, is_blank_row, record_to_row, HeaderMap, SchemaError};

pub const BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, thiserror::Error)]
pub enum DelimitedError {
    #[error("malformed delimited text: {0}")]
    Csv(#[from] csv::Error),

    #[error("bad header row: {0}")]
    Header(SchemaError),

    #[error("line {line}: {source}")]
    Row { line: u64, source: SchemaError },

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode `records` (header first, in the given order).
pub fn encode(records: &[TraceRecord]) -> Result<Vec<u8>, DelimitedError> {
    let mut out = BOM.to_vec();
    {
        let mut writer = csv::Writer::from_writer(&mut out);
        writer.write_record(header_row())?;
        for record in records {
            writer.write_record(record_to_row(record))?;
        }
        writer.flush()?;
    }
    Ok(out)
}

/// Decode a table written by [`encode`] (or any file with the same headers).
///
/// Empty input is an empty table. Blank rows are skipped.
pub fn decode(bytes: &[u8]) -> Result<Vec<TraceRecord>, DelimitedError> {
    let body = bytes.strip_prefix(BOM).unwrap_or(bytes);
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(body);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let map = HeaderMap::resolve(&headers).map_err(DelimitedError::Header)?;

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let cells: Vec<&str> = row.iter().collect();
        if is_blank_row(&cells) {
            continue;
        }
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let record = map
            .record_from_row(&cells)
            .map_err(|source| DelimitedError::Row { line, source })?;
        records.push(record);
    }
    Ok(records)
}
