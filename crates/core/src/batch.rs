//! Batch codes and the records that open a batch.

use rand::Rng;

use crate::record::{Stage, TraceRecord};

/// Length of a generated batch code.
pub const CODE_LEN: usize = 8;

/// Canonical form of a caller-supplied code: trimmed, uppercase.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// A random code of [`CODE_LEN`] uppercase hex digits.
pub fn random_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    (0..CODE_LEN)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect()
}

/// Draw codes until one is not already taken in `records`.
pub fn fresh_code<R: Rng + ?Sized>(rng: &mut R, records: &[TraceRecord]) -> String {
    loop {
        let code = random_code(rng);
        if !records.iter().any(|r| r.batch_code == code) {
            return code;
        }
    }
}

/// Name of batch `code`, taken from its first record in storage order.
pub fn batch_name_of<'a>(records: &'a [TraceRecord], code: &str) -> Option<&'a str> {
    records
        .iter()
        .find(|r| r.batch_code == code)
        .map(|r| r.batch_name.as_str())
}

/// The system-generated record that opens a batch.
pub fn opening_record(code: &str, name: &str, created_by: &str, timestamp: String) -> TraceRecord {
    let mut record = TraceRecord::new(
        code,
        name,
        Stage::Created,
        format!("{} (label generator)", created_by),
        timestamp,
    );
    record.notes = Some(format!("Label created for batch {}", name));
    record
}
