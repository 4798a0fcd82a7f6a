//! Every batch label in one ZIP archive.

use std::io::{Cursor, Write};

use elvtrace_core::query::BatchSummary;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::CodegenError;
use crate::qr::generate;

/// `QR_{code}_{name}` with characters that are unsafe in file names
/// replaced by `_`.
pub fn label_file_stem(batch_code: &str, batch_name: &str) -> String {
    format!("QR_{}_{}", sanitize(batch_code), sanitize(batch_name))
}

fn sanitize(part: &str) -> String {
    let cleaned: String = part
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// A ZIP with a PNG label and an info text file per batch, in input order.
pub fn label_bundle(batches: &[BatchSummary], base_url: &str) -> Result<Vec<u8>, CodegenError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for batch in batches {
        let label = generate(&batch.batch_code, base_url)?;
        let stem = label_file_stem(&batch.batch_code, &batch.batch_name);

        zip.start_file(format!("{}.png", stem), options)?;
        zip.write_all(&label.png)?;

        zip.start_file(format!("{}_info.txt", stem), options)?;
        write!(
            zip,
            "Batch code: {}\nBatch name: {}\nCreated: {}\nScan URL: {}\n",
            batch.batch_code, batch.batch_name, batch.created_at, label.url
        )?;
    }

    let cursor = zip.finish()?;
    tracing::info!(labels = batches.len(), "built label bundle");
    Ok(cursor.into_inner())
}
