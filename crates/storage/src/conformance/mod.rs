//! Conformance test suite for [`TableBackend`] implementations.
//!
//! Backend-agnostic checks that any implementation can run:
//!
//! - **Round trip**: what is written reads back verbatim, in order
//! - **Overwrite**: `write_all` replaces the table; it never merges
//! - **Empty**: a fresh table and a table written empty both read as empty
//!
//! # Usage
//!
//! Call [`run_conformance_suite`] with a factory that creates a fresh,
//! empty backend for each test:
//!
//! ```ignore
//! use elvtrace_storage::conformance::run_conformance_suite;
//!
//! #[test]
//! fn memory_conformance() {
//!     let report = run_conformance_suite(|| MemoryBackend::new("t"));
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod empty;
mod overwrite;
mod roundtrip;

use std::fmt;

use elvtrace_core::{Stage, TraceRecord};
use rust_decimal::Decimal;

use crate::TableBackend;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "roundtrip", "overwrite").
    pub category: String,
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full suite. `factory` is called once per test so every test
/// starts from an empty table.
pub fn run_conformance_suite<B, F>(factory: F) -> ConformanceReport
where
    B: TableBackend,
    F: Fn() -> B,
{
    let mut results = Vec::new();

    results.extend(empty::run_empty_tests(&factory));
    results.extend(roundtrip::run_roundtrip_tests(&factory));
    results.extend(overwrite::run_overwrite_tests(&factory));

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn make_record(code: &str, stage: Stage, timestamp: &str) -> TraceRecord {
    TraceRecord::new(code, format!("{} batch", code), stage, "conformance", timestamp)
}

/// A record with every optional field set, including awkward text.
fn make_full_record(code: &str) -> TraceRecord {
    let mut r = make_record(code, Stage::Received, "2024-08-01 14:30:00");
    r.weight_kg = Some(Decimal::new(4985, 1));
    r.source = Some("Dismantler, \"north\" yard".to_string());
    r.destination = Some("Regrind plant".to_string());
    r.product_model = Some("PP-7".to_string());
    r.notes = Some("line one\nline two".to_string());
    r.location = Some("桃園".to_string());
    r
}

fn read<B: TableBackend>(backend: &B) -> Result<Vec<TraceRecord>, String> {
    backend
        .read_all()
        .map_err(|e| format!("read_all failed: {}", e))
}

fn write<B: TableBackend>(backend: &B, records: &[TraceRecord]) -> Result<(), String> {
    backend
        .write_all(records)
        .map_err(|e| format!("write_all failed: {}", e))
}
