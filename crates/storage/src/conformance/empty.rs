use super::{make_record, read, write, TestResult};
use crate::TableBackend;
use elvtrace_core::Stage;

pub(super) fn run_empty_tests<B, F>(factory: &F) -> Vec<TestResult>
where
    B: TableBackend,
    F: Fn() -> B,
{
    vec![
        TestResult::from_result(
            "empty",
            "fresh_table_reads_empty",
            fresh_table_reads_empty(factory),
        ),
        TestResult::from_result(
            "empty",
            "written_empty_reads_empty",
            written_empty_reads_empty(factory),
        ),
        TestResult::from_result(
            "empty",
            "write_marks_table_present",
            write_marks_table_present(factory),
        ),
    ]
}

fn fresh_table_reads_empty<B: TableBackend, F: Fn() -> B>(factory: &F) -> Result<(), String> {
    let backend = factory();
    let rows = read(&backend)?;
    if !rows.is_empty() {
        return Err(format!("expected no rows, got {}", rows.len()));
    }
    Ok(())
}

fn written_empty_reads_empty<B: TableBackend, F: Fn() -> B>(factory: &F) -> Result<(), String> {
    let backend = factory();
    write(&backend, &[make_record("ABCD1234", Stage::Created, "2024-08-01 09:00:00")])?;
    write(&backend, &[])?;
    let rows = read(&backend)?;
    if !rows.is_empty() {
        return Err(format!("expected no rows after empty write, got {}", rows.len()));
    }
    Ok(())
}

fn write_marks_table_present<B: TableBackend, F: Fn() -> B>(factory: &F) -> Result<(), String> {
    let backend = factory();
    write(&backend, &[])?;
    if !backend.is_present() {
        return Err("table not present after write_all".to_string());
    }
    Ok(())
}
