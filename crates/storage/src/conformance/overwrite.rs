use super::{make_full_record, make_record, read, write, TestResult};
use crate::TableBackend;
use elvtrace_core::Stage;

pub(super) fn run_overwrite_tests<B, F>(factory: &F) -> Vec<TestResult>
where
    B: TableBackend,
    F: Fn() -> B,
{
    vec![
        TestResult::from_result(
            "overwrite",
            "second_write_replaces_first",
            second_write_replaces_first(factory),
        ),
        TestResult::from_result(
            "overwrite",
            "shorter_write_truncates",
            shorter_write_truncates(factory),
        ),
        TestResult::from_result(
            "overwrite",
            "read_then_append_then_write",
            read_then_append_then_write(factory),
        ),
    ]
}

fn second_write_replaces_first<B: TableBackend, F: Fn() -> B>(factory: &F) -> Result<(), String> {
    let backend = factory();
    write(&backend, &[make_record("OLD00000", Stage::Created, "2024-08-01 09:00:00")])?;
    write(&backend, &[make_record("NEW00000", Stage::Created, "2024-08-02 09:00:00")])?;
    let rows = read(&backend)?;
    if rows.len() != 1 || rows[0].batch_code != "NEW00000" {
        return Err(format!("expected only NEW00000, got {:?}", rows));
    }
    Ok(())
}

fn shorter_write_truncates<B: TableBackend, F: Fn() -> B>(factory: &F) -> Result<(), String> {
    let backend = factory();
    let many: Vec<_> = (0..5).map(|i| make_full_record(&format!("ABCD000{}", i))).collect();
    write(&backend, &many)?;
    write(&backend, &many[..2])?;
    let rows = read(&backend)?;
    if rows.len() != 2 {
        return Err(format!("expected 2 rows after truncating write, got {}", rows.len()));
    }
    Ok(())
}

fn read_then_append_then_write<B: TableBackend, F: Fn() -> B>(factory: &F) -> Result<(), String> {
    let backend = factory();
    write(&backend, &[make_record("ABCD1234", Stage::Created, "2024-08-01 09:00:00")])?;
    let mut rows = read(&backend)?;
    rows.push(make_record("ABCD1234", Stage::Shipped, "2024-08-01 10:00:00"));
    write(&backend, &rows)?;
    let after = read(&backend)?;
    let stages: Vec<Stage> = after.iter().map(|r| r.stage).collect();
    if stages != [Stage::Created, Stage::Shipped] {
        return Err(format!("unexpected stages after append: {:?}", stages));
    }
    Ok(())
}
