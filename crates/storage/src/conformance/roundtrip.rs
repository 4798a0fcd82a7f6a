use super::{make_full_record, make_record, read, write, TestResult};
use crate::TableBackend;
use elvtrace_core::{Stage, TraceRecord};
use rust_decimal::Decimal;

pub(super) fn run_roundtrip_tests<B, F>(factory: &F) -> Vec<TestResult>
where
    B: TableBackend,
    F: Fn() -> B,
{
    vec![
        TestResult::from_result(
            "roundtrip",
            "single_record_reads_back",
            single_record_reads_back(factory),
        ),
        TestResult::from_result(
            "roundtrip",
            "optional_fields_verbatim",
            optional_fields_verbatim(factory),
        ),
        TestResult::from_result(
            "roundtrip",
            "padded_text_verbatim",
            padded_text_verbatim(factory),
        ),
        TestResult::from_result(
            "roundtrip",
            "storage_order_preserved",
            storage_order_preserved(factory),
        ),
        TestResult::from_result(
            "roundtrip",
            "zero_weight_is_not_absent",
            zero_weight_is_not_absent(factory),
        ),
        TestResult::from_result(
            "roundtrip",
            "duplicates_are_kept",
            duplicates_are_kept(factory),
        ),
    ]
}

fn expect_same(expected: &[TraceRecord], actual: &[TraceRecord]) -> Result<(), String> {
    if expected.len() != actual.len() {
        return Err(format!(
            "expected {} rows, got {}",
            expected.len(),
            actual.len()
        ));
    }
    for (i, (e, a)) in expected.iter().zip(actual).enumerate() {
        if e != a {
            return Err(format!("row {} differs: expected {:?}, got {:?}", i, e, a));
        }
    }
    Ok(())
}

fn single_record_reads_back<B: TableBackend, F: Fn() -> B>(factory: &F) -> Result<(), String> {
    let backend = factory();
    let records = vec![make_record("ABCD1234", Stage::Created, "2024-08-01 09:00:00")];
    write(&backend, &records)?;
    expect_same(&records, &read(&backend)?)
}

fn optional_fields_verbatim<B: TableBackend, F: Fn() -> B>(factory: &F) -> Result<(), String> {
    let backend = factory();
    let records = vec![make_full_record("ABCD1234")];
    write(&backend, &records)?;
    expect_same(&records, &read(&backend)?)
}

fn padded_text_verbatim<B: TableBackend, F: Fn() -> B>(factory: &F) -> Result<(), String> {
    let backend = factory();
    let mut padded = make_record("ABCD1234", Stage::Shipped, "2024-08-01 10:00:00");
    padded.batch_name = "  PP batch ".to_string();
    padded.operator = " Alice ".to_string();
    padded.notes = Some("  indented note".to_string());
    padded.location = Some("Taoyuan\t".to_string());
    let records = vec![padded];
    write(&backend, &records)?;
    expect_same(&records, &read(&backend)?)
}

fn storage_order_preserved<B: TableBackend, F: Fn() -> B>(factory: &F) -> Result<(), String> {
    let backend = factory();
    // Deliberately not in timestamp order.
    let records = vec![
        make_record("B0000002", Stage::Shipped, "2024-08-03 09:00:00"),
        make_record("A0000001", Stage::Created, "2024-08-01 09:00:00"),
        make_record("B0000002", Stage::Created, "2024-08-02 09:00:00"),
    ];
    write(&backend, &records)?;
    expect_same(&records, &read(&backend)?)
}

fn zero_weight_is_not_absent<B: TableBackend, F: Fn() -> B>(factory: &F) -> Result<(), String> {
    let backend = factory();
    let mut zero = make_record("ABCD1234", Stage::Sold, "2024-08-01 09:00:00");
    zero.weight_kg = Some(Decimal::ZERO);
    let none = make_record("ABCD1234", Stage::Sold, "2024-08-01 09:00:01");
    write(&backend, &[zero, none])?;
    let rows = read(&backend)?;
    match rows.as_slice() {
        [a, b] if a.weight_kg == Some(Decimal::ZERO) && b.weight_kg.is_none() => Ok(()),
        other => Err(format!("weights not preserved: {:?}", other)),
    }
}

fn duplicates_are_kept<B: TableBackend, F: Fn() -> B>(factory: &F) -> Result<(), String> {
    let backend = factory();
    let r = make_record("ABCD1234", Stage::Shipped, "2024-08-01 09:00:00");
    let records = vec![r.clone(), r];
    write(&backend, &records)?;
    expect_same(&records, &read(&backend)?)
}
