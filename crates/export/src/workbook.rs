use elvtrace_core::schema::{record_to_row, Column, COLUMNS};
use elvtrace_core::TraceRecord;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook};

use crate::ExportError;

pub const SHEET_NAME: &str = "Trace records";

/// One-sheet workbook, header row first. `weight_kg` is written as a number,
/// everything else as text.
pub fn to_workbook(records: &[TraceRecord]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    // Fixed creation time keeps the output byte-identical across runs.
    let created = ExcelDateTime::from_ymd(2000, 1, 1)?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));

    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &header)?;
    }

    let weight_col = Column::WeightKg.index();
    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, cell) in record_to_row(record).iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            if col == weight_col {
                if let Some(w) = record.weight_kg.and_then(|w| w.to_f64()) {
                    sheet.write_number(row, col as u16, w)?;
                    continue;
                }
            }
            sheet.write_string(row, col as u16, cell)?;
        }
    }

    sheet.set_column_width(Column::Timestamp.index() as u16, 20)?;
    sheet.set_column_width(Column::Notes.index() as u16, 30)?;

    Ok(workbook.save_to_buffer()?)
}
