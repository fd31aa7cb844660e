use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use serde_json::Value;

use super::types::Extraction;
use super::ExtractionError;
use crate::models::{ExtractionPayload, Sheet, Sheets, SourceKind, SpreadsheetContent};

/// Reads every sheet of an XLSX/XLS workbook. The first row of each sheet
/// is its header; the remaining rows are data.
pub struct SpreadsheetExtractor;

impl SpreadsheetExtractor {
    pub fn extract(&self, path: &Path) -> Extraction {
        match read_workbook(path) {
            Ok(sheets) => Extraction::Complete(ExtractionPayload::Spreadsheet(SpreadsheetContent {
                sheets,
                error: None,
            })),
            Err(e) => {
                tracing::warn!(error = %e, "Workbook extraction failed");
                Extraction::empty(SourceKind::Spreadsheet, e.to_string())
            }
        }
    }
}

fn read_workbook(path: &Path) -> Result<Sheets, ExtractionError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| ExtractionError::Spreadsheet(e.to_string()))?;

    let mut sheets = Sheets::default();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractionError::Spreadsheet(format!("sheet {name}: {e}")))?;
        sheets.push(name, sheet_from_range(&range));
    }
    Ok(sheets)
}

fn sheet_from_range(range: &Range<Data>) -> Sheet {
    let mut rows = range.rows();
    let columns = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(i, cell)| column_name(i, cell))
            .collect(),
        None => Vec::new(),
    };

    let rows: Vec<Vec<Value>> = rows
        .map(|row| row.iter().map(cell_value).collect())
        .collect();

    Sheet {
        columns,
        row_count: rows.len(),
        rows,
    }
}

fn column_name(index: usize, cell: &Data) -> String {
    match cell {
        Data::Empty => format!("Unnamed: {index}"),
        Data::String(s) if s.trim().is_empty() => format!("Unnamed: {index}"),
        other => match cell_value(other) {
            Value::String(s) => s,
            value => value.to_string(),
        },
    }
}

/// Convert one cell to JSON. Whole floats become integers, since the
/// workbook formats store every number as a double.
fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => float_value(*f),
        Data::String(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => Value::String(naive.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => float_value(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(e) => Value::String(e.to_string()),
    }
}

fn float_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
