//! CSV reader with per-cell type inference.

use super::error::DataError;
use crate::record::{Dataset, FieldValue};
use std::path::Path;

/// Read a headed CSV file into a dataset.
///
/// Cells are typed individually (empty → null, then integer, float, bool,
/// string). Columns that mix integers and floats are promoted to floats.
/// Ragged rows and files without a header are parse errors.
pub fn read_csv(path: &Path) -> Result<Dataset, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| match e.into_kind() {
            csv::ErrorKind::Io(io) => DataError::io(path, io),
            other => DataError::parse(path, format!("{other:?}")),
        })?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DataError::parse(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(DataError::parse(path, "no header row"));
    }

    let mut dataset = Dataset::new(headers);
    for result in reader.records() {
        let record = result.map_err(|e| DataError::parse(path, e))?;
        let row = record.iter().map(parse_cell).collect();
        dataset
            .push_row(row)
            .map_err(|e| DataError::parse(path, e))?;
    }

    dataset.promote_mixed_numeric();
    Ok(dataset)
}

fn parse_cell(raw: &str) -> FieldValue {
    let cell = raw.trim();
    if cell.is_empty() {
        return FieldValue::Null;
    }
    if let Ok(v) = cell.parse::<i64>() {
        return FieldValue::Int(v);
    }
    if let Ok(v) = cell.parse::<f64>() {
        return FieldValue::Float(v);
    }
    match cell {
        "true" | "True" | "TRUE" => FieldValue::Bool(true),
        "false" | "False" | "FALSE" => FieldValue::Bool(false),
        _ => FieldValue::Str(cell.to_string()),
    }
}
