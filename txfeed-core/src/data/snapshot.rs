//! Parquet snapshot reader.
//!
//! Daily transaction snapshots are serialized tables. Column types are taken
//! from the file; integer, float, boolean, string, date and datetime columns
//! map onto `FieldValue`. Anything else is carried as its display string.

use super::error::DataError;
use crate::record::{Dataset, FieldValue};
use chrono::DateTime;
use polars::prelude::*;
use std::fs;
use std::path::Path;

/// Read one Parquet snapshot into a dataset.
pub fn read_snapshot(path: &Path) -> Result<Dataset, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::io(path, e))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::parse(path, format!("read parquet: {e}")))?;

    dataframe_to_dataset(&df).map_err(|e| DataError::parse(path, format!("column read: {e}")))
}

/// Convert a DataFrame into a row-oriented dataset.
pub fn dataframe_to_dataset(df: &DataFrame) -> Result<Dataset, PolarsError> {
    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let series: Vec<&Series> = df
        .get_columns()
        .iter()
        .map(|c| c.as_materialized_series())
        .collect();

    let mut dataset = Dataset::new(columns);
    for i in 0..df.height() {
        let mut row = Vec::with_capacity(series.len());
        for s in &series {
            row.push(any_to_field(s.get(i)?));
        }
        dataset
            .push_row(row)
            .map_err(|e| PolarsError::ComputeError(e.to_string().into()))?;
    }

    Ok(dataset)
}

fn any_to_field(value: AnyValue<'_>) -> FieldValue {
    match value {
        AnyValue::Null => FieldValue::Null,
        AnyValue::Boolean(v) => FieldValue::Bool(v),
        AnyValue::Int8(v) => FieldValue::Int(v.into()),
        AnyValue::Int16(v) => FieldValue::Int(v.into()),
        AnyValue::Int32(v) => FieldValue::Int(v.into()),
        AnyValue::Int64(v) => FieldValue::Int(v),
        AnyValue::UInt8(v) => FieldValue::Int(v.into()),
        AnyValue::UInt16(v) => FieldValue::Int(v.into()),
        AnyValue::UInt32(v) => FieldValue::Int(v.into()),
        AnyValue::UInt64(v) => match i64::try_from(v) {
            Ok(v) => FieldValue::Int(v),
            Err(_) => FieldValue::Float(v as f64),
        },
        AnyValue::Float32(v) => FieldValue::Float(v.into()),
        AnyValue::Float64(v) => FieldValue::Float(v),
        AnyValue::String(s) => FieldValue::Str(s.to_string()),
        AnyValue::StringOwned(s) => FieldValue::Str(s.to_string()),
        AnyValue::Date(days) => DateTime::from_timestamp(i64::from(days) * 86_400, 0)
            .map(|dt| FieldValue::Timestamp(dt.naive_utc()))
            .unwrap_or(FieldValue::Null),
        AnyValue::Datetime(v, unit, _) => {
            let dt = match unit {
                TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
                TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
                TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
            };
            dt.map(|dt| FieldValue::Timestamp(dt.naive_utc()))
                .unwrap_or(FieldValue::Null)
        }
        other => FieldValue::Str(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_parquet(df: &mut DataFrame, path: &Path) {
        let file = fs::File::create(path).unwrap();
        ParquetWriter::new(file).finish(df).unwrap();
    }

    #[test]
    fn reads_typed_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2020-05-01.parquet");

        let mut df = DataFrame::new(vec![
            Column::new("TRANSACTION_ID".into(), vec![1i64, 0]),
            Column::new("AMOUNT".into(), vec![Some(12.5f64), None]),
            Column::new("TX_FRAUD".into(), vec![true, false]),
            Column::new("TERMINAL".into(), vec!["T1", "T2"]),
        ])
        .unwrap();
        write_parquet(&mut df, &path);

        let ds = read_snapshot(&path).unwrap();
        assert_eq!(ds.columns(), &["TRANSACTION_ID", "AMOUNT", "TX_FRAUD", "TERMINAL"]);
        assert_eq!(ds.len(), 2);

        let first = ds.record(0).unwrap();
        assert_eq!(first.get("TRANSACTION_ID"), Some(&FieldValue::Int(1)));
        assert_eq!(first.get("AMOUNT"), Some(&FieldValue::Float(12.5)));
        assert_eq!(first.get("TX_FRAUD"), Some(&FieldValue::Bool(true)));
        assert_eq!(first.get("TERMINAL"), Some(&FieldValue::Str("T1".into())));
        assert_eq!(ds.record(1).unwrap().get("AMOUNT"), Some(&FieldValue::Null));
    }

    #[test]
    fn datetime_columns_become_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2020-05-01.parquet");

        let millis = 1_588_291_201_000i64;
        let mut df = DataFrame::new(vec![Column::new("TX_DATETIME".into(), vec![millis])
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap()])
        .unwrap();
        write_parquet(&mut df, &path);

        let ds = read_snapshot(&path).unwrap();
        let ts = ds.record(0).unwrap().get("TX_DATETIME").unwrap().as_timestamp();
        assert_eq!(ts.map(|t| t.and_utc().timestamp_millis()), Some(millis));
    }

    #[test]
    fn garbage_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2020-05-01.parquet");
        fs::write(&path, b"definitely not parquet").unwrap();

        let err = read_snapshot(&path).unwrap_err();
        assert!(err.is_recoverable(), "expected parse error, got {err}");
    }
}
