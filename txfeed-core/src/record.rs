//! Record and dataset model.
//!
//! A `Dataset` is a column list plus dense rows of `FieldValue`s. Source files
//! vary in their attributes, so cells are dynamically typed; the only columns
//! the pipeline relies on are the transaction identifier and the timestamp.

use chrono::NaiveDateTime;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Unique transaction identifier column.
pub const TRANSACTION_ID: &str = "TRANSACTION_ID";

/// Transaction timestamp column (Unix seconds in raw archive files).
pub const TX_DATETIME: &str = "TX_DATETIME";

/// Placeholder for "missing" in raw source data.
pub const SENTINEL: i64 = -1;

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Timestamp(NaiveDateTime),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// True if this cell holds the integer or float sentinel.
    pub fn is_sentinel(&self) -> bool {
        match self {
            FieldValue::Int(v) => *v == SENTINEL,
            FieldValue::Float(v) => *v == SENTINEL as f64,
            _ => false,
        }
    }

    /// Sort rank of the value's kind. Nulls sort last.
    fn rank(&self) -> u8 {
        match self {
            FieldValue::Int(_) | FieldValue::Float(_) => 0,
            FieldValue::Timestamp(_) => 1,
            FieldValue::Bool(_) => 2,
            FieldValue::Str(_) => 3,
            FieldValue::Null => 4,
        }
    }

    /// Total order used for dataset sorting.
    pub fn total_cmp(&self, other: &FieldValue) -> Ordering {
        use FieldValue::*;
        match (self, other) {
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => float_cmp(*a, *b),
            (Int(a), Float(b)) => int_float_cmp(*a, *b),
            (Float(a), Int(b)) => int_float_cmp(*b, *a).reverse(),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Str(a), Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Numeric order on floats; `-0.0 == 0.0`, NaNs sort by sign at the ends.
fn float_cmp(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

/// Exact comparison of an integer with a float, without rounding `a`.
fn int_float_cmp(a: i64, b: f64) -> Ordering {
    // 2^63 as f64
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

    if b.is_nan() {
        return if b.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if b >= I64_BOUND {
        return Ordering::Less;
    }
    if b < -I64_BOUND {
        return Ordering::Greater;
    }

    // Within range, the integral part of b is an exact i64
    let whole = b.trunc();
    match a.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&b).unwrap_or(Ordering::Equal),
        ord => ord,
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Str(v) => write!(f, "{v}"),
            FieldValue::Timestamp(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Int(v) => serializer.serialize_i64(*v),
            FieldValue::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            FieldValue::Float(_) => serializer.serialize_none(),
            FieldValue::Bool(v) => serializer.serialize_bool(*v),
            FieldValue::Str(v) => serializer.serialize_str(v),
            // Epoch milliseconds, matching tabular JSON exports
            FieldValue::Timestamp(ts) => serializer.serialize_i64(ts.and_utc().timestamp_millis()),
        }
    }
}

/// Borrowed view of one dataset row.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    index: usize,
    columns: &'a [String],
    values: &'a [FieldValue],
}

impl<'a> Record<'a> {
    /// Zero-based row position within the dataset.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, column: &str) -> Option<&'a FieldValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &'a [FieldValue] {
        self.values
    }

    /// JSON object with keys in column order.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Error returned when a row does not match the dataset's column count.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("row has {actual} cells, dataset has {expected} columns")]
pub struct RowWidthMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// An ordered, in-memory table of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<FieldValue>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<FieldValue>) -> Result<(), RowWidthMismatch> {
        if row.len() != self.columns.len() {
            return Err(RowWidthMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn record(&self, index: usize) -> Option<Record<'_>> {
        self.rows.get(index).map(|values| Record {
            index,
            columns: &self.columns,
            values,
        })
    }

    /// Records in dataset order; indices are dense and start at zero.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        self.rows.iter().enumerate().map(|(index, values)| Record {
            index,
            columns: &self.columns,
            values,
        })
    }

    /// Concatenate datasets. The result carries the union of all columns in
    /// first-appearance order; cells absent from a part are null.
    pub fn concat(parts: Vec<Dataset>) -> Dataset {
        let mut columns: Vec<String> = Vec::new();
        for part in &parts {
            for col in &part.columns {
                if !columns.contains(col) {
                    columns.push(col.clone());
                }
            }
        }

        let total: usize = parts.iter().map(|p| p.rows.len()).sum();
        let mut rows = Vec::with_capacity(total);
        for part in parts {
            if part.columns == columns {
                rows.extend(part.rows);
                continue;
            }
            let positions: HashMap<&str, usize> = part
                .columns
                .iter()
                .enumerate()
                .map(|(i, c)| (c.as_str(), i))
                .collect();
            for mut row in part.rows {
                let widened = columns
                    .iter()
                    .map(|c| match positions.get(c.as_str()) {
                        Some(&i) => std::mem::replace(&mut row[i], FieldValue::Null),
                        None => FieldValue::Null,
                    })
                    .collect();
                rows.push(widened);
            }
        }

        Dataset { columns, rows }
    }

    /// Stable sort by one column. Returns `false` if the column does not exist.
    pub fn sort_by_column(&mut self, column: &str) -> bool {
        let Some(idx) = self.column_index(column) else {
            return false;
        };
        self.rows.sort_by(|a, b| a[idx].total_cmp(&b[idx]));
        true
    }

    /// Replace every sentinel cell with zero of the same numeric kind.
    /// Returns the number of replaced cells.
    pub fn normalize_sentinels(&mut self) -> usize {
        let mut replaced = 0;
        for cell in self.rows.iter_mut().flatten() {
            if cell.is_sentinel() {
                let zero = if matches!(cell, FieldValue::Float(_)) {
                    FieldValue::Float(0.0)
                } else {
                    FieldValue::Int(0)
                };
                *cell = zero;
                replaced += 1;
            }
        }
        replaced
    }

    /// Rewrite every cell of `column` through `f(row_index, cell)`. Returns
    /// `false` if the column does not exist.
    pub fn try_map_column<E>(
        &mut self,
        column: &str,
        mut f: impl FnMut(usize, &FieldValue) -> Result<FieldValue, E>,
    ) -> Result<bool, E> {
        let Some(idx) = self.column_index(column) else {
            return Ok(false);
        };
        for (i, row) in self.rows.iter_mut().enumerate() {
            row[idx] = f(i, &row[idx])?;
        }
        Ok(true)
    }

    /// Promote integer cells to floats in every column that also holds
    /// floats, so each column has a single numeric type.
    pub fn promote_mixed_numeric(&mut self) {
        for idx in 0..self.columns.len() {
            let has_float = self
                .rows
                .iter()
                .any(|row| matches!(row[idx], FieldValue::Float(_)));
            if !has_float {
                continue;
            }
            for row in &mut self.rows {
                if let FieldValue::Int(v) = row[idx] {
                    row[idx] = FieldValue::Float(v as f64);
                }
            }
        }
    }

    /// Keep only rows for which `keep` returns true. Order is preserved and the
    /// row index stays dense.
    pub fn retain(&mut self, mut keep: impl FnMut(Record<'_>) -> bool) {
        let columns = &self.columns;
        let mut index = 0;
        self.rows.retain(|values| {
            let record = Record {
                index,
                columns,
                values,
            };
            index += 1;
            keep(record)
        });
    }

    /// Largest timestamp in `column`, ignoring non-timestamp cells.
    pub fn max_timestamp(&self, column: &str) -> Option<NaiveDateTime> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .filter_map(|row| row[idx].as_timestamp())
            .max()
    }

    /// BLAKE3 fingerprint over column names and serialized rows.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for col in &self.columns {
            hasher.update(col.as_bytes());
            hasher.update(&[0]);
        }
        for record in self.records() {
            // Serializing plain scalars into a Vec cannot fail
            if let Ok(bytes) = serde_json::to_vec(&record) {
                hasher.update(&bytes);
            }
            hasher.update(b"\n");
        }
        hasher.finalize().to_hex().to_string()
    }
}
