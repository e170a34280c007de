//! Dataset loading: date-range loads, archive merges, and the
//! cutoff / time-window transaction filter.
//!
//! Datasets are read fully into memory. A date-range load skips files that
//! fail to parse and reports them in `LoadedDataset::skipped`; every other
//! failure, including an empty file set, is returned as an error.

use super::error::DataError;
use super::source::{read_file, select_files, FileFormat, SourceKind};
use crate::record::{Dataset, FieldValue, TX_DATETIME};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A file left out of a load, with the reason it could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a date-range load.
#[derive(Debug)]
pub struct LoadedDataset {
    /// Sorted, sentinel-normalized records.
    pub dataset: Dataset,
    /// Files that were parsed and merged, in name order.
    pub files: Vec<PathBuf>,
    /// Files that matched the range but failed to parse.
    pub skipped: Vec<SkippedFile>,
}

/// Load every `kind` file in `dir` whose name falls within `[begin, end]`.
///
/// The merged dataset is stable-sorted by the source's sort key and all
/// sentinel `-1` cells are replaced with `0`. Columns that are integer in one
/// file and float in another come out as float.
pub fn load_range(
    dir: &Path,
    begin: &str,
    end: &str,
    kind: SourceKind,
) -> Result<LoadedDataset, DataError> {
    let candidates = select_files(dir, begin, end, kind.suffix())?;
    debug!(
        source = %kind,
        dir = %dir.display(),
        count = candidates.len(),
        "selected source files"
    );

    let mut frames = Vec::with_capacity(candidates.len());
    let mut files = Vec::with_capacity(candidates.len());
    let mut skipped = Vec::new();

    for path in candidates {
        match read_file(&path, kind.format()) {
            Ok(frame) => {
                frames.push(frame);
                files.push(path);
            }
            Err(e) if e.is_recoverable() => {
                warn!(file = %path.display(), error = %e, "skipping file");
                skipped.push(SkippedFile {
                    path,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    if frames.is_empty() {
        return Err(DataError::EmptyInput(format!(
            "no readable {kind} files in {} for {begin}..={end}",
            dir.display()
        )));
    }

    let mut dataset = Dataset::concat(frames);
    dataset.promote_mixed_numeric();
    sort_by(&mut dataset, kind.sort_key())?;
    let replaced = dataset.normalize_sentinels();

    info!(
        source = %kind,
        rows = dataset.len(),
        files = files.len(),
        skipped = skipped.len(),
        sentinels = replaced,
        "loaded dataset"
    );

    Ok(LoadedDataset {
        dataset,
        files,
        skipped,
    })
}

/// Read and concatenate CSV files, stable-sorted by `TX_DATETIME`.
///
/// Unlike `load_range`, any unreadable file fails the whole merge.
pub fn merge_files(files: &[PathBuf]) -> Result<Dataset, DataError> {
    if files.is_empty() {
        return Err(DataError::EmptyInput("no files to merge".into()));
    }

    let frames = files
        .iter()
        .map(|path| read_file(path, FileFormat::Csv))
        .collect::<Result<Vec<_>, _>>()?;

    let mut dataset = Dataset::concat(frames);
    dataset.promote_mixed_numeric();
    sort_by(&mut dataset, TX_DATETIME)?;
    Ok(dataset)
}

/// Row filter applied by `load_transactions`.
///
/// `cutoff` and `window_days` are mutually exclusive; setting both is a
/// configuration error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Keep transactions strictly after this date (midnight).
    pub cutoff: Option<NaiveDate>,
    /// Keep roughly the last N days relative to the newest transaction.
    pub window_days: Option<u32>,
}

impl TransactionFilter {
    pub fn cutoff(date: NaiveDate) -> Self {
        Self {
            cutoff: Some(date),
            window_days: None,
        }
    }

    pub fn window(days: u32) -> Self {
        Self {
            cutoff: None,
            window_days: Some(days),
        }
    }

    pub fn validate(&self) -> Result<(), DataError> {
        if self.cutoff.is_some() && self.window_days.is_some() {
            return Err(DataError::ConflictingFilters);
        }
        Ok(())
    }

    /// Exclusive lower bound on `TX_DATETIME`, or `None` to keep everything.
    ///
    /// A window reaching past the earliest representable date keeps
    /// everything.
    fn threshold(&self, dataset: &Dataset) -> Option<NaiveDateTime> {
        if let Some(date) = self.cutoff {
            return Some(date.and_time(NaiveTime::MIN));
        }
        let days = self.window_days?;
        let newest = dataset.max_timestamp(TX_DATETIME)?;
        let span = Duration::try_days(i64::from(days) + 1)?;
        let start = newest.checked_sub_signed(span)?;
        // Day granularity: compare against midnight of the start date
        Some(start.date().and_time(NaiveTime::MIN))
    }
}

/// Merge archive files, convert Unix-seconds `TX_DATETIME` into timestamps,
/// replace sentinel `-1` cells with `0`, then apply `filter`.
///
/// The filter is validated before any file is opened.
pub fn load_transactions(
    files: &[PathBuf],
    filter: &TransactionFilter,
) -> Result<Dataset, DataError> {
    filter.validate()?;

    let mut dataset = merge_files(files)?;
    dataset.try_map_column(TX_DATETIME, unix_seconds_to_timestamp)?;
    let replaced = dataset.normalize_sentinels();

    if let Some(threshold) = filter.threshold(&dataset) {
        let before = dataset.len();
        dataset.retain(|record| {
            record
                .get(TX_DATETIME)
                .and_then(FieldValue::as_timestamp)
                .is_some_and(|ts| ts > threshold)
        });
        debug!(%threshold, kept = dataset.len(), dropped = before - dataset.len(), "filtered transactions");
    }

    info!(
        files = files.len(),
        rows = dataset.len(),
        sentinels = replaced,
        "loaded transactions"
    );
    Ok(dataset)
}

fn sort_by(dataset: &mut Dataset, column: &str) -> Result<(), DataError> {
    if dataset.sort_by_column(column) {
        Ok(())
    } else {
        Err(DataError::MissingColumn {
            column: column.to_string(),
        })
    }
}

fn unix_seconds_to_timestamp(row: usize, value: &FieldValue) -> Result<FieldValue, DataError> {
    let invalid = || DataError::InvalidTimestamp {
        row,
        value: value.to_string(),
    };

    match value {
        FieldValue::Null | FieldValue::Timestamp(_) => Ok(value.clone()),
        FieldValue::Int(secs) => DateTime::from_timestamp(*secs, 0)
            .map(|dt| FieldValue::Timestamp(dt.naive_utc()))
            .ok_or_else(invalid),
        FieldValue::Float(secs) if secs.is_nan() => Ok(FieldValue::Null),
        FieldValue::Float(secs) if secs.is_finite() => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
            DateTime::from_timestamp(whole as i64, nanos)
                .map(|dt| FieldValue::Timestamp(dt.naive_utc()))
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}
