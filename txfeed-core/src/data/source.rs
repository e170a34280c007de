//! Source kinds and file selection.
//!
//! Each source lives in a directory of date-named files with a fixed suffix,
//! e.g. `2020-05-01.parquet` or `2020-05-01_fraud.csv`. Selection compares
//! file names lexically against `{begin}{suffix}` and `{end}{suffix}`.

use super::error::DataError;
use super::{csv_reader, snapshot};
use crate::record::{Dataset, TRANSACTION_ID, TX_DATETIME};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk encoding of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Parquet,
    Csv,
}

/// Which feed a run reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Daily transaction snapshots (`YYYY-MM-DD.parquet`).
    Transactions,
    /// Daily fraud labels (`YYYY-MM-DD_fraud.csv`).
    Fraud,
    /// Archived simulator output: every CSV in a directory, or one file.
    Archive,
}

impl SourceKind {
    pub fn suffix(self) -> &'static str {
        match self {
            SourceKind::Transactions => ".parquet",
            SourceKind::Fraud => "_fraud.csv",
            SourceKind::Archive => ".csv",
        }
    }

    pub fn format(self) -> FileFormat {
        match self {
            SourceKind::Transactions => FileFormat::Parquet,
            SourceKind::Fraud | SourceKind::Archive => FileFormat::Csv,
        }
    }

    /// Column the loaded dataset is ordered by.
    pub fn sort_key(self) -> &'static str {
        match self {
            SourceKind::Transactions | SourceKind::Fraud => TRANSACTION_ID,
            SourceKind::Archive => TX_DATETIME,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Transactions => "transactions",
            SourceKind::Fraud => "fraud",
            SourceKind::Archive => "archive",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a single file in the given format.
pub fn read_file(path: &Path, format: FileFormat) -> Result<Dataset, DataError> {
    match format {
        FileFormat::Parquet => snapshot::read_snapshot(path),
        FileFormat::Csv => csv_reader::read_csv(path),
    }
}

/// Files in `dir` whose names end with `suffix` and fall lexically within
/// `[begin + suffix, end + suffix]`, sorted by name.
pub fn select_files(
    dir: &Path,
    begin: &str,
    end: &str,
    suffix: &str,
) -> Result<Vec<PathBuf>, DataError> {
    let lower = format!("{begin}{suffix}");
    let upper = format!("{end}{suffix}");

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| DataError::io(dir, e))? {
        let entry = entry.map_err(|e| DataError::io(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.ends_with(suffix) {
            continue;
        }
        if name >= lower.as_str() && name <= upper.as_str() {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

/// File set for an archive replay: `loc` itself if it names a `.csv` file,
/// otherwise every regular file directly inside `loc`, sorted by name.
pub fn archive_files(loc: &Path) -> Result<Vec<PathBuf>, DataError> {
    if loc.extension().and_then(|e| e.to_str()) == Some("csv") {
        return Ok(vec![loc.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(loc).map_err(|e| DataError::io(loc, e))? {
        let entry = entry.map_err(|e| DataError::io(loc, e))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
