//! Structured error types for data loading.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from reading, merging and filtering source files.
///
/// Only `Parse` is recoverable: date-range loads skip the offending file and
/// report it alongside the dataset. Everything else aborts the load.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("column '{column}' not found")]
    MissingColumn { column: String },

    #[error("invalid timestamp in row {row}: {value}")]
    InvalidTimestamp { row: usize, value: String },

    #[error("cutoff date and time window are mutually exclusive")]
    ConflictingFilters,
}

impl DataError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn parse(path: &Path, reason: impl ToString) -> Self {
        DataError::Parse {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that affect a single file and can be skipped.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DataError::Parse { .. })
    }
}
