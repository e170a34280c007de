//! Replay runner: wires the loaders to the publisher.
//!
//! Two entry points:
//! - `run_upload()`: load the configured source and publish it to a bridge.
//! - `inspect()`: load the source and write the first records as JSON lines.

use std::io::Write;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use txfeed_core::data::{
    archive_files, load_range, load_transactions, DataError, LoadedDataset, SkippedFile,
    SourceKind,
};
use txfeed_core::publish::{
    publish_dataset, Bridge, Delivered, PublishError, PublishProgress, Sleeper,
};

use crate::config::{ConfigError, ReplayConfig};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// Process exit code for this failure.
    ///
    /// 1 = bad configuration, 2 = unusable input, 3 = bridge kept rejecting,
    /// 4 = bridge unreachable.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(_) => 1,
            RunError::Data(DataError::ConflictingFilters) => 1,
            RunError::Data(_) => 2,
            RunError::Publish(PublishError::Exhausted { .. }) => 3,
            RunError::Publish(PublishError::Transport { .. }) => 4,
            RunError::Publish(PublishError::InvalidBatchSize | PublishError::Client(_)) => 1,
            RunError::Publish(PublishError::Serialize(_)) => 2,
            RunError::Io(_) => 2,
        }
    }
}

/// Outcome of a completed upload.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub source: SourceKind,
    pub endpoint: String,
    /// Rows loaded (before any `limit`).
    pub rows: usize,
    pub files: usize,
    pub skipped: Vec<SkippedFile>,
    /// blake3 hash of the loaded dataset.
    pub fingerprint: String,
    pub delivered: Delivered,
}

/// Load the configured source.
///
/// Transactions and fraud labels use a date-range load; archives are merged
/// and filtered by cutoff or time window. The config is validated first, so
/// nothing is read when it is inconsistent.
pub fn load_source(config: &ReplayConfig) -> Result<LoadedDataset, RunError> {
    config.validate()?;
    let loc = config.loc();

    let loaded = match config.kind() {
        SourceKind::Transactions | SourceKind::Fraud => {
            load_range(&loc, config.start(), config.end(), config.kind())?
        }
        SourceKind::Archive => {
            let files = archive_files(&loc)?;
            let dataset = load_transactions(&files, &config.filter())?;
            LoadedDataset {
                dataset,
                files,
                skipped: Vec::new(),
            }
        }
    };

    Ok(loaded)
}

/// Load the configured source and publish it through `bridge`.
pub fn run_upload(
    config: &ReplayConfig,
    bridge: &dyn Bridge,
    sleeper: &dyn Sleeper,
    progress: &dyn PublishProgress,
) -> Result<RunReport, RunError> {
    let loaded = load_source(config)?;
    let fingerprint = loaded.dataset.fingerprint();

    let delivered = publish_dataset(
        bridge,
        &loaded.dataset,
        &config.publish_options(),
        sleeper,
        progress,
    )?;

    info!(
        source = %config.kind(),
        endpoint = bridge.endpoint(),
        rows = loaded.dataset.len(),
        batches = delivered.batches,
        records = delivered.records,
        retries = delivered.retries,
        "upload complete"
    );

    Ok(RunReport {
        source: config.kind(),
        endpoint: bridge.endpoint().to_string(),
        rows: loaded.dataset.len(),
        files: loaded.files.len(),
        skipped: loaded.skipped,
        fingerprint,
        delivered,
    })
}

/// Load the configured source and write its first `limit` records to `out`,
/// one JSON object per line. Returns the number of lines written.
pub fn inspect(
    config: &ReplayConfig,
    limit: usize,
    out: &mut dyn Write,
) -> Result<usize, RunError> {
    let loaded = load_source(config)?;

    let mut written = 0;
    for record in loaded.dataset.records().take(limit) {
        let line = record.to_json().map_err(PublishError::from)?;
        writeln!(out, "{line}")?;
        written += 1;
    }
    out.flush()?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use txfeed_core::publish::TransportError;

    #[test]
    fn exit_codes_by_kind() {
        assert_eq!(
            RunError::from(ConfigError::Invalid("x".into())).exit_code(),
            1
        );
        assert_eq!(RunError::from(DataError::ConflictingFilters).exit_code(), 1);
        assert_eq!(
            RunError::from(DataError::EmptyInput("none".into())).exit_code(),
            2
        );
        assert_eq!(
            RunError::from(PublishError::Exhausted {
                batch: 0,
                retries: 5,
                last_status: 500
            })
            .exit_code(),
            3
        );
        assert_eq!(
            RunError::from(PublishError::Transport {
                batch: 0,
                reason: TransportError("refused".into()).to_string()
            })
            .exit_code(),
            4
        );
    }

    #[test]
    fn invalid_config_fails_before_reading() {
        let mut config = ReplayConfig::for_source(SourceKind::Transactions);
        config.source.loc = Some("/nonexistent/txfeed".into());
        config.publish.batch_size = Some(0);

        let err = load_source(&config).unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn conflicting_archive_filters_fail_before_reading() {
        let mut config = ReplayConfig::for_source(SourceKind::Archive);
        config.source.loc = Some("/nonexistent/txfeed".into());
        config.source.cutoff = chrono::NaiveDate::from_ymd_opt(2020, 5, 1);
        config.source.window_days = Some(2);

        let err = load_source(&config).unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::ConflictingFilters)));
        assert_eq!(err.exit_code(), 1);
    }
}
