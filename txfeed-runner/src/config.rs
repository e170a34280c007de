//! Serializable replay configuration.
//!
//! A run is described by a TOML file with `[bridge]`, `[source]` and
//! `[publish]` tables. Unset fields fall back to per-source defaults, and CLI
//! flags are layered on top through `ConfigOverrides`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use txfeed_core::data::{SourceKind, TransactionFilter};
use txfeed_core::publish::{topic_endpoint, PublishOptions, RetryPolicy};

/// Date format of range bounds and file names.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Upper bound on `backoff_step_secs`.
pub const MAX_BACKOFF_STEP_SECS: u64 = 3600;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("cutoff date and time window are mutually exclusive")]
    ConflictingFilters,
}

/// Complete configuration for one replay run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplayConfig {
    #[serde(default)]
    pub bridge: BridgeConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    /// Base URL; batches go to `{url}/topics/{topic}`.
    #[serde(default = "default_bridge_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Source directory (or a single `.csv` file for archives).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<PathBuf>,
    /// Inclusive lower bound, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Archive only: keep transactions after this date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<NaiveDate>,
    /// Archive only: keep the trailing N days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_step_secs")]
    pub backoff_step_secs: u64,
    /// Stop after this many records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            topic: None,
            batch_size: None,
            max_retries: default_max_retries(),
            backoff_step_secs: default_backoff_step_secs(),
            limit: None,
        }
    }
}

fn default_max_retries() -> u32 {
    RetryPolicy::default().max_retries
}

fn default_backoff_step_secs() -> u64 {
    RetryPolicy::default().backoff_step.as_secs()
}

/// Per-source defaults for fields a config leaves unset.
struct SourceDefaults {
    topic: &'static str,
    loc: &'static str,
    date: &'static str,
    batch_size: usize,
}

fn source_defaults(kind: SourceKind) -> SourceDefaults {
    match kind {
        SourceKind::Transactions => SourceDefaults {
            topic: "tx-sim",
            loc: "./data/simulated/parquet/",
            date: "2020-05-01",
            batch_size: 100,
        },
        SourceKind::Fraud => SourceDefaults {
            topic: "tx-fraud-sim",
            loc: "./data/simulated/fraud/",
            date: "2020-04-01",
            batch_size: 100,
        },
        SourceKind::Archive => SourceDefaults {
            topic: "tx-sim",
            loc: "./data/archive/audit/",
            date: "2020-05-01",
            batch_size: 1,
        },
    }
}

impl ReplayConfig {
    /// Configuration with every field at its default for `kind`.
    pub fn for_source(kind: SourceKind) -> Self {
        Self {
            bridge: BridgeConfig::default(),
            source: SourceConfig {
                kind,
                loc: None,
                start: None,
                end: None,
                cutoff: None,
                window_days: None,
            },
            publish: PublishConfig::default(),
        }
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn kind(&self) -> SourceKind {
        self.source.kind
    }

    pub fn topic(&self) -> &str {
        self.publish
            .topic
            .as_deref()
            .unwrap_or(source_defaults(self.kind()).topic)
    }

    pub fn loc(&self) -> PathBuf {
        self.source
            .loc
            .clone()
            .unwrap_or_else(|| PathBuf::from(source_defaults(self.kind()).loc))
    }

    pub fn start(&self) -> &str {
        self.source
            .start
            .as_deref()
            .unwrap_or(source_defaults(self.kind()).date)
    }

    /// Defaults to `start` when unset, making a single-day range.
    pub fn end(&self) -> &str {
        self.source.end.as_deref().unwrap_or_else(|| self.start())
    }

    pub fn batch_size(&self) -> usize {
        self.publish
            .batch_size
            .unwrap_or(source_defaults(self.kind()).batch_size)
    }

    pub fn endpoint(&self) -> String {
        topic_endpoint(&self.bridge.url, self.topic())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.bridge.timeout_secs)
    }

    pub fn filter(&self) -> TransactionFilter {
        TransactionFilter {
            cutoff: self.source.cutoff,
            window_days: self.source.window_days,
        }
    }

    pub fn publish_options(&self) -> PublishOptions {
        PublishOptions {
            batch_size: self.batch_size(),
            retry: RetryPolicy {
                max_retries: self.publish.max_retries,
                backoff_step: Duration::from_secs(self.publish.backoff_step_secs),
            },
            limit: self.publish.limit,
        }
    }

    /// Check everything that can be checked without touching the filesystem
    /// or the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.cutoff.is_some() && self.source.window_days.is_some() {
            return Err(ConfigError::ConflictingFilters);
        }

        if self.batch_size() == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }

        if self.publish.backoff_step_secs > MAX_BACKOFF_STEP_SECS {
            return Err(ConfigError::Invalid(format!(
                "backoff_step_secs must be at most {MAX_BACKOFF_STEP_SECS}"
            )));
        }

        if self.bridge.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
        }

        if self.topic().trim().is_empty() {
            return Err(ConfigError::Invalid("topic must not be empty".into()));
        }

        reqwest::Url::parse(&self.endpoint()).map_err(|e| {
            ConfigError::Invalid(format!("bad bridge url '{}': {e}", self.bridge.url))
        })?;

        if self.kind() != SourceKind::Archive {
            let start = parse_date("start", self.start())?;
            let end = parse_date("end", self.end())?;
            if start > end {
                return Err(ConfigError::Invalid(format!(
                    "start {} is after end {}",
                    self.start(),
                    self.end()
                )));
            }
        }

        Ok(())
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| ConfigError::Invalid(format!("{field} '{value}' is not YYYY-MM-DD: {e}")))
}

/// Values supplied on the command line; `Some` fields replace the file's.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bridge: Option<String>,
    pub topic: Option<String>,
    pub loc: Option<PathBuf>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub cutoff: Option<NaiveDate>,
    pub window_days: Option<u32>,
    pub batch_size: Option<usize>,
    pub limit: Option<usize>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut ReplayConfig) {
        if let Some(url) = self.bridge {
            config.bridge.url = url;
        }
        if self.topic.is_some() {
            config.publish.topic = self.topic;
        }
        if self.loc.is_some() {
            config.source.loc = self.loc;
        }
        if self.start.is_some() {
            config.source.start = self.start;
        }
        if self.end.is_some() {
            config.source.end = self.end;
        }
        if self.cutoff.is_some() {
            config.source.cutoff = self.cutoff;
        }
        if self.window_days.is_some() {
            config.source.window_days = self.window_days;
        }
        if self.batch_size.is_some() {
            config.publish.batch_size = self.batch_size;
        }
        if self.limit.is_some() {
            config.publish.limit = self.limit;
        }
    }
}
