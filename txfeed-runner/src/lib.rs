//! txfeed runner: replay configuration and orchestration.
//!
//! This crate builds on `txfeed-core` to provide:
//! - TOML run configuration with per-source defaults and CLI overrides
//! - Source selection (date-range loads vs. archive replays)
//! - Upload and inspect entry points with typed errors and exit codes

pub mod config;
pub mod runner;

pub use config::{ConfigError, ConfigOverrides, ReplayConfig, DATE_FORMAT, MAX_BACKOFF_STEP_SECS};
pub use runner::{inspect, load_source, run_upload, RunError, RunReport};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn replay_config_is_send_sync() {
        assert_send::<ReplayConfig>();
        assert_sync::<ReplayConfig>();
    }

    #[test]
    fn run_report_is_send_sync() {
        assert_send::<RunReport>();
        assert_sync::<RunReport>();
    }
}
