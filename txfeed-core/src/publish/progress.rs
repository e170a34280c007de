//! Progress reporting for publish runs.

use super::error::PublishError;
use std::time::Duration;
use tracing::{error, info, warn};

/// Callbacks fired by the publisher as batches move through the bridge.
pub trait PublishProgress {
    /// A batch was accepted; `delivered` counts records sent so far.
    fn on_delivered(&self, batch: usize, delivered: usize, total: usize);

    /// A rejected batch waited `delay` and is about to be resent.
    fn on_backoff(&self, batch: usize, retry: u32, max_retries: u32, delay: Duration);

    /// The run is stopping.
    fn on_abort(&self, error: &PublishError);
}

/// Progress reporter that writes `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl PublishProgress for LogProgress {
    fn on_delivered(&self, batch: usize, delivered: usize, total: usize) {
        info!(batch, "uploaded {delivered}/{total}");
    }

    fn on_backoff(&self, batch: usize, retry: u32, max_retries: u32, delay: Duration) {
        warn!(batch, delay_secs = delay.as_secs_f64(), "backing-off/retry {retry}/{max_retries}");
    }

    fn on_abort(&self, error: &PublishError) {
        error!(%error, "aborting");
    }
}
