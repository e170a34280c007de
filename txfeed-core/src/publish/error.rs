//! Publish errors.

use thiserror::Error;

/// Why a publish run stopped.
///
/// `Transport` and `Exhausted` are terminal for the whole run: nothing after
/// the failing batch is sent and no partial progress is kept.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("failed to serialize batch: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid bridge client: {0}")]
    Client(String),

    #[error("transport failure on batch {batch}: {reason}")]
    Transport { batch: usize, reason: String },

    #[error("bridge rejected batch {batch} with status {last_status}; aborting after {retries} retries")]
    Exhausted {
        batch: usize,
        retries: u32,
        last_status: u16,
    },
}
