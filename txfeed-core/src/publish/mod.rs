//! Batched publishing to an HTTP message bridge

pub mod bridge;
pub mod envelope;
pub mod error;
pub mod progress;
pub mod publisher;
pub mod retry;

pub use bridge::{topic_endpoint, Bridge, HttpBridge, TransportError};
pub use envelope::{BatchEnvelope, EnvelopeRecord, KAFKA_JSON_V2};
pub use error::PublishError;
pub use progress::{LogProgress, PublishProgress};
pub use publisher::{publish_dataset, Delivered, PublishOptions};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
