//! txfeed core: record model, dataset loading, batched publishing.
//!
//! - `record`: dynamically typed rows with a stable total order
//! - `data`: date-range and archive loaders, sentinel normalization, filters
//! - `publish`: JSON records envelope, HTTP bridge, retry with linear backoff

pub mod data;
pub mod publish;
pub mod record;

pub use data::{DataError, LoadedDataset, SkippedFile, SourceKind, TransactionFilter};
pub use publish::{Bridge, Delivered, HttpBridge, PublishError, PublishOptions, RetryPolicy};
pub use record::{Dataset, FieldValue, Record};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: data passed between loader and publisher is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Dataset>();
        require_sync::<Dataset>();
        require_send::<LoadedDataset>();
        require_sync::<LoadedDataset>();
        require_send::<DataError>();
        require_sync::<DataError>();
        require_send::<PublishError>();
        require_sync::<PublishError>();
        require_send::<HttpBridge>();
        require_sync::<HttpBridge>();
    }
}
