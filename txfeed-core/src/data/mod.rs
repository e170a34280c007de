//! Dataset loading from date-partitioned source directories

pub mod csv_reader;
pub mod error;
pub mod loader;
pub mod snapshot;
pub mod source;

pub use error::DataError;
pub use loader::{
    load_range, load_transactions, merge_files, LoadedDataset, SkippedFile, TransactionFilter,
};
pub use source::{archive_files, read_file, select_files, FileFormat, SourceKind};
