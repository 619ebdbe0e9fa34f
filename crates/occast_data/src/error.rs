//! Error types for occast_data.

use occast_core::{BucketIndex, Partition};
use thiserror::Error;

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur in data operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// Invalid data shape.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Empty dataset.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// Index out of bounds.
    #[error("Index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The length of the collection.
        length: usize,
    },

    /// Batch size error.
    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(String),

    /// A partition has no bucket inside its declared years.
    #[error("Boundary not found: no {partition} bucket at or after {bucket} (year {year})")]
    BoundaryNotFound {
        /// Partition being located.
        partition: Partition,
        /// Requested boundary year.
        year: i32,
        /// First bucket of the requested year.
        bucket: BucketIndex,
    },

    /// A bucket with zero total across all species.
    #[error("Empty bucket {0}: share of total is undefined")]
    EmptyBucket(BucketIndex),

    /// Species missing from the table.
    #[error("Unknown species: {0}")]
    UnknownSpecies(String),

    /// File format error.
    #[error("File format error: {0}")]
    FormatError(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Core error.
    #[error("Core error: {0}")]
    CoreError(#[from] occast_core::CoreError),
}
