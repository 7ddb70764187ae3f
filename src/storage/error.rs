//! Storage error types
//!
//! Defines all errors that can occur in the time store and its engines.

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Engine open or transaction failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A timestamp could not be encoded, or a stored key could not be
    /// decoded back to a timestamp
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// More records were requested than the bucket holds
    #[error("Insufficient data: bucket contains {available} entries while {requested} were requested")]
    InsufficientData { available: usize, requested: usize },

    /// Bucket name rejected by the engine
    #[error("Invalid bucket name: {0:?}")]
    InvalidBucket(String),

    /// The store has been closed
    #[error("Store is closed")]
    Closed,

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, err))
    }
}

impl<T> From<std::sync::PoisonError<T>> for StorageError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        StorageError::Lock(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
