//! Error types for the storage gateway.

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Bucket index outside the configured partition count
    #[error("Unknown bucket: {0}")]
    UnknownBucket(u32),
}

impl StorageError {
    pub fn serialization(err: impl std::fmt::Display) -> Self {
        StorageError::Serialization(err.to_string())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        StorageError::Configuration(msg.into())
    }
}
