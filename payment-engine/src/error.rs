//! Error types for the payment engine

use thiserror::Error;

/// Result type for payment operations
pub type Result<T> = std::result::Result<T, Error>;

/// Payment engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Payment not found
    #[error("Payment not found: {0}")]
    NotFound(String),

    /// Idempotency key reused with different request parameters
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request failed validation (non-positive amount, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Optimistic version check failed on write
    #[error("Version mismatch: {0}")]
    VersionMismatch(String),

    /// Event bus error
    #[error("Bus error: {0}")]
    Bus(#[from] event_bus::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
