//! Error types for the transaction recorder

use thiserror::Error;

/// Result type for recorder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Transaction recorder errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Transaction not found
    #[error("Transaction not found: {0}")]
    NotFound(String),

    /// Entries do not balance per currency
    #[error("Unbalanced transaction: {0}")]
    UnbalancedTransaction(String),

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
