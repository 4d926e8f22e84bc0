//! Error types for the wallet ledger

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for wallet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wallet ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Wallet not found
    #[error("Wallet not found for user {0}")]
    NotFound(String),

    /// Debit would take the balance negative
    #[error("Insufficient balance: have {balance}, requested {requested}")]
    InsufficientBalance {
        /// Balance at the time of the attempt
        balance: Decimal,
        /// Amount the debit asked for
        requested: Decimal,
    },

    /// Wallet exists but is frozen or closed
    #[error("Wallet not active: {0}")]
    WalletNotActive(String),

    /// Amount failed validation (zero or negative)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

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
