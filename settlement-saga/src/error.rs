//! Error types for the assembled saga

use thiserror::Error;

/// Result type for saga assembly
pub type Result<T> = std::result::Result<T, Error>;

/// Saga assembly errors
#[derive(Error, Debug)]
pub enum Error {
    /// Event bus error
    #[error("Bus error: {0}")]
    Bus(#[from] event_bus::Error),

    /// Payment engine error
    #[error("Payment engine error: {0}")]
    Payment(#[from] payment_engine::Error),

    /// Wallet ledger error
    #[error("Wallet ledger error: {0}")]
    Wallet(#[from] wallet_ledger::Error),

    /// Transaction recorder error
    #[error("Transaction recorder error: {0}")]
    Transaction(#[from] transaction_recorder::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
