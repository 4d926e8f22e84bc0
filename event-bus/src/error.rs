//! Error types for the event bus

use thiserror::Error;

/// Event bus error
#[derive(Debug, Error)]
pub enum Error {
    /// Publish error (topic closed, lane gone)
    #[error("Publish error: {0}")]
    Publish(String),

    /// Subscribe error
    #[error("Subscribe error: {0}")]
    Subscribe(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Handler error (the local effect did not commit; the envelope is redelivered)
    #[error("Handler error: {0}")]
    Handler(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
