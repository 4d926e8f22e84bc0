//! Payment Engine
//!
//! Owns the payment lifecycle: a bounded state machine
//! (`Initiated -> Authorized -> Completed` or `Initiated -> Failed`) driven
//! reactively by wallet balance events. Creation is idempotent per client
//! idempotency key; transitions from a non-source state are benign no-ops so
//! duplicate and out-of-order deliveries cannot double-settle a payment.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod store;
pub mod types;

pub use config::Config;
pub use engine::PaymentEngine;
pub use error::{Error, Result};
pub use handler::BalanceUpdatedHandler;
pub use store::PaymentStore;
pub use types::{FailureReason, Payment, PaymentRequest, PaymentStatus};
