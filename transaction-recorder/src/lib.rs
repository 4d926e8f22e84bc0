//! Transaction Recorder
//!
//! Posts an immutable double-entry transaction for every completed payment:
//! a DEBIT against the payer and a matching CREDIT against the payee (or the
//! external settlement account when the payment leaves the system). At most
//! one transaction ever exists per payment, so redelivered completion events
//! are no-ops.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod handler;
pub mod recorder;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use handler::PaymentCompletedHandler;
pub use recorder::TransactionRecorder;
pub use store::TransactionStore;
pub use types::{Entry, Transaction, EXTERNAL_SETTLEMENT_ACCOUNT};
