//! Event bus and choreography contract for the settlement saga
//!
//! Provides pub/sub messaging with:
//! - A closed tagged union of event variants, one per topic
//! - Partitioning by entity id (user, payment, transaction)
//! - Per-entity ordered delivery lanes, cross-entity concurrency
//! - At-least-once delivery: failed handlers are redelivered with backoff
//! - Dead-letter capture after delivery attempts are exhausted
//! - Observability via Prometheus metrics

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod broker;
pub mod envelope;
pub mod error;
pub mod event;
pub mod metrics;
pub mod types;

pub use broker::{Broker, BrokerConfig, EventHandler};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use event::{
    Event, PaymentAuthorized, PaymentCompleted, PaymentFailed, PaymentInitiated, RecordedEntry,
    TransactionRecorded, UserCreated, WalletBalanceUpdated,
};
pub use types::{BalanceChangeKind, Currency, EntryDirection, PartitionKey, PaymentKind, Topic};
