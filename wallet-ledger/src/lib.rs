//! Wallet Ledger
//!
//! Holds one wallet per user and guards the non-negative balance invariant.
//! Every balance mutation runs under a per-wallet async lock, so concurrent
//! credits and debits against the same wallet serialize while different
//! wallets proceed in parallel. Each committed change publishes a
//! `wallet.balance.updated` event carrying the full delta.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod handler;
pub mod ledger;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use handler::UserCreatedHandler;
pub use ledger::WalletLedger;
pub use store::WalletStore;
pub use types::{Wallet, WalletStatus};
