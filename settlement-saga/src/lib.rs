//! Settlement saga assembly
//!
//! Wires the three components onto one event bus:
//!
//! - Wallet Ledger consumes `user.created` and provisions wallets
//! - Payment Engine consumes `wallet.balance.updated` and advances payments
//! - Transaction Recorder consumes `payment.completed` and posts the books
//!
//! There is no orchestrator; the saga advances purely through events, and
//! every consumer tolerates duplicate and redelivered events.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{Error, Result};

use event_bus::{Broker, BrokerConfig, Topic};
use payment_engine::{BalanceUpdatedHandler, PaymentEngine, PaymentStore};
use std::sync::Arc;
use transaction_recorder::{PaymentCompletedHandler, TransactionRecorder, TransactionStore};
use wallet_ledger::{UserCreatedHandler, WalletLedger, WalletStore};

/// A running saga node: all three components on one bus
pub struct Saga {
    /// The shared event bus
    pub bus: Arc<Broker>,
    /// Payment lifecycle engine
    pub payments: Arc<PaymentEngine>,
    /// Wallet ledger
    pub wallets: Arc<WalletLedger>,
    /// Double-entry recorder
    pub transactions: Arc<TransactionRecorder>,
}

impl Saga {
    /// Open all stores under `config.data_dir` and wire the subscriptions
    pub fn start(config: &Config) -> Result<Saga> {
        let bus = Arc::new(Broker::new(BrokerConfig::default()));

        let wallet_config = wallet_ledger::Config {
            data_dir: config.data_dir.join("wallets"),
            default_currency: config.default_currency,
            ..wallet_ledger::Config::default()
        };
        let wallet_store = Arc::new(WalletStore::open(&wallet_config)?);
        let wallets = Arc::new(WalletLedger::new(
            wallet_store,
            bus.clone(),
            &wallet_config,
        ));

        let payment_config = payment_engine::Config {
            data_dir: config.data_dir.join("payments"),
            ..payment_engine::Config::default()
        };
        let payment_store = Arc::new(PaymentStore::open(&payment_config)?);
        let payments = Arc::new(PaymentEngine::new(payment_store, bus.clone()));

        let transaction_config = transaction_recorder::Config {
            data_dir: config.data_dir.join("transactions"),
            ..transaction_recorder::Config::default()
        };
        let transaction_store = Arc::new(TransactionStore::open(&transaction_config)?);
        let transactions = Arc::new(TransactionRecorder::new(transaction_store, bus.clone()));

        bus.subscribe(
            Topic::UserCreated,
            "wallet-ledger",
            Arc::new(UserCreatedHandler::new(
                wallets.clone(),
                config.default_currency,
            )),
        );
        bus.subscribe(
            Topic::WalletBalanceUpdated,
            "payment-engine",
            Arc::new(BalanceUpdatedHandler::new(payments.clone())),
        );
        bus.subscribe(
            Topic::PaymentCompleted,
            "transaction-recorder",
            Arc::new(PaymentCompletedHandler::new(transactions.clone())),
        );

        tracing::info!(data_dir = ?config.data_dir, "Saga node started");

        Ok(Saga {
            bus,
            payments,
            wallets,
            transactions,
        })
    }

    /// Wait for every event currently on the bus to finish delivery
    pub async fn quiesce(&self) {
        self.bus.quiesce().await;
    }
}
