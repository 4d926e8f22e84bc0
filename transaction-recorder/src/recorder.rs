//! Posting logic for completed payments

use crate::{
    error::Result,
    store::TransactionStore,
    types::Transaction,
};
use event_bus::{Broker, Event, PaymentCompleted, RecordedEntry, TransactionRecorded};
use std::sync::Arc;
use uuid::Uuid;

/// The transaction recorder
pub struct TransactionRecorder {
    store: Arc<TransactionStore>,
    bus: Arc<Broker>,
}

impl TransactionRecorder {
    /// Create a recorder over a store and the event bus
    pub fn new(store: Arc<TransactionStore>, bus: Arc<Broker>) -> Self {
        Self { store, bus }
    }

    /// Post the double-entry record for a completed payment
    ///
    /// A payment that already has a transaction is a redelivered event:
    /// logged and skipped, returning `None`. Errors propagate so the bus
    /// redelivers the event and the posting is retried.
    pub async fn record_from_payment(
        &self,
        event: &PaymentCompleted,
    ) -> Result<Option<Transaction>> {
        if let Some(existing) = self.store.get_by_payment(event.payment_id)? {
            tracing::warn!(
                payment_id = %event.payment_id,
                transaction_id = %existing.transaction_id,
                "Transaction already recorded for payment, skipping duplicate"
            );
            return Ok(None);
        }

        let transaction = Transaction::from_completed_payment(event)?;
        self.store.create(&transaction)?;

        tracing::info!(
            transaction_id = %transaction.transaction_id,
            payment_id = %transaction.payment_id,
            entries = transaction.entries.len(),
            "Transaction recorded"
        );

        self.bus
            .publish(Event::TransactionRecorded(TransactionRecorded {
                transaction_id: transaction.transaction_id,
                payment_id: transaction.payment_id,
                entries: transaction
                    .entries
                    .iter()
                    .map(|e| RecordedEntry {
                        user_id: e.user_id,
                        direction: e.direction,
                        amount: e.amount,
                        currency: e.currency,
                    })
                    .collect(),
            }))
            .await?;

        Ok(Some(transaction))
    }

    /// Get a transaction by id
    pub fn get(&self, transaction_id: Uuid) -> Result<Transaction> {
        self.store.get(transaction_id)
    }

    /// The transaction recorded for a payment, if any
    pub fn get_by_payment(&self, payment_id: Uuid) -> Result<Option<Transaction>> {
        self.store.get_by_payment(payment_id)
    }

    /// Transactions touching a user's account, newest first
    pub fn list_by_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        self.store.list_by_user(user_id, limit)
    }
}
