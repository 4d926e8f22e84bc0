//! Bus subscription glue for the wallet ledger

use crate::ledger::WalletLedger;
use async_trait::async_trait;
use event_bus::{Currency, Envelope, Event, EventHandler};
use std::sync::Arc;

/// Provisions a wallet when a `user.created` event arrives
pub struct UserCreatedHandler {
    ledger: Arc<WalletLedger>,
    currency: Currency,
}

impl UserCreatedHandler {
    /// Wrap a ledger for subscription
    pub fn new(ledger: Arc<WalletLedger>, currency: Currency) -> Self {
        Self { ledger, currency }
    }
}

#[async_trait]
impl EventHandler for UserCreatedHandler {
    async fn handle(&self, envelope: Envelope) -> event_bus::Result<()> {
        match &envelope.event {
            Event::UserCreated(e) => {
                self.ledger
                    .create_wallet(e.user_id, self.currency)
                    .await
                    .map_err(|e| event_bus::Error::Handler(e.to_string()))?;
                Ok(())
            }
            other => {
                tracing::warn!(
                    event_id = %envelope.event_id,
                    topic = %other.topic(),
                    "Unexpected event on user subscription, dropping"
                );
                Ok(())
            }
        }
    }
}
