//! Bus subscription glue for the payment engine

use crate::engine::PaymentEngine;
use async_trait::async_trait;
use event_bus::{Envelope, Event, EventHandler};
use std::sync::Arc;

/// Feeds `wallet.balance.updated` events into the engine
pub struct BalanceUpdatedHandler {
    engine: Arc<PaymentEngine>,
}

impl BalanceUpdatedHandler {
    /// Wrap an engine for subscription
    pub fn new(engine: Arc<PaymentEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EventHandler for BalanceUpdatedHandler {
    async fn handle(&self, envelope: Envelope) -> event_bus::Result<()> {
        match &envelope.event {
            Event::WalletBalanceUpdated(e) => self
                .engine
                .on_balance_updated(e)
                .await
                .map_err(|e| event_bus::Error::Handler(e.to_string())),
            other => {
                tracing::warn!(
                    event_id = %envelope.event_id,
                    topic = %other.topic(),
                    "Unexpected event on balance subscription, dropping"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, PaymentStore};
    use event_bus::{
        BalanceChangeKind, Broker, BrokerConfig, Currency, UserCreated, WalletBalanceUpdated,
    };
    use rust_decimal::Decimal;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn test_handler() -> (BalanceUpdatedHandler, Arc<PaymentEngine>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        let store = Arc::new(PaymentStore::open(&config).unwrap());
        let bus = Arc::new(Broker::new(BrokerConfig::default()));
        let engine = Arc::new(PaymentEngine::new(store, bus));
        (BalanceUpdatedHandler::new(engine.clone()), engine, temp_dir)
    }

    #[tokio::test]
    async fn test_balance_event_reaches_engine() {
        let (handler, engine, _temp) = test_handler();
        let payer_id = Uuid::new_v4();

        let payment = engine
            .initiate(crate::PaymentRequest {
                payer_id,
                payee_id: Some(Uuid::new_v4()),
                amount: Decimal::new(5000, 2),
                currency: Currency::USD,
                kind: event_bus::PaymentKind::Transfer,
                description: None,
                reference: None,
                idempotency_key: "key-1".to_string(),
            })
            .await
            .unwrap();

        let envelope = Envelope::new(Event::WalletBalanceUpdated(WalletBalanceUpdated {
            wallet_id: Uuid::new_v4(),
            user_id: payer_id,
            previous_balance: Decimal::ZERO,
            new_balance: Decimal::new(10000, 2),
            change_amount: Decimal::new(10000, 2),
            currency: Currency::USD,
            change_kind: BalanceChangeKind::Credit,
            reference: None,
        }));
        handler.handle(envelope).await.unwrap();

        assert_eq!(
            engine.get(payment.payment_id).unwrap().status,
            crate::PaymentStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_unexpected_event_dropped() {
        let (handler, _engine, _temp) = test_handler();

        let envelope = Envelope::new(Event::UserCreated(UserCreated {
            user_id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            created_at: chrono::Utc::now(),
        }));
        assert!(handler.handle(envelope).await.is_ok());
    }
}
