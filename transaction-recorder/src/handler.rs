//! Bus subscription glue for the transaction recorder

use crate::recorder::TransactionRecorder;
use async_trait::async_trait;
use event_bus::{Envelope, Event, EventHandler};
use std::sync::Arc;

/// Posts a transaction when a `payment.completed` event arrives
pub struct PaymentCompletedHandler {
    recorder: Arc<TransactionRecorder>,
}

impl PaymentCompletedHandler {
    /// Wrap a recorder for subscription
    pub fn new(recorder: Arc<TransactionRecorder>) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl EventHandler for PaymentCompletedHandler {
    async fn handle(&self, envelope: Envelope) -> event_bus::Result<()> {
        match &envelope.event {
            Event::PaymentCompleted(e) => {
                self.recorder
                    .record_from_payment(e)
                    .await
                    .map_err(|e| event_bus::Error::Handler(e.to_string()))?;
                Ok(())
            }
            other => {
                tracing::warn!(
                    event_id = %envelope.event_id,
                    topic = %other.topic(),
                    "Unexpected event on completion subscription, dropping"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, TransactionStore};
    use event_bus::{Broker, BrokerConfig, Currency, PaymentCompleted};
    use rust_decimal::Decimal;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn test_handler() -> (PaymentCompletedHandler, Arc<TransactionRecorder>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        let store = Arc::new(TransactionStore::open(&config).unwrap());
        let bus = Arc::new(Broker::new(BrokerConfig::default()));
        let recorder = Arc::new(TransactionRecorder::new(store, bus));
        (
            PaymentCompletedHandler::new(recorder.clone()),
            recorder,
            temp_dir,
        )
    }

    #[tokio::test]
    async fn test_completion_event_posts_transaction() {
        let (handler, recorder, _temp) = test_handler();
        let event = PaymentCompleted {
            payment_id: Uuid::new_v4(),
            payer_id: Uuid::new_v4(),
            payee_id: Some(Uuid::new_v4()),
            amount: Decimal::new(10000, 2),
            currency: Currency::USD,
            transaction_id: Uuid::now_v7(),
        };

        let envelope = Envelope::new(Event::PaymentCompleted(event.clone()));
        handler.handle(envelope.clone()).await.unwrap();
        // Redelivery of the same envelope changes nothing
        handler.handle(envelope).await.unwrap();

        let stored = recorder.get_by_payment(event.payment_id).unwrap().unwrap();
        assert_eq!(stored.transaction_id, event.transaction_id);
    }
}
