//! Payment lifecycle engine
//!
//! Advances payments through `Initiated -> Authorized -> Completed` (or
//! `Initiated -> Failed`) as wallet balance events arrive. Transitions
//! attempted from a non-source state are logged and dropped, which is what
//! makes duplicate and out-of-order deliveries harmless.

use crate::{
    error::{Error, Result},
    store::PaymentStore,
    types::{FailureReason, Payment, PaymentRequest, PaymentStatus},
};
use chrono::Utc;
use event_bus::{
    Broker, Event, PaymentAuthorized, PaymentCompleted, PaymentFailed, PaymentInitiated,
    WalletBalanceUpdated,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// The payment engine
pub struct PaymentEngine {
    store: Arc<PaymentStore>,
    bus: Arc<Broker>,
}

impl PaymentEngine {
    /// Create an engine over a store and the event bus
    pub fn new(store: Arc<PaymentStore>, bus: Arc<Broker>) -> Self {
        Self { store, bus }
    }

    /// Initiate a payment, idempotent per client key
    ///
    /// A replay of the same request returns the existing payment unchanged.
    /// Reusing a key with different parameters is a conflict.
    pub async fn initiate(&self, request: PaymentRequest) -> Result<Payment> {
        if request.amount <= Decimal::ZERO {
            return Err(Error::InvalidRequest(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }
        if request.idempotency_key.is_empty() {
            return Err(Error::InvalidRequest(
                "idempotency key must not be empty".to_string(),
            ));
        }

        if let Some(existing) = self.store.get_by_idempotency_key(&request.idempotency_key)? {
            if existing.matches_request(&request) {
                tracing::info!(
                    payment_id = %existing.payment_id,
                    idempotency_key = %request.idempotency_key,
                    "Replayed initiate request, returning existing payment"
                );
                return Ok(existing);
            }
            return Err(Error::Conflict(format!(
                "idempotency key {} already used with different parameters",
                request.idempotency_key
            )));
        }

        let payment = Payment::from_request(&request);
        match self.store.create(&payment) {
            Ok(()) => {}
            // Two identical requests can race past the lookup above; the
            // loser of the create race adopts the winner's payment.
            Err(Error::Conflict(_)) => {
                if let Some(existing) =
                    self.store.get_by_idempotency_key(&request.idempotency_key)?
                {
                    if existing.matches_request(&request) {
                        tracing::info!(
                            payment_id = %existing.payment_id,
                            idempotency_key = %request.idempotency_key,
                            "Lost initiate race, returning concurrently created payment"
                        );
                        return Ok(existing);
                    }
                }
                return Err(Error::Conflict(format!(
                    "idempotency key {} already used with different parameters",
                    request.idempotency_key
                )));
            }
            Err(e) => return Err(e),
        }

        tracing::info!(
            payment_id = %payment.payment_id,
            payer_id = %payment.payer_id,
            amount = %payment.amount,
            currency = %payment.currency.code(),
            "Payment initiated"
        );

        self.publish(Event::PaymentInitiated(PaymentInitiated {
            payment_id: payment.payment_id,
            idempotency_key: payment.idempotency_key.clone(),
            payer_id: payment.payer_id,
            payee_id: payment.payee_id,
            amount: payment.amount,
            currency: payment.currency,
            kind: payment.kind,
        }))
        .await;

        Ok(payment)
    }

    /// Get a payment by id
    pub fn get(&self, payment_id: Uuid) -> Result<Payment> {
        self.store.get(payment_id)
    }

    /// Pending payments for a payer, oldest first
    pub fn find_pending_by_payer(&self, payer_id: Uuid) -> Result<Vec<Payment>> {
        self.store.pending_by_payer(payer_id)
    }

    /// React to a wallet balance change for a payer
    ///
    /// Walks the payer's pending payments oldest first, keeping a running
    /// available balance so a single credit cannot fund the same money twice.
    /// A payment found in `Authorized` passed its funds check on an earlier
    /// evaluation that stopped short of the completion commit; it is
    /// completed here, its amount still counted against the running balance.
    /// One payment's error never blocks the rest of the queue, but the first
    /// error is returned at the end so the triggering event is redelivered
    /// and the unfinished work retried.
    pub async fn on_balance_updated(&self, event: &WalletBalanceUpdated) -> Result<()> {
        let pending = self.store.pending_by_payer(event.user_id)?;
        if pending.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            user_id = %event.user_id,
            new_balance = %event.new_balance,
            pending = pending.len(),
            "Evaluating pending payments"
        );

        let mut available = event.new_balance;
        let mut first_error = None;
        for mut payment in pending {
            if payment.currency != event.currency {
                tracing::debug!(
                    payment_id = %payment.payment_id,
                    payment_currency = payment.currency.code(),
                    wallet_currency = event.currency.code(),
                    "Currency mismatch, leaving payment pending"
                );
                continue;
            }

            let outcome = if payment.status == PaymentStatus::Authorized {
                available -= payment.amount;
                self.complete(&mut payment).await
            } else if available >= payment.amount {
                available -= payment.amount;
                self.settle(&mut payment).await
            } else {
                let detail = format!(
                    "available balance {} below payment amount {}",
                    available, payment.amount
                );
                self.fail(&mut payment, FailureReason::InsufficientFunds, detail)
                    .await
            };

            if let Err(e) = outcome {
                tracing::error!(
                    payment_id = %payment.payment_id,
                    error = %e,
                    "Failed to advance payment, continuing with remaining"
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn settle(&self, payment: &mut Payment) -> Result<()> {
        self.authorize(payment).await?;
        self.complete(payment).await
    }

    /// Transition `Initiated -> Authorized`
    pub async fn authorize(&self, payment: &mut Payment) -> Result<()> {
        if payment.status != PaymentStatus::Initiated {
            tracing::warn!(
                payment_id = %payment.payment_id,
                status = ?payment.status,
                "Ignoring authorize for payment not in Initiated"
            );
            return Ok(());
        }

        let now = Utc::now();
        payment.status = PaymentStatus::Authorized;
        payment.authorized_at = Some(now);
        payment.updated_at = now;
        self.store.update(payment)?;

        tracing::info!(payment_id = %payment.payment_id, "Payment authorized");

        self.publish(Event::PaymentAuthorized(PaymentAuthorized {
            payment_id: payment.payment_id,
            payer_id: payment.payer_id,
            payee_id: payment.payee_id,
            amount: payment.amount,
            currency: payment.currency,
        }))
        .await;

        Ok(())
    }

    /// Transition `Authorized -> Completed`, assigning the transaction id
    ///
    /// Unlike the notification-style events, a lost `payment.completed`
    /// publish is an error: the recorder's posting depends on it, so the
    /// failure must surface and block acknowledgment of the triggering
    /// event. The state commit lands first either way.
    pub async fn complete(&self, payment: &mut Payment) -> Result<()> {
        if payment.status != PaymentStatus::Authorized {
            tracing::warn!(
                payment_id = %payment.payment_id,
                status = ?payment.status,
                "Ignoring complete for payment not in Authorized"
            );
            return Ok(());
        }

        let now = Utc::now();
        let transaction_id = Uuid::now_v7();
        payment.status = PaymentStatus::Completed;
        payment.transaction_id = Some(transaction_id);
        payment.completed_at = Some(now);
        payment.updated_at = now;
        self.store.update(payment)?;

        tracing::info!(
            payment_id = %payment.payment_id,
            transaction_id = %transaction_id,
            "Payment completed"
        );

        self.bus
            .publish(Event::PaymentCompleted(PaymentCompleted {
                payment_id: payment.payment_id,
                payer_id: payment.payer_id,
                payee_id: payment.payee_id,
                amount: payment.amount,
                currency: payment.currency,
                transaction_id,
            }))
            .await?;

        Ok(())
    }

    /// Transition to `Failed` from any non-terminal state
    pub async fn fail(
        &self,
        payment: &mut Payment,
        reason: FailureReason,
        message: String,
    ) -> Result<()> {
        if payment.status.is_terminal() {
            tracing::warn!(
                payment_id = %payment.payment_id,
                status = ?payment.status,
                "Ignoring fail for payment already terminal"
            );
            return Ok(());
        }

        let now = Utc::now();
        payment.status = PaymentStatus::Failed;
        payment.failure_reason = Some(reason);
        payment.error_message = Some(message.clone());
        payment.failed_at = Some(now);
        payment.updated_at = now;
        self.store.update(payment)?;

        tracing::warn!(
            payment_id = %payment.payment_id,
            reason = reason.code(),
            message = %message,
            "Payment failed"
        );

        self.publish(Event::PaymentFailed(PaymentFailed {
            payment_id: payment.payment_id,
            payer_id: payment.payer_id,
            payee_id: payment.payee_id,
            amount: payment.amount,
            currency: payment.currency,
            failure_reason: reason.code().to_string(),
            error_code: reason.code().to_string(),
            error_message: message,
        }))
        .await;

        Ok(())
    }

    // Notification publishes only. State is committed before the event goes
    // out and nothing downstream depends on these, so a lost publish leaves
    // the payment correct and is logged rather than propagated.
    async fn publish(&self, event: Event) {
        let topic = event.topic();
        if let Err(e) = self.bus.publish(event).await {
            tracing::warn!(topic = %topic, error = %e, "Failed to publish event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use event_bus::{BalanceChangeKind, BrokerConfig, Currency, PaymentKind};
    use tempfile::TempDir;

    fn test_engine() -> (PaymentEngine, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        let store = Arc::new(PaymentStore::open(&config).unwrap());
        let bus = Arc::new(Broker::new(BrokerConfig::default()));
        (PaymentEngine::new(store, bus), temp_dir)
    }

    fn request(payer_id: Uuid, amount: Decimal, key: &str) -> PaymentRequest {
        PaymentRequest {
            payer_id,
            payee_id: Some(Uuid::new_v4()),
            amount,
            currency: Currency::USD,
            kind: PaymentKind::Transfer,
            description: None,
            reference: None,
            idempotency_key: key.to_string(),
        }
    }

    fn balance_event(user_id: Uuid, new_balance: Decimal) -> WalletBalanceUpdated {
        WalletBalanceUpdated {
            wallet_id: Uuid::new_v4(),
            user_id,
            previous_balance: Decimal::ZERO,
            new_balance,
            change_amount: new_balance,
            currency: Currency::USD,
            change_kind: BalanceChangeKind::Credit,
            reference: None,
        }
    }

    #[tokio::test]
    async fn test_initiate_creates_pending_payment() {
        let (engine, _temp) = test_engine();
        let payer_id = Uuid::new_v4();

        let payment = engine
            .initiate(request(payer_id, Decimal::new(10000, 2), "key-1"))
            .await
            .unwrap();

        assert_eq!(payment.status, PaymentStatus::Initiated);
        assert_eq!(engine.find_pending_by_payer(payer_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_initiate_replay_returns_existing() {
        let (engine, _temp) = test_engine();
        let req = request(Uuid::new_v4(), Decimal::new(10000, 2), "key-1");

        let first = engine.initiate(req.clone()).await.unwrap();
        let second = engine.initiate(req).await.unwrap();

        assert_eq!(first.payment_id, second.payment_id);
    }

    #[tokio::test]
    async fn test_initiate_key_reuse_conflicts() {
        let (engine, _temp) = test_engine();
        let req = request(Uuid::new_v4(), Decimal::new(10000, 2), "key-1");
        engine.initiate(req.clone()).await.unwrap();

        let mut changed = req;
        changed.amount = Decimal::new(20000, 2);
        let result = engine.initiate(changed).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_initiate_rejects_non_positive_amount() {
        let (engine, _temp) = test_engine();
        let result = engine
            .initiate(request(Uuid::new_v4(), Decimal::ZERO, "key-1"))
            .await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_sufficient_balance_completes_payment() {
        let (engine, _temp) = test_engine();
        let payer_id = Uuid::new_v4();

        let payment = engine
            .initiate(request(payer_id, Decimal::new(10000, 2), "key-1"))
            .await
            .unwrap();

        engine
            .on_balance_updated(&balance_event(payer_id, Decimal::new(15000, 2)))
            .await
            .unwrap();

        let payment = engine.get(payment.payment_id).unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.transaction_id.is_some());
        assert!(payment.authorized_at.is_some());
        assert!(payment.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_insufficient_balance_fails_payment() {
        let (engine, _temp) = test_engine();
        let payer_id = Uuid::new_v4();

        let payment = engine
            .initiate(request(payer_id, Decimal::new(10000, 2), "key-1"))
            .await
            .unwrap();

        engine
            .on_balance_updated(&balance_event(payer_id, Decimal::new(1000, 2)))
            .await
            .unwrap();

        let payment = engine.get(payment.payment_id).unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.failure_reason, Some(FailureReason::InsufficientFunds));
    }

    #[tokio::test]
    async fn test_running_balance_cannot_fund_twice() {
        let (engine, _temp) = test_engine();
        let payer_id = Uuid::new_v4();

        let first = engine
            .initiate(request(payer_id, Decimal::new(8000, 2), "key-1"))
            .await
            .unwrap();
        let second = engine
            .initiate(request(payer_id, Decimal::new(8000, 2), "key-2"))
            .await
            .unwrap();

        // 100.00 covers only the older of the two 80.00 payments
        engine
            .on_balance_updated(&balance_event(payer_id, Decimal::new(10000, 2)))
            .await
            .unwrap();

        assert_eq!(
            engine.get(first.payment_id).unwrap().status,
            PaymentStatus::Completed
        );
        let second = engine.get(second.payment_id).unwrap();
        assert_eq!(second.status, PaymentStatus::Failed);
        assert_eq!(second.failure_reason, Some(FailureReason::InsufficientFunds));
    }

    #[tokio::test]
    async fn test_currency_mismatch_leaves_payment_pending() {
        let (engine, _temp) = test_engine();
        let payer_id = Uuid::new_v4();

        let mut req = request(payer_id, Decimal::new(10000, 2), "key-1");
        req.currency = Currency::EUR;
        let payment = engine.initiate(req).await.unwrap();

        engine
            .on_balance_updated(&balance_event(payer_id, Decimal::new(50000, 2)))
            .await
            .unwrap();

        assert_eq!(
            engine.get(payment.payment_id).unwrap().status,
            PaymentStatus::Initiated
        );
    }

    #[tokio::test]
    async fn test_wrong_state_transitions_are_no_ops() {
        let (engine, _temp) = test_engine();
        let payer_id = Uuid::new_v4();

        let mut payment = engine
            .initiate(request(payer_id, Decimal::new(10000, 2), "key-1"))
            .await
            .unwrap();

        // Complete before authorize: dropped
        engine.complete(&mut payment).await.unwrap();
        assert_eq!(
            engine.get(payment.payment_id).unwrap().status,
            PaymentStatus::Initiated
        );

        engine.authorize(&mut payment).await.unwrap();
        engine.complete(&mut payment).await.unwrap();

        // Fail after terminal: dropped
        engine
            .fail(
                &mut payment,
                FailureReason::Processing,
                "late failure".to_string(),
            )
            .await
            .unwrap();
        let stored = engine.get(payment.payment_id).unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert!(stored.failure_reason.is_none());
    }

    #[tokio::test]
    async fn test_authorized_payment_resumes_on_next_balance_event() {
        let (engine, _temp) = test_engine();
        let payer_id = Uuid::new_v4();

        // First payment stops after the authorize commit, as a process
        // dying between the two commits would leave it
        let mut stalled = engine
            .initiate(request(payer_id, Decimal::new(8000, 2), "key-1"))
            .await
            .unwrap();
        engine.authorize(&mut stalled).await.unwrap();

        let second = engine
            .initiate(request(payer_id, Decimal::new(8000, 2), "key-2"))
            .await
            .unwrap();

        engine
            .on_balance_updated(&balance_event(payer_id, Decimal::new(10000, 2)))
            .await
            .unwrap();

        // The stalled payment is finished without a second funds check
        let stalled = engine.get(stalled.payment_id).unwrap();
        assert_eq!(stalled.status, PaymentStatus::Completed);
        assert!(stalled.transaction_id.is_some());

        // Its amount still counts against the running balance
        let second = engine.get(second.payment_id).unwrap();
        assert_eq!(second.status, PaymentStatus::Failed);
        assert_eq!(second.failure_reason, Some(FailureReason::InsufficientFunds));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_identical_initiates_share_one_payment() {
        let (engine, _temp) = test_engine();
        let engine = Arc::new(engine);
        let req = request(Uuid::new_v4(), Decimal::new(10000, 2), "key-1");

        let a = tokio::spawn({
            let engine = engine.clone();
            let req = req.clone();
            async move { engine.initiate(req).await }
        });
        let b = tokio::spawn({
            let engine = engine.clone();
            let req = req.clone();
            async move { engine.initiate(req).await }
        });

        // Both callers get the same payment, whichever wins the race
        let first = a.await.unwrap().unwrap();
        let second = b.await.unwrap().unwrap();
        assert_eq!(first.payment_id, second.payment_id);
        assert_eq!(engine.find_pending_by_payer(req.payer_id).unwrap().len(), 1);
    }

    #[test]
    fn test_lost_completion_publish_blocks_acknowledgment() {
        struct NoopHandler;

        #[async_trait::async_trait]
        impl event_bus::EventHandler for NoopHandler {
            async fn handle(&self, _envelope: event_bus::Envelope) -> event_bus::Result<()> {
                Ok(())
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        let store = Arc::new(PaymentStore::open(&config).unwrap());
        let bus = Arc::new(Broker::new(BrokerConfig::default()));

        // Subscribe on a runtime that is then torn down, leaving the
        // completion lanes closed the way a dead consumer would
        let setup_rt = tokio::runtime::Runtime::new().unwrap();
        setup_rt.block_on(async {
            bus.subscribe(
                event_bus::Topic::PaymentCompleted,
                "transaction-recorder",
                Arc::new(NoopHandler),
            );
        });
        drop(setup_rt);

        let engine = PaymentEngine::new(store, bus);
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let payer_id = Uuid::new_v4();
            let payment = engine
                .initiate(request(payer_id, Decimal::new(10000, 2), "key-1"))
                .await
                .unwrap();

            let result = engine
                .on_balance_updated(&balance_event(payer_id, Decimal::new(15000, 2)))
                .await;
            assert!(result.is_err());

            // The state commit still landed; only the follow-on publish
            // was lost, and the surfaced error withholds the ack
            assert_eq!(
                engine.get(payment.payment_id).unwrap().status,
                PaymentStatus::Completed
            );
        });
    }

    #[tokio::test]
    async fn test_duplicate_balance_event_is_harmless() {
        let (engine, _temp) = test_engine();
        let payer_id = Uuid::new_v4();

        let payment = engine
            .initiate(request(payer_id, Decimal::new(10000, 2), "key-1"))
            .await
            .unwrap();

        let event = balance_event(payer_id, Decimal::new(15000, 2));
        engine.on_balance_updated(&event).await.unwrap();
        engine.on_balance_updated(&event).await.unwrap();

        let stored = engine.get(payment.payment_id).unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
    }
}
