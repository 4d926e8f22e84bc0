//! Wallet ledger operations
//!
//! All balance mutations for a wallet run under that wallet's async lock.
//! The `wallet.balance.updated` event is published before the lock drops, so
//! events for one wallet hit the bus in the same order the balance changed.

use crate::{
    config::Config,
    error::{Error, Result},
    store::WalletStore,
    types::{Wallet, WalletStatus},
};
use chrono::Utc;
use dashmap::DashMap;
use event_bus::{BalanceChangeKind, Broker, Currency, Event, WalletBalanceUpdated};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// The wallet ledger
pub struct WalletLedger {
    store: Arc<WalletStore>,
    bus: Arc<Broker>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    default_currency: Currency,
}

impl WalletLedger {
    /// Create a ledger over a store and the event bus
    pub fn new(store: Arc<WalletStore>, bus: Arc<Broker>, config: &Config) -> Self {
        Self {
            store,
            bus,
            locks: DashMap::new(),
            default_currency: config.default_currency,
        }
    }

    fn lock_for(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create a wallet for a user, idempotent
    ///
    /// A repeat create (duplicate `user.created` delivery) returns the
    /// existing wallet untouched.
    pub async fn create_wallet(&self, user_id: Uuid, currency: Currency) -> Result<Wallet> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        if let Some(existing) = self.store.try_get(user_id)? {
            tracing::info!(
                user_id = %user_id,
                wallet_id = %existing.wallet_id,
                "Wallet already exists, returning existing"
            );
            return Ok(existing);
        }

        let mut wallet = Wallet::new(user_id, currency);
        self.store.put(&mut wallet)?;

        tracing::info!(
            user_id = %user_id,
            wallet_id = %wallet.wallet_id,
            currency = currency.code(),
            "Wallet created"
        );

        Ok(wallet)
    }

    /// Get the wallet for a user
    pub fn get_wallet(&self, user_id: Uuid) -> Result<Wallet> {
        self.store.get(user_id)
    }

    /// Credit a wallet, creating it lazily on first use
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<Wallet> {
        Self::validate_amount(amount)?;

        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut wallet = match self.store.try_get(user_id)? {
            Some(wallet) => wallet,
            None => {
                let mut wallet = Wallet::new(user_id, self.default_currency);
                self.store.put(&mut wallet)?;
                tracing::info!(user_id = %user_id, "Wallet created lazily on first credit");
                wallet
            }
        };
        Self::require_active(&wallet)?;

        let previous_balance = wallet.balance;
        wallet.balance += amount;
        wallet.updated_at = Utc::now();
        self.store.put(&mut wallet)?;

        tracing::info!(
            user_id = %user_id,
            amount = %amount,
            balance = %wallet.balance,
            "Wallet credited"
        );

        self.publish_balance_updated(
            &wallet,
            previous_balance,
            amount,
            BalanceChangeKind::Credit,
            reference,
        )
        .await;

        Ok(wallet)
    }

    /// Debit a wallet
    ///
    /// Fails with `InsufficientBalance` rather than ever committing a
    /// negative balance.
    pub async fn debit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reference: Option<String>,
    ) -> Result<Wallet> {
        Self::validate_amount(amount)?;

        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut wallet = self.store.get(user_id)?;
        Self::require_active(&wallet)?;

        if wallet.balance < amount {
            return Err(Error::InsufficientBalance {
                balance: wallet.balance,
                requested: amount,
            });
        }

        let previous_balance = wallet.balance;
        wallet.balance -= amount;
        wallet.updated_at = Utc::now();
        self.store.put(&mut wallet)?;

        tracing::info!(
            user_id = %user_id,
            amount = %amount,
            balance = %wallet.balance,
            "Wallet debited"
        );

        self.publish_balance_updated(
            &wallet,
            previous_balance,
            -amount,
            BalanceChangeKind::Debit,
            reference,
        )
        .await;

        Ok(wallet)
    }

    /// Change a wallet's status
    pub async fn set_status(&self, user_id: Uuid, status: WalletStatus) -> Result<Wallet> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut wallet = self.store.get(user_id)?;
        if wallet.status == status {
            return Ok(wallet);
        }

        wallet.status = status;
        wallet.updated_at = Utc::now();
        self.store.put(&mut wallet)?;

        tracing::info!(user_id = %user_id, status = ?status, "Wallet status changed");

        Ok(wallet)
    }

    fn validate_amount(amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!(
                "amount must be positive, got {}",
                amount
            )));
        }
        Ok(())
    }

    fn require_active(wallet: &Wallet) -> Result<()> {
        if !wallet.is_active() {
            return Err(Error::WalletNotActive(format!(
                "wallet {} is {:?}",
                wallet.wallet_id, wallet.status
            )));
        }
        Ok(())
    }

    // Balance is committed before the event goes out; a lost publish costs
    // an event, never a balance.
    async fn publish_balance_updated(
        &self,
        wallet: &Wallet,
        previous_balance: Decimal,
        change_amount: Decimal,
        change_kind: BalanceChangeKind,
        reference: Option<String>,
    ) {
        let event = Event::WalletBalanceUpdated(WalletBalanceUpdated {
            wallet_id: wallet.wallet_id,
            user_id: wallet.user_id,
            previous_balance,
            new_balance: wallet.balance,
            change_amount,
            currency: wallet.currency,
            change_kind,
            reference,
        });
        if let Err(e) = self.bus.publish(event).await {
            tracing::warn!(
                wallet_id = %wallet.wallet_id,
                error = %e,
                "Failed to publish balance update"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_bus::BrokerConfig;
    use tempfile::TempDir;

    fn test_ledger() -> (Arc<WalletLedger>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        let store = Arc::new(WalletStore::open(&config).unwrap());
        let bus = Arc::new(Broker::new(BrokerConfig::default()));
        (
            Arc::new(WalletLedger::new(store, bus, &config)),
            temp_dir,
        )
    }

    #[tokio::test]
    async fn test_create_wallet_idempotent() {
        let (ledger, _temp) = test_ledger();
        let user_id = Uuid::new_v4();

        let first = ledger.create_wallet(user_id, Currency::USD).await.unwrap();
        let second = ledger.create_wallet(user_id, Currency::USD).await.unwrap();

        assert_eq!(first.wallet_id, second.wallet_id);
    }

    #[tokio::test]
    async fn test_credit_creates_wallet_lazily() {
        let (ledger, _temp) = test_ledger();
        let user_id = Uuid::new_v4();

        let wallet = ledger
            .credit(user_id, Decimal::new(5000, 2), None)
            .await
            .unwrap();

        assert_eq!(wallet.balance, Decimal::new(5000, 2));
        assert_eq!(ledger.get_wallet(user_id).unwrap().balance, wallet.balance);
    }

    #[tokio::test]
    async fn test_debit_requires_existing_wallet() {
        let (ledger, _temp) = test_ledger();
        let result = ledger.debit(Uuid::new_v4(), Decimal::ONE, None).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_debit_rejects_overdraw() {
        let (ledger, _temp) = test_ledger();
        let user_id = Uuid::new_v4();
        ledger
            .credit(user_id, Decimal::new(5000, 2), None)
            .await
            .unwrap();

        let result = ledger.debit(user_id, Decimal::new(6000, 2), None).await;
        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
        assert_eq!(
            ledger.get_wallet(user_id).unwrap().balance,
            Decimal::new(5000, 2)
        );
    }

    #[tokio::test]
    async fn test_non_positive_amounts_rejected() {
        let (ledger, _temp) = test_ledger();
        let user_id = Uuid::new_v4();

        assert!(matches!(
            ledger.credit(user_id, Decimal::ZERO, None).await,
            Err(Error::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.credit(user_id, Decimal::new(-100, 2), None).await,
            Err(Error::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_frozen_wallet_rejects_changes() {
        let (ledger, _temp) = test_ledger();
        let user_id = Uuid::new_v4();
        ledger
            .credit(user_id, Decimal::new(5000, 2), None)
            .await
            .unwrap();
        ledger
            .set_status(user_id, WalletStatus::Frozen)
            .await
            .unwrap();

        assert!(matches!(
            ledger.credit(user_id, Decimal::ONE, None).await,
            Err(Error::WalletNotActive(_))
        ));
        assert!(matches!(
            ledger.debit(user_id, Decimal::ONE, None).await,
            Err(Error::WalletNotActive(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_debits_exactly_one_wins() {
        let (ledger, _temp) = test_ledger();
        let user_id = Uuid::new_v4();
        ledger
            .credit(user_id, Decimal::new(10000, 2), None)
            .await
            .unwrap();

        // Two 80.00 debits race over a 100.00 balance
        let amount = Decimal::new(8000, 2);
        let a = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.debit(user_id, amount, None).await }
        });
        let b = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.debit(user_id, amount, None).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(Error::InsufficientBalance { .. }))));

        assert_eq!(
            ledger.get_wallet(user_id).unwrap().balance,
            Decimal::new(2000, 2)
        );
    }
}
