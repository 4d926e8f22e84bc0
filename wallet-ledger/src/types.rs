//! Wallet types

use chrono::{DateTime, Utc};
use event_bus::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wallet status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletStatus {
    /// Accepts credits and debits
    Active,
    /// Temporarily blocked from balance changes
    Frozen,
    /// Permanently retired
    Closed,
}

/// A user's wallet, exactly one per user id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Wallet id
    pub wallet_id: Uuid,
    /// Owning user, unique across all wallets
    pub user_id: Uuid,
    /// Current balance, never negative
    pub balance: Decimal,
    /// Wallet currency
    pub currency: Currency,
    /// Status
    pub status: WalletStatus,
    /// Monotonically increasing, bumped on every write
    pub version: u64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// A fresh active wallet with zero balance
    pub fn new(user_id: Uuid, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            wallet_id: Uuid::new_v4(),
            user_id,
            balance: Decimal::ZERO,
            currency,
            status: WalletStatus::Active,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the wallet accepts balance changes
    pub fn is_active(&self) -> bool {
        self.status == WalletStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_wallet_starts_empty_and_active() {
        let user_id = Uuid::new_v4();
        let wallet = Wallet::new(user_id, Currency::USD);

        assert_eq!(wallet.user_id, user_id);
        assert_eq!(wallet.balance, Decimal::ZERO);
        assert_eq!(wallet.version, 0);
        assert!(wallet.is_active());
    }

    #[test]
    fn test_non_active_statuses() {
        let mut wallet = Wallet::new(Uuid::new_v4(), Currency::EUR);
        wallet.status = WalletStatus::Frozen;
        assert!(!wallet.is_active());
        wallet.status = WalletStatus::Closed;
        assert!(!wallet.is_active());
    }
}
