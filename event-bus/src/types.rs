//! Shared vocabulary for the event contract
//!
//! These types cross component boundaries inside event payloads, so they live
//! with the contract rather than with any single owning component.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Bus topic, one per event variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// A new user was provisioned upstream
    UserCreated,
    /// A wallet balance changed
    WalletBalanceUpdated,
    /// A payment entered the state machine
    PaymentInitiated,
    /// A payment passed the balance check
    PaymentAuthorized,
    /// A payment reached its terminal success state
    PaymentCompleted,
    /// A payment reached its terminal failure state
    PaymentFailed,
    /// A double-entry transaction was posted
    TransactionRecorded,
}

impl Topic {
    /// Bus subject for this topic
    pub fn subject(&self) -> &'static str {
        match self {
            Topic::UserCreated => "payrail.user.created",
            Topic::WalletBalanceUpdated => "payrail.wallet.balance.updated",
            Topic::PaymentInitiated => "payrail.payment.initiated",
            Topic::PaymentAuthorized => "payrail.payment.authorized",
            Topic::PaymentCompleted => "payrail.payment.completed",
            Topic::PaymentFailed => "payrail.payment.failed",
            Topic::TransactionRecorded => "payrail.transaction.recorded",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.subject())
    }
}

/// Partition key for routing: the primary subject id of an event
///
/// Envelopes with the same key are delivered in publish order; envelopes with
/// different keys may be handled concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionKey {
    /// Partition by user id
    User(Uuid),
    /// Partition by payment id
    Payment(Uuid),
    /// Partition by transaction id
    Transaction(Uuid),
}

impl PartitionKey {
    /// The entity id behind the key
    pub fn entity_id(&self) -> Uuid {
        match self {
            PartitionKey::User(id) => *id,
            PartitionKey::Payment(id) => *id,
            PartitionKey::Transaction(id) => *id,
        }
    }

    /// Compute partition number for lane routing
    pub fn partition_number(&self, num_partitions: u32) -> u32 {
        let hash = blake3::hash(self.entity_id().as_bytes());
        let bytes = hash.as_bytes();
        let hash_u32 = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        hash_u32 % num_partitions
    }
}

/// ISO 4217 currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Kind of payment being settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentKind {
    /// Wallet-to-wallet transfer
    Transfer,
    /// Payment to a payee (possibly external)
    Payment,
    /// Reversal of an earlier payment
    Refund,
}

/// Direction of a wallet balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceChangeKind {
    /// Balance increased
    Credit,
    /// Balance decreased
    Debit,
}

/// Direction of a double-entry transaction entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryDirection {
    /// Value leaving the account
    Debit,
    /// Value entering the account
    Credit,
}
