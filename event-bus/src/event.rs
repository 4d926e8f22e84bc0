//! The event contract: a closed tagged union of everything that crosses the bus

use crate::types::{BalanceChangeKind, Currency, EntryDirection, PartitionKey, PaymentKind, Topic};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every event the saga publishes or consumes
///
/// The `eventType` tag on the wire matches the topic name, so a consumer can
/// match exhaustively and reject nothing silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum Event {
    /// `user.created`
    #[serde(rename = "user.created")]
    UserCreated(UserCreated),
    /// `wallet.balance.updated`
    #[serde(rename = "wallet.balance.updated")]
    WalletBalanceUpdated(WalletBalanceUpdated),
    /// `payment.initiated`
    #[serde(rename = "payment.initiated")]
    PaymentInitiated(PaymentInitiated),
    /// `payment.authorized`
    #[serde(rename = "payment.authorized")]
    PaymentAuthorized(PaymentAuthorized),
    /// `payment.completed`
    #[serde(rename = "payment.completed")]
    PaymentCompleted(PaymentCompleted),
    /// `payment.failed`
    #[serde(rename = "payment.failed")]
    PaymentFailed(PaymentFailed),
    /// `transaction.recorded`
    #[serde(rename = "transaction.recorded")]
    TransactionRecorded(TransactionRecorded),
}

impl Event {
    /// Topic this event is published on
    pub fn topic(&self) -> Topic {
        match self {
            Event::UserCreated(_) => Topic::UserCreated,
            Event::WalletBalanceUpdated(_) => Topic::WalletBalanceUpdated,
            Event::PaymentInitiated(_) => Topic::PaymentInitiated,
            Event::PaymentAuthorized(_) => Topic::PaymentAuthorized,
            Event::PaymentCompleted(_) => Topic::PaymentCompleted,
            Event::PaymentFailed(_) => Topic::PaymentFailed,
            Event::TransactionRecorded(_) => Topic::TransactionRecorded,
        }
    }

    /// Partition key: the primary subject id, preserving per-entity ordering
    pub fn partition_key(&self) -> PartitionKey {
        match self {
            Event::UserCreated(e) => PartitionKey::User(e.user_id),
            Event::WalletBalanceUpdated(e) => PartitionKey::User(e.user_id),
            Event::PaymentInitiated(e) => PartitionKey::Payment(e.payment_id),
            Event::PaymentAuthorized(e) => PartitionKey::Payment(e.payment_id),
            Event::PaymentCompleted(e) => PartitionKey::Payment(e.payment_id),
            Event::PaymentFailed(e) => PartitionKey::Payment(e.payment_id),
            Event::TransactionRecorded(e) => PartitionKey::Transaction(e.transaction_id),
        }
    }
}

/// A new user was provisioned by the identity service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreated {
    /// User id
    pub user_id: Uuid,
    /// Contact address, carried for downstream consumers
    pub email: String,
    /// When the user record was created upstream
    pub created_at: DateTime<Utc>,
}

/// A wallet balance changed through a credit or debit
///
/// Carries enough to reconstruct the delta without re-reading the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBalanceUpdated {
    /// Wallet id
    pub wallet_id: Uuid,
    /// Owning user id
    pub user_id: Uuid,
    /// Balance before the change
    pub previous_balance: Decimal,
    /// Balance after the change
    pub new_balance: Decimal,
    /// Signed delta (negative for debits)
    pub change_amount: Decimal,
    /// Wallet currency
    pub currency: Currency,
    /// Credit or debit
    pub change_kind: BalanceChangeKind,
    /// Caller-supplied reference for the change
    pub reference: Option<String>,
}

/// A payment entered the state machine in `Initiated`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInitiated {
    /// Payment id
    pub payment_id: Uuid,
    /// Client idempotency key
    pub idempotency_key: String,
    /// Paying user
    pub payer_id: Uuid,
    /// Receiving user, absent for payments to external parties
    pub payee_id: Option<Uuid>,
    /// Payment amount
    pub amount: Decimal,
    /// Payment currency
    pub currency: Currency,
    /// Kind of payment
    pub kind: PaymentKind,
}

/// A payment passed the balance sufficiency check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAuthorized {
    /// Payment id
    pub payment_id: Uuid,
    /// Paying user
    pub payer_id: Uuid,
    /// Receiving user
    pub payee_id: Option<Uuid>,
    /// Payment amount
    pub amount: Decimal,
    /// Payment currency
    pub currency: Currency,
}

/// A payment completed; the recorder posts the double-entry from this
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCompleted {
    /// Payment id
    pub payment_id: Uuid,
    /// Paying user
    pub payer_id: Uuid,
    /// Receiving user
    pub payee_id: Option<Uuid>,
    /// Payment amount
    pub amount: Decimal,
    /// Payment currency
    pub currency: Currency,
    /// Transaction id assigned at completion
    pub transaction_id: Uuid,
}

/// A payment reached its terminal failure state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFailed {
    /// Payment id
    pub payment_id: Uuid,
    /// Paying user
    pub payer_id: Uuid,
    /// Receiving user
    pub payee_id: Option<Uuid>,
    /// Payment amount
    pub amount: Decimal,
    /// Payment currency
    pub currency: Currency,
    /// Machine-readable failure reason
    pub failure_reason: String,
    /// Error code for the API boundary
    pub error_code: String,
    /// Human-readable message
    pub error_message: String,
}

/// A double-entry transaction was posted for a completed payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecorded {
    /// Transaction id
    pub transaction_id: Uuid,
    /// Payment the transaction settles
    pub payment_id: Uuid,
    /// Balanced debit/credit entries
    pub entries: Vec<RecordedEntry>,
}

/// One leg of a recorded transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEntry {
    /// Account holder
    pub user_id: Uuid,
    /// Debit or credit
    pub direction: EntryDirection,
    /// Entry amount (always positive)
    pub amount: Decimal,
    /// Entry currency
    pub currency: Currency,
}
