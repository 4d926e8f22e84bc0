//! Core types for the payment engine

use chrono::{DateTime, Utc};
use event_bus::{Currency, PaymentKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment status
///
/// `Completed` and `Failed` are terminal; no transition skips a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PaymentStatus {
    /// Created, waiting on a balance evaluation
    Initiated = 1,
    /// Balance check passed
    Authorized = 2,
    /// Settled (terminal)
    Completed = 3,
    /// Rejected (terminal)
    Failed = 4,
}

impl PaymentStatus {
    /// Whether the payment can never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

/// Machine-readable reason a payment failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Payer balance below the payment amount
    InsufficientFunds,
    /// Unexpected failure while applying an event
    Processing,
}

impl FailureReason {
    /// Stable code surfaced at the API boundary
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::InsufficientFunds => "INSUFFICIENT_FUNDS",
            FailureReason::Processing => "PROCESSING_ERROR",
        }
    }
}

/// Request to initiate a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Paying user
    pub payer_id: Uuid,
    /// Receiving user, absent for payments to external parties
    pub payee_id: Option<Uuid>,
    /// Amount, must be positive
    pub amount: Decimal,
    /// Currency
    pub currency: Currency,
    /// Kind of payment
    pub kind: PaymentKind,
    /// Free-text description
    pub description: Option<String>,
    /// Caller reference
    pub reference: Option<String>,
    /// Client-supplied idempotency key
    pub idempotency_key: String,
}

/// A payment row: append-only audit record, mutated only by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Server-generated id, immutable after creation
    pub payment_id: Uuid,
    /// Client idempotency key, unique across all payments
    pub idempotency_key: String,
    /// Paying user
    pub payer_id: Uuid,
    /// Receiving user
    pub payee_id: Option<Uuid>,
    /// Amount
    pub amount: Decimal,
    /// Currency
    pub currency: Currency,
    /// Kind of payment
    pub kind: PaymentKind,
    /// Current status
    pub status: PaymentStatus,
    /// Failure reason, set on terminal failure
    pub failure_reason: Option<FailureReason>,
    /// Human-readable failure detail
    pub error_message: Option<String>,
    /// Free-text description
    pub description: Option<String>,
    /// Caller reference
    pub reference: Option<String>,
    /// Transaction id attached at completion
    pub transaction_id: Option<Uuid>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
    /// Set when authorized
    pub authorized_at: Option<DateTime<Utc>>,
    /// Set when completed
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when failed
    pub failed_at: Option<DateTime<Utc>>,
    /// Optimistic write version
    pub version: u64,
}

impl Payment {
    /// Build a fresh `Initiated` payment from a request
    pub fn from_request(request: &PaymentRequest) -> Self {
        let now = Utc::now();
        Self {
            payment_id: Uuid::new_v4(),
            idempotency_key: request.idempotency_key.clone(),
            payer_id: request.payer_id,
            payee_id: request.payee_id,
            amount: request.amount,
            currency: request.currency,
            kind: request.kind,
            status: PaymentStatus::Initiated,
            failure_reason: None,
            error_message: None,
            description: request.description.clone(),
            reference: request.reference.clone(),
            transaction_id: None,
            created_at: now,
            updated_at: now,
            authorized_at: None,
            completed_at: None,
            failed_at: None,
            version: 0,
        }
    }

    /// Whether a replayed request matches this payment
    ///
    /// A repeat of the same request under the same key is an idempotent
    /// replay; the same key with different parameters is a conflict.
    pub fn matches_request(&self, request: &PaymentRequest) -> bool {
        self.payer_id == request.payer_id
            && self.payee_id == request.payee_id
            && self.amount == request.amount
            && self.currency == request.currency
            && self.kind == request.kind
    }

    /// Creation timestamp as nanoseconds, used for FIFO index keys
    pub fn created_at_nanos(&self) -> i64 {
        self.created_at.timestamp_nanos_opt().unwrap_or(0)
    }
}
