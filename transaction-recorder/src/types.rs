//! Double-entry transaction types

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use event_bus::{Currency, EntryDirection, PaymentCompleted};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Synthetic counter-party for payments with no payee
///
/// Money leaving the system to an external party still needs a credit leg,
/// otherwise the books stop balancing. This fixed account absorbs it.
pub const EXTERNAL_SETTLEMENT_ACCOUNT: Uuid = Uuid::from_u128(1);

/// One leg of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Account holder (a user, or the external settlement account)
    pub user_id: Uuid,
    /// Debit or credit
    pub direction: EntryDirection,
    /// Entry amount, always positive
    pub amount: Decimal,
    /// Entry currency
    pub currency: Currency,
}

/// An immutable double-entry transaction, 1:1 with a completed payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id, assigned when the payment completed
    pub transaction_id: Uuid,
    /// Payment this transaction settles
    pub payment_id: Uuid,
    /// Balanced debit/credit legs
    pub entries: Vec<Entry>,
    /// When the transaction was posted
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build the double-entry record for a completed payment
    ///
    /// Debits the payer and credits the payee, falling back to the external
    /// settlement account when the payment has none. Refuses to construct an
    /// unbalanced record.
    pub fn from_completed_payment(event: &PaymentCompleted) -> Result<Self> {
        let entries = vec![
            Entry {
                user_id: event.payer_id,
                direction: EntryDirection::Debit,
                amount: event.amount,
                currency: event.currency,
            },
            Entry {
                user_id: event.payee_id.unwrap_or(EXTERNAL_SETTLEMENT_ACCOUNT),
                direction: EntryDirection::Credit,
                amount: event.amount,
                currency: event.currency,
            },
        ];

        let transaction = Self {
            transaction_id: event.transaction_id,
            payment_id: event.payment_id,
            entries,
            created_at: Utc::now(),
        };
        transaction.check_balanced()?;
        Ok(transaction)
    }

    /// Verify sum(DEBIT) == sum(CREDIT) for every currency present
    pub fn check_balanced(&self) -> Result<()> {
        let mut totals: HashMap<Currency, Decimal> = HashMap::new();
        for entry in &self.entries {
            let total = totals.entry(entry.currency).or_insert(Decimal::ZERO);
            match entry.direction {
                EntryDirection::Debit => *total += entry.amount,
                EntryDirection::Credit => *total -= entry.amount,
            }
        }

        for (currency, total) in totals {
            if total != Decimal::ZERO {
                return Err(Error::UnbalancedTransaction(format!(
                    "transaction {} off by {} {}",
                    self.transaction_id,
                    total,
                    currency.code()
                )));
            }
        }
        Ok(())
    }

    /// Creation timestamp as nanoseconds
    pub fn created_at_nanos(&self) -> i64 {
        self.created_at.timestamp_nanos_opt().unwrap_or(0)
    }
}
