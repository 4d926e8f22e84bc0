//! Durable payment store on RocksDB
//!
//! # Column Families
//!
//! - `payments` - payment rows (key: payment_id)
//! - `idempotency` - idempotency key -> payment_id
//! - `pending` - payer_id || created_at_nanos || payment_id for non-terminal
//!   payments, maintained atomically with every status change so a prefix
//!   scan yields them FIFO by initiation time. Authorized payments stay in
//!   the index until the completion commit lands, so a process that dies
//!   between the two commits leaves a row the next balance event picks up

use crate::{
    error::{Error, Result},
    types::Payment,
    Config,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use uuid::Uuid;

const CF_PAYMENTS: &str = "payments";
const CF_IDEMPOTENCY: &str = "idempotency";
const CF_PENDING: &str = "pending";

/// Payment store wrapper for RocksDB
pub struct PaymentStore {
    db: DB,
}

impl PaymentStore {
    /// Open or create the database
    pub fn open(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_IDEMPOTENCY, Options::default()),
            ColumnFamilyDescriptor::new(CF_PENDING, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, &config.data_dir, cf_descriptors)?;

        tracing::info!(data_dir = ?config.data_dir, "Opened payment store");

        Ok(Self { db })
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Persist a fresh payment with its idempotency row and pending index
    /// in one atomic commit
    pub fn create(&self, payment: &Payment) -> Result<()> {
        let cf_idempotency = self.cf_handle(CF_IDEMPOTENCY)?;
        if self
            .db
            .get_cf(cf_idempotency, payment.idempotency_key.as_bytes())?
            .is_some()
        {
            return Err(Error::Conflict(format!(
                "idempotency key already bound: {}",
                payment.idempotency_key
            )));
        }

        let mut batch = WriteBatch::default();

        let cf_payments = self.cf_handle(CF_PAYMENTS)?;
        batch.put_cf(
            cf_payments,
            payment.payment_id.as_bytes(),
            bincode::serialize(payment)?,
        );

        batch.put_cf(
            cf_idempotency,
            payment.idempotency_key.as_bytes(),
            payment.payment_id.as_bytes(),
        );

        let cf_pending = self.cf_handle(CF_PENDING)?;
        batch.put_cf(cf_pending, Self::pending_key(payment), []);

        self.db.write(batch)?;
        Ok(())
    }

    /// Write back a mutated payment under an optimistic version check
    ///
    /// Bumps the version on success and keeps the pending index in step with
    /// the status in the same atomic commit.
    pub fn update(&self, payment: &mut Payment) -> Result<()> {
        let stored = self.get(payment.payment_id)?;
        if stored.version != payment.version {
            return Err(Error::VersionMismatch(format!(
                "payment {}: stored version {}, write version {}",
                payment.payment_id, stored.version, payment.version
            )));
        }
        payment.version += 1;

        let mut batch = WriteBatch::default();

        let cf_payments = self.cf_handle(CF_PAYMENTS)?;
        batch.put_cf(
            cf_payments,
            payment.payment_id.as_bytes(),
            bincode::serialize(payment)?,
        );

        let cf_pending = self.cf_handle(CF_PENDING)?;
        if payment.status.is_terminal() {
            batch.delete_cf(cf_pending, Self::pending_key(payment));
        } else {
            batch.put_cf(cf_pending, Self::pending_key(payment), []);
        }

        self.db.write(batch)?;
        Ok(())
    }

    /// Get payment by id
    pub fn get(&self, payment_id: Uuid) -> Result<Payment> {
        let cf = self.cf_handle(CF_PAYMENTS)?;
        let value = self
            .db
            .get_cf(cf, payment_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(payment_id.to_string()))?;

        Ok(bincode::deserialize(&value)?)
    }

    /// Look up a payment by its idempotency key
    pub fn get_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>> {
        let cf = self.cf_handle(CF_IDEMPOTENCY)?;
        let Some(id_bytes) = self.db.get_cf(cf, key.as_bytes())? else {
            return Ok(None);
        };

        let id_bytes: [u8; 16] = id_bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Storage("malformed idempotency row".to_string()))?;

        Ok(Some(self.get(Uuid::from_bytes(id_bytes))?))
    }

    /// Non-terminal payments for a payer, FIFO by initiation time
    pub fn pending_by_payer(&self, payer_id: Uuid) -> Result<Vec<Payment>> {
        let cf = self.cf_handle(CF_PENDING)?;
        let prefix = payer_id.as_bytes().to_vec();

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut payments = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            if key.len() != 40 {
                continue;
            }

            let payment_id_bytes: [u8; 16] = key[24..40]
                .try_into()
                .map_err(|_| Error::Storage("malformed pending index key".to_string()))?;
            let payment = self.get(Uuid::from_bytes(payment_id_bytes))?;
            if !payment.status.is_terminal() {
                payments.push(payment);
            }
        }

        Ok(payments)
    }

    // Index key: payer_id (16) || created_at_nanos BE (8) || payment_id (16)
    fn pending_key(payment: &Payment) -> Vec<u8> {
        let mut key = payment.payer_id.as_bytes().to_vec();
        key.extend_from_slice(&(payment.created_at_nanos() as u64).to_be_bytes());
        key.extend_from_slice(payment.payment_id.as_bytes());
        key
    }
}
