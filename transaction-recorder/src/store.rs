//! Durable transaction store on RocksDB
//!
//! # Column Families
//!
//! - `transactions` - transaction rows (key: transaction_id)
//! - `by_payment` - payment_id -> transaction_id, the uniqueness guard that
//!   caps each payment at one transaction
//! - `by_user` - user_id || reversed created_at_nanos || transaction_id, so
//!   a prefix scan lists a user's transactions newest first

use crate::{
    error::{Error, Result},
    types::Transaction,
    Config,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use uuid::Uuid;

const CF_TRANSACTIONS: &str = "transactions";
const CF_BY_PAYMENT: &str = "by_payment";
const CF_BY_USER: &str = "by_user";

/// Transaction store wrapper for RocksDB
pub struct TransactionStore {
    db: DB,
}

impl TransactionStore {
    /// Open or create the database
    pub fn open(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_BY_PAYMENT, Options::default()),
            ColumnFamilyDescriptor::new(CF_BY_USER, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&db_opts, &config.data_dir, cf_descriptors)?;

        tracing::info!(data_dir = ?config.data_dir, "Opened transaction store");

        Ok(Self { db })
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Persist a transaction with its payment guard and user index rows in
    /// one atomic commit
    pub fn create(&self, transaction: &Transaction) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        batch.put_cf(
            cf_transactions,
            transaction.transaction_id.as_bytes(),
            bincode::serialize(transaction)?,
        );

        let cf_by_payment = self.cf_handle(CF_BY_PAYMENT)?;
        batch.put_cf(
            cf_by_payment,
            transaction.payment_id.as_bytes(),
            transaction.transaction_id.as_bytes(),
        );

        let cf_by_user = self.cf_handle(CF_BY_USER)?;
        for entry in &transaction.entries {
            batch.put_cf(cf_by_user, Self::user_key(entry.user_id, transaction), []);
        }

        self.db.write(batch)?;
        Ok(())
    }

    /// Get a transaction by id
    pub fn get(&self, transaction_id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let value = self
            .db
            .get_cf(cf, transaction_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(transaction_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Look up the transaction recorded for a payment, if any
    pub fn get_by_payment(&self, payment_id: Uuid) -> Result<Option<Transaction>> {
        let cf = self.cf_handle(CF_BY_PAYMENT)?;
        let Some(id_bytes) = self.db.get_cf(cf, payment_id.as_bytes())? else {
            return Ok(None);
        };

        let id_bytes: [u8; 16] = id_bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Storage("malformed payment index row".to_string()))?;
        Ok(Some(self.get(Uuid::from_bytes(id_bytes))?))
    }

    /// Transactions touching a user's account, newest first
    pub fn list_by_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        let cf = self.cf_handle(CF_BY_USER)?;
        let prefix = user_id.as_bytes().to_vec();

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut transactions = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) || transactions.len() >= limit {
                break;
            }
            if key.len() != 40 {
                continue;
            }

            let transaction_id_bytes: [u8; 16] = key[24..40]
                .try_into()
                .map_err(|_| Error::Storage("malformed user index key".to_string()))?;
            transactions.push(self.get(Uuid::from_bytes(transaction_id_bytes))?);
        }

        Ok(transactions)
    }

    // Index key: user_id (16) || !created_at_nanos BE (8) || transaction_id (16)
    // Complementing the timestamp makes forward iteration newest-first.
    fn user_key(user_id: Uuid, transaction: &Transaction) -> Vec<u8> {
        let mut key = user_id.as_bytes().to_vec();
        let reversed = u64::MAX - transaction.created_at_nanos() as u64;
        key.extend_from_slice(&reversed.to_be_bytes());
        key.extend_from_slice(transaction.transaction_id.as_bytes());
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_bus::{Currency, PaymentCompleted};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn test_store() -> (TransactionStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        (TransactionStore::open(&config).unwrap(), temp_dir)
    }

    fn transaction(payer_id: Uuid, payee_id: Uuid) -> Transaction {
        Transaction::from_completed_payment(&PaymentCompleted {
            payment_id: Uuid::new_v4(),
            payer_id,
            payee_id: Some(payee_id),
            amount: Decimal::new(10000, 2),
            currency: Currency::USD,
            transaction_id: Uuid::now_v7(),
        })
        .unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let (store, _temp) = test_store();
        let txn = transaction(Uuid::new_v4(), Uuid::new_v4());

        store.create(&txn).unwrap();

        let stored = store.get(txn.transaction_id).unwrap();
        assert_eq!(stored.payment_id, txn.payment_id);
        assert_eq!(stored.entries, txn.entries);
    }

    #[test]
    fn test_lookup_by_payment() {
        let (store, _temp) = test_store();
        let txn = transaction(Uuid::new_v4(), Uuid::new_v4());
        store.create(&txn).unwrap();

        let found = store.get_by_payment(txn.payment_id).unwrap().unwrap();
        assert_eq!(found.transaction_id, txn.transaction_id);

        assert!(store.get_by_payment(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_list_by_user_newest_first() {
        let (store, _temp) = test_store();
        let payer_id = Uuid::new_v4();

        let mut older = transaction(payer_id, Uuid::new_v4());
        older.created_at = older.created_at - chrono::Duration::seconds(10);
        let newer = transaction(payer_id, Uuid::new_v4());

        store.create(&older).unwrap();
        store.create(&newer).unwrap();

        let listed = store.list_by_user(payer_id, 10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].transaction_id, newer.transaction_id);
        assert_eq!(listed[1].transaction_id, older.transaction_id);
    }

    #[test]
    fn test_list_by_user_covers_both_legs() {
        let (store, _temp) = test_store();
        let payer_id = Uuid::new_v4();
        let payee_id = Uuid::new_v4();

        let txn = transaction(payer_id, payee_id);
        store.create(&txn).unwrap();

        assert_eq!(store.list_by_user(payer_id, 10).unwrap().len(), 1);
        assert_eq!(store.list_by_user(payee_id, 10).unwrap().len(), 1);
        assert!(store.list_by_user(Uuid::new_v4(), 10).unwrap().is_empty());
    }
}
