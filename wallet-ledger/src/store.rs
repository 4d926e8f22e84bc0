//! Durable wallet store on RocksDB
//!
//! A single `wallets` column family keyed by user id, which is what enforces
//! the one-wallet-per-user rule: two creates for the same user land on the
//! same key.

use crate::{
    error::{Error, Result},
    types::Wallet,
    Config,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, DB};
use uuid::Uuid;

const CF_WALLETS: &str = "wallets";

/// Wallet store wrapper for RocksDB
pub struct WalletStore {
    db: DB,
}

impl WalletStore {
    /// Open or create the database
    pub fn open(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(CF_WALLETS, Options::default())];
        let db = DB::open_cf_descriptors(&db_opts, &config.data_dir, cf_descriptors)?;

        tracing::info!(data_dir = ?config.data_dir, "Opened wallet store");

        Ok(Self { db })
    }

    fn cf_handle(&self) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(CF_WALLETS)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", CF_WALLETS)))
    }

    /// Get the wallet for a user
    pub fn get(&self, user_id: Uuid) -> Result<Wallet> {
        self.try_get(user_id)?
            .ok_or_else(|| Error::NotFound(user_id.to_string()))
    }

    /// Get the wallet for a user if one exists
    pub fn try_get(&self, user_id: Uuid) -> Result<Option<Wallet>> {
        let cf = self.cf_handle()?;
        match self.db.get_cf(cf, user_id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Write a wallet back, bumping its version
    ///
    /// Callers serialize per-wallet, so a plain bump is safe here.
    pub fn put(&self, wallet: &mut Wallet) -> Result<()> {
        wallet.version += 1;
        let cf = self.cf_handle()?;
        self.db
            .put_cf(cf, wallet.user_id.as_bytes(), bincode::serialize(wallet)?)?;
        Ok(())
    }
}
