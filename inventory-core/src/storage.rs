//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `inventory` - Sellable items (key: item_id)
//! - `balances` - Per-buyer prepaid accounts (key: buyer_id)
//! - `ledger` - Append-only ledger entries (key: entry_id, UUIDv7)
//! - `indices` - Secondary indices for per-buyer ledger scans
//!
//! The database is opened as an `OptimisticTransactionDB` so the conditional
//! claim update and the balance debit/credit are single atomic store-level
//! operations: a transaction that read a key via `get_for_update` fails its
//! commit if another writer touched that key first.

use crate::{
    balance::BalanceStore,
    error::{Error, Result},
    inventory::InventoryStore,
    ledger::LedgerStore,
    Config,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, ErrorKind, OptimisticTransactionDB, Options};
use std::sync::Arc;

/// Column family names
pub(crate) const CF_INVENTORY: &str = "inventory";
pub(crate) const CF_BALANCES: &str = "balances";
pub(crate) const CF_LEDGER: &str = "ledger";
pub(crate) const CF_INDICES: &str = "indices";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<OptimisticTransactionDB>,
    max_txn_retries: u32,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_INVENTORY, Self::cf_options_inventory()),
            ColumnFamilyDescriptor::new(CF_BALANCES, Self::cf_options_balances()),
            ColumnFamilyDescriptor::new(CF_LEDGER, Self::cf_options_ledger()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = OptimisticTransactionDB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = %path.display(), "Opened store database");

        Ok(Self {
            db: Arc::new(db),
            max_txn_retries: config.rocksdb.max_txn_retries,
        })
    }

    // Column family options

    fn cf_options_inventory() -> Options {
        let mut opts = Options::default();
        // Hot read/write path, favor speed over ratio
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_balances() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_ledger() -> Options {
        let mut opts = Options::default();
        // Append-only history, compress harder
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    /// Inventory store view
    pub fn inventory(&self) -> InventoryStore {
        InventoryStore::new(self.db.clone(), self.max_txn_retries)
    }

    /// Balance store view
    pub fn balances(&self) -> BalanceStore {
        BalanceStore::new(self.db.clone(), self.max_txn_retries)
    }

    /// Ledger store view
    pub fn ledger(&self) -> LedgerStore {
        LedgerStore::new(self.db.clone())
    }
}

/// Get a column family handle or fail with a storage error
pub(crate) fn cf_handle<'a>(
    db: &'a OptimisticTransactionDB,
    name: &str,
) -> Result<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
}

/// Whether a RocksDB error is an optimistic-transaction commit conflict
/// (another writer touched a key this transaction read)
pub(crate) fn is_commit_conflict(err: &rocksdb::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Busy | ErrorKind::TryAgain | ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    #[test]
    fn test_storage_open() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_INVENTORY).is_some());
        assert!(storage.db.cf_handle(CF_BALANCES).is_some());
        assert!(storage.db.cf_handle(CF_LEDGER).is_some());
        assert!(storage.db.cf_handle(CF_INDICES).is_some());
    }

    #[test]
    fn test_storage_reopen() {
        let (config, _temp) = test_config();
        {
            let _storage = Storage::open(&config).unwrap();
        }
        let storage = Storage::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_INVENTORY).is_some());
    }
}
