//! Ledger Store
//!
//! Append-only record of balance-affecting events. The ledger is an
//! audit/reporting aid, never the authority for ownership or balance.
//! Entries are written once and never mutated.

use crate::{
    error::{Error, Result},
    storage::{cf_handle, CF_INDICES, CF_LEDGER},
    types::{BuyerId, LedgerEntry},
};
use rocksdb::{OptimisticTransactionDB, WriteBatchWithTransaction};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Ledger store view over the shared database
#[derive(Clone)]
pub struct LedgerStore {
    db: Arc<OptimisticTransactionDB>,
}

impl LedgerStore {
    pub(crate) fn new(db: Arc<OptimisticTransactionDB>) -> Self {
        Self { db }
    }

    /// Append an entry together with its buyer index (atomic)
    pub fn append(&self, entry: &LedgerEntry) -> Result<Uuid> {
        if entry.amount <= Decimal::ZERO {
            return Err(Error::InvariantViolation(format!(
                "ledger amount must be positive, got {}",
                entry.amount
            )));
        }

        let cf_ledger = cf_handle(&self.db, CF_LEDGER)?;
        let cf_indices = cf_handle(&self.db, CF_INDICES)?;

        let mut batch = WriteBatchWithTransaction::<true>::default();
        batch.put_cf(
            cf_ledger,
            entry.entry_id.as_bytes(),
            bincode::serialize(entry)?,
        );
        batch.put_cf(cf_indices, Self::index_key(&entry.buyer, entry.entry_id), []);

        self.db.write(batch)?;

        tracing::debug!(
            entry_id = %entry.entry_id,
            buyer = %entry.buyer,
            kind = %entry.kind,
            amount = %entry.amount,
            "Ledger entry appended"
        );

        Ok(entry.entry_id)
    }

    /// Get entry by ID
    pub fn get_entry(&self, entry_id: Uuid) -> Result<LedgerEntry> {
        let cf = cf_handle(&self.db, CF_LEDGER)?;
        let value = self
            .db
            .get_cf(cf, entry_id.as_bytes())?
            .ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// All entries for a buyer, oldest first (UUIDv7 keys are time-ordered)
    pub fn entries_for_buyer(&self, buyer: &BuyerId) -> Result<Vec<LedgerEntry>> {
        let cf_indices = cf_handle(&self.db, CF_INDICES)?;

        let prefix = Self::index_prefix(buyer);
        let iter = self.db.prefix_iterator_cf(cf_indices, &prefix);

        let mut entries = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            // Entry ID is the trailing 16 bytes of the index key
            if key.len() >= prefix.len() + 16 {
                let entry_id = Uuid::from_slice(&key[key.len() - 16..])
                    .map_err(|e| Error::Storage(format!("malformed index key: {}", e)))?;
                entries.push(self.get_entry(entry_id)?);
            }
        }

        Ok(entries)
    }

    // Index key: buyer-id length (u16 BE) || buyer_id || entry_id. Buyer ids
    // are opaque bytes, so the length prefix is what keeps one id from
    // prefix-matching another (e.g. "b" and "b|x").

    fn index_prefix(buyer: &BuyerId) -> Vec<u8> {
        let id = buyer.as_bytes();
        let mut key = Vec::with_capacity(2 + id.len() + 16);
        key.extend_from_slice(&(id.len() as u16).to_be_bytes());
        key.extend_from_slice(id);
        key
    }

    fn index_key(buyer: &BuyerId, entry_id: Uuid) -> Vec<u8> {
        let mut key = Self::index_prefix(buyer);
        key.extend_from_slice(entry_id.as_bytes());
        key
    }
}
