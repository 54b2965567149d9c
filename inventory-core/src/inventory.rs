//! Inventory Store
//!
//! Durable record of sellable items. The `claim` operation is the single
//! serialization point of the whole engine: a conditional update that flips
//! `claimed` from false to true for exactly one caller, no matter how many
//! race for the same item.

use crate::{
    error::{Error, Result},
    storage::{cf_handle, is_commit_conflict, CF_INVENTORY},
    types::{BuyerId, InventoryItem, ItemId},
};
use chrono::Utc;
use rocksdb::OptimisticTransactionDB;
use std::sync::Arc;

/// Inventory store view over the shared database
#[derive(Clone)]
pub struct InventoryStore {
    db: Arc<OptimisticTransactionDB>,
    max_txn_retries: u32,
}

impl InventoryStore {
    pub(crate) fn new(db: Arc<OptimisticTransactionDB>, max_txn_retries: u32) -> Self {
        Self {
            db,
            max_txn_retries,
        }
    }

    /// Insert or overwrite an item (catalog management path)
    pub fn put_item(&self, item: &InventoryItem) -> Result<()> {
        if !item.invariant_holds() {
            return Err(Error::InvariantViolation(format!(
                "item {} violates claimed/owner consistency",
                item.id
            )));
        }

        let cf = cf_handle(&self.db, CF_INVENTORY)?;
        let value = bincode::serialize(item)?;
        self.db.put_cf(cf, item.id.as_bytes(), value)?;
        Ok(())
    }

    /// Get item by ID
    pub fn get_item(&self, id: &ItemId) -> Result<InventoryItem> {
        self.try_get_item(id)?
            .ok_or_else(|| Error::ItemNotFound(id.to_string()))
    }

    /// Get item by ID, `None` if absent
    pub fn try_get_item(&self, id: &ItemId) -> Result<Option<InventoryItem>> {
        let cf = cf_handle(&self.db, CF_INVENTORY)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All items, in key order
    pub fn items(&self) -> Result<Vec<InventoryItem>> {
        let cf = cf_handle(&self.db, CF_INVENTORY)?;
        let iter = self.db.iterator_cf(cf, rocksdb::IteratorMode::Start);

        let mut items = Vec::new();
        for entry in iter {
            let (_, value) = entry?;
            items.push(bincode::deserialize(&value)?);
        }
        Ok(items)
    }

    /// Unclaimed items only
    pub fn available_items(&self) -> Result<Vec<InventoryItem>> {
        Ok(self
            .items()?
            .into_iter()
            .filter(|item: &InventoryItem| !item.claimed)
            .collect())
    }

    /// Conditional compare-and-set claim: mark the item owned by `buyer` only
    /// if it is currently unclaimed.
    ///
    /// Returns the post-update item on success, `Ok(None)` when the item is
    /// already claimed or when a concurrent claimer committed first. Losing
    /// this race is an expected outcome, not a fault.
    pub fn claim(&self, id: &ItemId, buyer: &BuyerId) -> Result<Option<InventoryItem>> {
        let cf = cf_handle(&self.db, CF_INVENTORY)?;

        let txn = self.db.transaction();
        let value = txn
            .get_for_update_cf(cf, id.as_bytes(), true)?
            .ok_or_else(|| Error::ItemNotFound(id.to_string()))?;

        let mut item: InventoryItem = bincode::deserialize(&value)?;
        if item.claimed {
            return Ok(None);
        }

        item.claimed = true;
        item.owner = Some(buyer.clone());
        item.claimed_at = Some(Utc::now());

        txn.put_cf(cf, id.as_bytes(), bincode::serialize(&item)?)?;

        match txn.commit() {
            Ok(()) => {
                tracing::debug!(item_id = %id, buyer = %buyer, "Item claimed");
                Ok(Some(item))
            }
            Err(e) if is_commit_conflict(&e) => {
                tracing::debug!(item_id = %id, buyer = %buyer, "Lost claim race");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Conditional release: reset the item to unclaimed only if it is
    /// currently claimed, clearing owner and claim timestamp.
    ///
    /// Returns the item as it stood while claimed (owner included) when this
    /// caller won the transition, `Ok(None)` when the item was already
    /// unclaimed. Of any set of concurrent releases exactly one wins, the
    /// same shape as `claim` in the other direction; refunds serialize on
    /// it. Commit conflicts are retried internally.
    pub fn release(&self, id: &ItemId) -> Result<Option<InventoryItem>> {
        let cf = cf_handle(&self.db, CF_INVENTORY)?;

        let mut attempts = 0u32;
        loop {
            let txn = self.db.transaction();
            let value = txn
                .get_for_update_cf(cf, id.as_bytes(), true)?
                .ok_or_else(|| Error::ItemNotFound(id.to_string()))?;

            let prior: InventoryItem = bincode::deserialize(&value)?;
            if !prior.claimed {
                return Ok(None);
            }

            let mut item = prior.clone();
            item.claimed = false;
            item.owner = None;
            item.claimed_at = None;

            txn.put_cf(cf, id.as_bytes(), bincode::serialize(&item)?)?;

            match txn.commit() {
                Ok(()) => {
                    tracing::debug!(item_id = %id, "Item released");
                    return Ok(Some(prior));
                }
                Err(e) if is_commit_conflict(&e) && attempts < self.max_txn_retries => {
                    attempts += 1;
                }
                Err(e) if is_commit_conflict(&e) => {
                    return Err(Error::Contention(format!(
                        "release of item {} exceeded {} attempts",
                        id, self.max_txn_retries
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Storage};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn test_store() -> (InventoryStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let storage = Storage::open(&config).unwrap();
        (storage.inventory(), temp_dir)
    }

    fn test_item(id: &str, price: rust_decimal::Decimal) -> InventoryItem {
        InventoryItem::new(ItemId::new(id), price, format!("payload-{}", id))
    }

    #[test]
    fn test_put_and_get_item() {
        let (store, _temp) = test_store();
        let item = test_item("itm-1", dec!(7.00));
        store.put_item(&item).unwrap();

        let retrieved = store.get_item(&ItemId::new("itm-1")).unwrap();
        assert_eq!(retrieved.price, dec!(7.00));
        assert!(!retrieved.claimed);
    }

    #[test]
    fn test_get_missing_item() {
        let (store, _temp) = test_store();
        let result = store.get_item(&ItemId::new("missing"));
        assert!(matches!(result, Err(Error::ItemNotFound(_))));
    }

    #[test]
    fn test_put_rejects_inconsistent_item() {
        let (store, _temp) = test_store();
        let mut item = test_item("itm-1", dec!(1.00));
        item.claimed = true; // no owner set
        let result = store.put_item(&item);
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_claim_wins_once() {
        let (store, _temp) = test_store();
        store.put_item(&test_item("itm-1", dec!(7.00))).unwrap();

        let buyer_a = BuyerId::new("buyer-a");
        let buyer_b = BuyerId::new("buyer-b");

        let won = store.claim(&ItemId::new("itm-1"), &buyer_a).unwrap();
        assert!(won.is_some());
        let won = won.unwrap();
        assert!(won.claimed);
        assert_eq!(won.owner, Some(buyer_a.clone()));
        assert!(won.claimed_at.is_some());

        // Second claim observes the item as sold
        let lost = store.claim(&ItemId::new("itm-1"), &buyer_b).unwrap();
        assert!(lost.is_none());

        // Stored state reflects the first winner
        let stored = store.get_item(&ItemId::new("itm-1")).unwrap();
        assert_eq!(stored.owner, Some(buyer_a));
    }

    #[test]
    fn test_claim_missing_item() {
        let (store, _temp) = test_store();
        let result = store.claim(&ItemId::new("missing"), &BuyerId::new("b"));
        assert!(matches!(result, Err(Error::ItemNotFound(_))));
    }

    #[test]
    fn test_release_clears_ownership() {
        let (store, _temp) = test_store();
        store.put_item(&test_item("itm-1", dec!(7.00))).unwrap();

        store
            .claim(&ItemId::new("itm-1"), &BuyerId::new("buyer-a"))
            .unwrap()
            .unwrap();

        // The winner gets the claimed-state snapshot, owner included
        let prior = store.release(&ItemId::new("itm-1")).unwrap().unwrap();
        assert!(prior.claimed);
        assert_eq!(prior.owner, Some(BuyerId::new("buyer-a")));

        let stored = store.get_item(&ItemId::new("itm-1")).unwrap();
        assert!(!stored.claimed);
        assert!(stored.owner.is_none());
        assert!(stored.claimed_at.is_none());

        // Item is claimable again
        let reclaimed = store
            .claim(&ItemId::new("itm-1"), &BuyerId::new("buyer-b"))
            .unwrap();
        assert!(reclaimed.is_some());
    }

    #[test]
    fn test_release_unclaimed_returns_none() {
        let (store, _temp) = test_store();
        store.put_item(&test_item("itm-1", dec!(7.00))).unwrap();

        assert!(store.release(&ItemId::new("itm-1")).unwrap().is_none());

        // A second release after a won one loses the same way
        store
            .claim(&ItemId::new("itm-1"), &BuyerId::new("buyer-a"))
            .unwrap()
            .unwrap();
        assert!(store.release(&ItemId::new("itm-1")).unwrap().is_some());
        assert!(store.release(&ItemId::new("itm-1")).unwrap().is_none());
    }

    #[test]
    fn test_concurrent_releases_single_winner() {
        let (store, _temp) = test_store();
        store.put_item(&test_item("itm-1", dec!(7.00))).unwrap();
        store
            .claim(&ItemId::new("itm-1"), &BuyerId::new("buyer-a"))
            .unwrap()
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                store.release(&ItemId::new("itm-1")).unwrap()
            }));
        }

        let winners: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .flatten()
            .collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].owner, Some(BuyerId::new("buyer-a")));
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let (store, _temp) = test_store();
        store.put_item(&test_item("itm-hot", dec!(5.00))).unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                let buyer = BuyerId::new(format!("buyer-{}", i));
                store.claim(&ItemId::new("itm-hot"), &buyer).unwrap()
            }));
        }

        let winners: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .flatten()
            .collect();
        assert_eq!(winners.len(), 1);
    }

    #[test]
    fn test_available_items_filter() {
        let (store, _temp) = test_store();
        store.put_item(&test_item("itm-1", dec!(1.00))).unwrap();
        store.put_item(&test_item("itm-2", dec!(2.00))).unwrap();
        store
            .claim(&ItemId::new("itm-1"), &BuyerId::new("b"))
            .unwrap()
            .unwrap();

        let available = store.available_items().unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, ItemId::new("itm-2"));
    }
}
