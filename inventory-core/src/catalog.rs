//! Catalog Reader
//!
//! Read-only, sanitized views over the Inventory Store for listing and
//! pre-checks. Views never expose the item payload or the owning buyer,
//! and they are never authoritative: the claim compare-and-set decides
//! who actually gets an item.

use crate::{
    error::Result,
    inventory::InventoryStore,
    types::{CatalogItem, ItemId},
};

/// Sanitized read-only catalog over the inventory
#[derive(Clone)]
pub struct CatalogReader {
    inventory: InventoryStore,
}

impl CatalogReader {
    /// Create a reader over an inventory store
    pub fn new(inventory: InventoryStore) -> Self {
        Self { inventory }
    }

    /// Sanitized view of one item
    pub fn get_item(&self, id: &ItemId) -> Result<CatalogItem> {
        Ok(CatalogItem::from(&self.inventory.get_item(id)?))
    }

    /// Sanitized view of one item, `None` if absent
    pub fn try_get_item(&self, id: &ItemId) -> Result<Option<CatalogItem>> {
        Ok(self
            .inventory
            .try_get_item(id)?
            .as_ref()
            .map(CatalogItem::from))
    }

    /// Sanitized views of all unclaimed items
    pub fn available_items(&self) -> Result<Vec<CatalogItem>> {
        Ok(self
            .inventory
            .available_items()?
            .iter()
            .map(CatalogItem::from)
            .collect())
    }
}
