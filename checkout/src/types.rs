//! Receipts and configuration for the claim coordinator

use inventory_core::{InventoryItem, ItemId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of a successful single-item purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    /// The claimed item, full payload included
    pub item: InventoryItem,

    /// Buyer balance after the debit
    pub new_balance: Decimal,
}

/// Result of a successful batch purchase.
///
/// `items` can be smaller than the requested list: items lost to concurrent
/// claimers are skipped, not errors. Only won items are charged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReceipt {
    /// Items actually won, in attempt order
    pub items: Vec<InventoryItem>,

    /// Sum of the won items' authoritative prices
    pub total_charged: Decimal,

    /// Buyer balance after the debit
    pub new_balance: Decimal,
}

/// Result of a refund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundReceipt {
    /// The refunded item
    pub item_id: ItemId,

    /// Amount credited back to the original owner
    pub refund_amount: Decimal,

    /// Owner balance after the credit
    pub new_balance: Decimal,
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Store configuration
    pub store: inventory_core::Config,

    /// Compensation (claim release) retry limit before escalation
    pub max_release_attempts: u32,

    /// Base backoff between compensation retries (milliseconds)
    pub release_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: inventory_core::Config::default(),
            max_release_attempts: 5,
            release_backoff_ms: 20,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Store(inventory_core::Error::Io(e)))?;
        toml::from_str(&content).map_err(|e| {
            crate::Error::Store(inventory_core::Error::Config(format!(
                "Failed to parse config: {}",
                e
            )))
        })
    }
}
