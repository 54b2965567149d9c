//! Core types for the storefront stores
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Inventory item identifier (opaque)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Create new item ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key bytes for storage
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Buyer identifier (opaque)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuyerId(String);

impl BuyerId {
    /// Create new buyer ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key bytes for storage
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for BuyerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Round a monetary amount to the currency's minor unit (two decimals),
/// half away from zero. Used for refund credits so repeated
/// purchase/refund cycles cannot accumulate drift.
pub fn round_minor_unit(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A sellable digital record. Sold to exactly one buyer, exactly once;
/// a refund returns it to the unclaimed pool.
///
/// Invariant: `claimed == false` implies `owner` and `claimed_at` are absent;
/// `claimed == true` implies `owner` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Item ID
    pub id: ItemId,

    /// Sale price (two-decimal currency unit)
    pub price: Decimal,

    /// The digital record itself. Only revealed through a successful
    /// purchase, never through catalog views.
    pub payload: String,

    /// Whether the item has been sold
    pub claimed: bool,

    /// Owning buyer, present only when claimed
    pub owner: Option<BuyerId>,

    /// Claim timestamp, present only when claimed
    pub claimed_at: Option<DateTime<Utc>>,
}

impl InventoryItem {
    /// Create a new unclaimed item
    pub fn new(id: ItemId, price: Decimal, payload: impl Into<String>) -> Self {
        Self {
            id,
            price,
            payload: payload.into(),
            claimed: false,
            owner: None,
            claimed_at: None,
        }
    }

    /// Check the claimed-flag/owner invariant
    pub fn invariant_holds(&self) -> bool {
        if self.claimed {
            self.owner.is_some()
        } else {
            self.owner.is_none() && self.claimed_at.is_none()
        }
    }
}

/// Sanitized catalog view of an item. Never carries the payload or the
/// owning buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Item ID
    pub id: ItemId,

    /// Sale price
    pub price: Decimal,

    /// Whether the item has been sold
    pub claimed: bool,
}

impl From<&InventoryItem> for CatalogItem {
    fn from(item: &InventoryItem) -> Self {
        Self {
            id: item.id.clone(),
            price: item.price,
            claimed: item.claimed,
        }
    }
}

/// Per-buyer prepaid account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerAccount {
    /// Buyer ID
    pub id: BuyerId,

    /// Current balance. Never negative at any observable point.
    pub balance: Decimal,
}

impl BuyerAccount {
    /// Create account with an opening balance
    pub fn new(id: BuyerId, balance: Decimal) -> Self {
        Self { id, balance }
    }
}

/// Kind of balance-affecting event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryKind {
    /// Item purchase (debit)
    Purchase = 1,
    /// Sale reversal (credit)
    Refund = 2,
    /// Approved deposit (credit, written by the deposit collaborator)
    Deposit = 3,
    /// Back-office adjustment
    Adjustment = 4,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryKind::Purchase => "purchase",
            EntryKind::Refund => "refund",
            EntryKind::Deposit => "deposit",
            EntryKind::Adjustment => "adjustment",
        };
        write!(f, "{}", s)
    }
}

/// Ledger entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryStatus {
    /// Settled entry (everything the engine writes)
    Completed = 1,
    /// Awaiting external approval (deposit collaborator only)
    Pending = 2,
}

/// Immutable record of one balance-affecting event.
///
/// One entry per settled purchase-of-one-item or refund-of-one-item.
/// Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry ID (UUIDv7 for time-ordering)
    pub entry_id: Uuid,

    /// Buyer the entry is attributed to
    pub buyer: BuyerId,

    /// Event kind
    pub kind: EntryKind,

    /// Amount (always positive; direction is implied by `kind`)
    pub amount: Decimal,

    /// Human-readable description
    pub description: String,

    /// Entry status
    pub status: EntryStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a completed entry with a fresh time-ordered ID
    pub fn completed(
        buyer: BuyerId,
        kind: EntryKind,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::now_v7(),
            buyer,
            kind,
            amount,
            description: description.into(),
            status: EntryStatus::Completed,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_item_invariant() {
        let mut item = InventoryItem::new(ItemId::new("itm-1"), dec!(7.00), "record");
        assert!(item.invariant_holds());

        item.claimed = true;
        assert!(!item.invariant_holds());

        item.owner = Some(BuyerId::new("buyer-1"));
        item.claimed_at = Some(Utc::now());
        assert!(item.invariant_holds());
    }

    #[test]
    fn test_catalog_view_hides_payload() {
        let item = InventoryItem::new(ItemId::new("itm-1"), dec!(7.00), "secret");
        let view = CatalogItem::from(&item);
        assert_eq!(view.id, item.id);
        assert_eq!(view.price, dec!(7.00));
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_round_minor_unit_half_away_from_zero() {
        assert_eq!(round_minor_unit(dec!(1.005)), dec!(1.01));
        assert_eq!(round_minor_unit(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round_minor_unit(dec!(7.00)), dec!(7.00));
        assert_eq!(round_minor_unit(dec!(2.344)), dec!(2.34));
    }

    #[test]
    fn test_ledger_entry_ids_time_ordered() {
        let a = LedgerEntry::completed(
            BuyerId::new("b"),
            EntryKind::Purchase,
            dec!(1.00),
            "first",
        );
        // UUIDv7 ordering is only guaranteed across millisecond boundaries
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = LedgerEntry::completed(
            BuyerId::new("b"),
            EntryKind::Purchase,
            dec!(1.00),
            "second",
        );
        assert!(a.entry_id < b.entry_id);
    }
}
