//! VendKit Inventory Core
//!
//! Durable stores for a digital-goods storefront: inventory items sold
//! exactly once, per-buyer prepaid balances, and an append-only ledger of
//! balance-affecting events.
//!
//! # Architecture
//!
//! - **Single database**: one RocksDB opened in optimistic-transaction mode,
//!   one column family per store
//! - **Store-level atomicity**: the claim compare-and-set and the balance
//!   debit/credit are single indivisible transactions; no application-level
//!   read-then-write
//! - **Append-only ledger**: entries are written once, never mutated
//!
//! # Invariants
//!
//! - An item is owned by at most one buyer at a time
//! - `claimed == false` implies no owner and no claim timestamp
//! - Balances are never negative at any observable point
//! - Ledger entries carry positive amounts and are immutable

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod balance;
pub mod catalog;
pub mod config;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod storage;
pub mod types;

// Re-exports
pub use balance::BalanceStore;
pub use catalog::CatalogReader;
pub use config::Config;
pub use error::{Error, Result};
pub use inventory::InventoryStore;
pub use ledger::LedgerStore;
pub use storage::Storage;
pub use types::{
    round_minor_unit, BuyerAccount, BuyerId, CatalogItem, EntryKind, EntryStatus, InventoryItem,
    ItemId, LedgerEntry,
};
