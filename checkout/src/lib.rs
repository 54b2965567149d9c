//! VendKit Checkout
//!
//! Claim & settlement coordinator for the digital-goods storefront. Turns a
//! buy request into a guaranteed-consistent transition across the inventory
//! item, the buyer's prepaid balance, and the append-only ledger, under
//! concurrent access from many simultaneous buyers.
//!
//! # Guarantees
//!
//! - **No double-sell**: at most one buyer wins any item's claim
//! - **Debit matches claim**: buyers are charged the authoritative price of
//!   items they actually won, never a stale pre-check price
//! - **No overdraft**: balances are never observably negative
//! - **Compensated failure**: a won claim whose debit fails is released, not
//!   left claimed-but-unbilled
//! - **No double-refund**: of concurrent refunds for one sale, exactly one
//!   credits the owner

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod engine;
pub mod error;
pub mod metrics;
pub mod types;

// Re-exports
pub use engine::CheckoutEngine;
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use types::{BatchReceipt, Config, PurchaseReceipt, RefundReceipt};
