//! Error types for the stores

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Store errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Inventory item not found
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Buyer account not found
    #[error("Buyer not found: {0}")]
    BuyerNotFound(String),

    /// Debit would overdraw the account
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds {
        /// Amount required by the debit
        needed: Decimal,
        /// Balance at the time the debit was attempted
        available: Decimal,
    },

    /// Ledger entry not found
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(String),

    /// Invariant violation (claimed-flag consistency, non-positive amount, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Persistent write contention (optimistic transaction retries exhausted)
    #[error("Write contention: {0}")]
    Contention(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
