//! Error taxonomy for the claim coordinator
//!
//! Every variant except `Store` is an expected business outcome surfaced
//! directly to the caller; the engine never retries them. `AlreadySold` and
//! `AllUnavailable` are the normal result of benign races and are not faults.
//! `SettlementFailed` means a compensation ran after a won claim.

use inventory_core::ItemId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coordinator errors
#[derive(Error, Debug)]
pub enum Error {
    /// Item or buyer does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Item already claimed, either at pre-check or by losing the claim race
    #[error("Item already sold: {0}")]
    AlreadySold(ItemId),

    /// Every item in a batch was claimed by someone else before any claim won
    #[error("All requested items are unavailable")]
    AllUnavailable,

    /// Balance below the required amount
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds {
        /// Amount the operation required
        needed: Decimal,
        /// Balance observed when the operation was rejected
        available: Decimal,
    },

    /// Empty or malformed request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Refund target is not currently sold
    #[error("Item not sold: {0}")]
    NotSold(ItemId),

    /// A won claim was compensated (released) after a downstream failure
    #[error("Settlement failed, claim released: {0}")]
    SettlementFailed(String),

    /// Store fault before any claim was won (no side effects)
    #[error("Store error: {0}")]
    Store(inventory_core::Error),

    /// Metrics registration failed during engine construction
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl From<inventory_core::Error> for Error {
    fn from(err: inventory_core::Error) -> Self {
        match err {
            inventory_core::Error::ItemNotFound(id) => Error::NotFound(format!("item {}", id)),
            inventory_core::Error::BuyerNotFound(id) => Error::NotFound(format!("buyer {}", id)),
            inventory_core::Error::InsufficientFunds { needed, available } => {
                Error::InsufficientFunds { needed, available }
            }
            other => Error::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_store_error_mapping() {
        let err: Error = inventory_core::Error::ItemNotFound("itm-1".into()).into();
        assert!(matches!(err, Error::NotFound(_)));

        let err: Error = inventory_core::Error::InsufficientFunds {
            needed: dec!(7.00),
            available: dec!(5.00),
        }
        .into();
        assert!(matches!(err, Error::InsufficientFunds { .. }));

        let err: Error = inventory_core::Error::Storage("disk".into()).into();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn test_stable_messages() {
        assert_eq!(
            Error::AlreadySold(ItemId::new("itm-1")).to_string(),
            "Item already sold: itm-1"
        );
        assert_eq!(
            Error::AllUnavailable.to_string(),
            "All requested items are unavailable"
        );
        assert_eq!(
            Error::NotSold(ItemId::new("itm-1")).to_string(),
            "Item not sold: itm-1"
        );
    }
}
