//! Balance Store
//!
//! Durable per-buyer prepaid balance. Debit and credit are atomic
//! store-level transactions so a purchase and a deposit approval racing on
//! the same buyer can never lose an update, and the no-overdraft invariant
//! is enforced at the authoritative write, not at a pre-check.

use crate::{
    error::{Error, Result},
    storage::{cf_handle, is_commit_conflict, CF_BALANCES},
    types::{BuyerAccount, BuyerId},
};
use rocksdb::OptimisticTransactionDB;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Balance store view over the shared database
#[derive(Clone)]
pub struct BalanceStore {
    db: Arc<OptimisticTransactionDB>,
    max_txn_retries: u32,
}

impl BalanceStore {
    pub(crate) fn new(db: Arc<OptimisticTransactionDB>, max_txn_retries: u32) -> Self {
        Self {
            db,
            max_txn_retries,
        }
    }

    /// Create or reset an account with an opening balance
    pub fn create_account(&self, account: &BuyerAccount) -> Result<()> {
        if account.balance < Decimal::ZERO {
            return Err(Error::InvariantViolation(format!(
                "account {} opened with negative balance",
                account.id
            )));
        }

        let cf = cf_handle(&self.db, CF_BALANCES)?;
        let value = bincode::serialize(account)?;
        self.db.put_cf(cf, account.id.as_bytes(), value)?;
        Ok(())
    }

    /// Get account by buyer ID
    pub fn get_account(&self, id: &BuyerId) -> Result<BuyerAccount> {
        let cf = cf_handle(&self.db, CF_BALANCES)?;
        let value = self
            .db
            .get_cf(cf, id.as_bytes())?
            .ok_or_else(|| Error::BuyerNotFound(id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Current balance for a buyer
    pub fn balance(&self, id: &BuyerId) -> Result<Decimal> {
        Ok(self.get_account(id)?.balance)
    }

    /// Atomically debit the buyer's balance, rejecting overdraft.
    ///
    /// Returns the new balance. Fails with `InsufficientFunds` when the
    /// balance at the time of the authoritative write is below `amount`.
    pub fn debit(&self, id: &BuyerId, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvariantViolation(format!(
                "debit amount must be positive, got {}",
                amount
            )));
        }

        self.mutate(id, |balance| {
            if balance < amount {
                Err(Error::InsufficientFunds {
                    needed: amount,
                    available: balance,
                })
            } else {
                Ok(balance - amount)
            }
        })
    }

    /// Atomically credit the buyer's balance.
    ///
    /// Shared contract: refunds and the external deposit-approval
    /// collaborator both go through this path.
    pub fn credit(&self, id: &BuyerId, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvariantViolation(format!(
                "credit amount must be positive, got {}",
                amount
            )));
        }

        self.mutate(id, |balance| Ok(balance + amount))
    }

    /// Read-modify-write inside one optimistic transaction, retried on
    /// commit conflicts up to the configured attempt limit.
    fn mutate(&self, id: &BuyerId, f: impl Fn(Decimal) -> Result<Decimal>) -> Result<Decimal> {
        let cf = cf_handle(&self.db, CF_BALANCES)?;

        let mut attempts = 0u32;
        loop {
            let txn = self.db.transaction();
            let value = txn
                .get_for_update_cf(cf, id.as_bytes(), true)?
                .ok_or_else(|| Error::BuyerNotFound(id.to_string()))?;

            let mut account: BuyerAccount = bincode::deserialize(&value)?;
            account.balance = f(account.balance)?;

            txn.put_cf(cf, id.as_bytes(), bincode::serialize(&account)?)?;

            match txn.commit() {
                Ok(()) => return Ok(account.balance),
                Err(e) if is_commit_conflict(&e) && attempts < self.max_txn_retries => {
                    attempts += 1;
                }
                Err(e) if is_commit_conflict(&e) => {
                    return Err(Error::Contention(format!(
                        "balance write for {} exceeded {} attempts",
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

    fn test_store() -> (BalanceStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let storage = Storage::open(&config).unwrap();
        (storage.balances(), temp_dir)
    }

    fn buyer(id: &str) -> BuyerId {
        BuyerId::new(id)
    }

    #[test]
    fn test_create_and_get_account() {
        let (store, _temp) = test_store();
        store
            .create_account(&BuyerAccount::new(buyer("b1"), dec!(10.00)))
            .unwrap();

        assert_eq!(store.balance(&buyer("b1")).unwrap(), dec!(10.00));
    }

    #[test]
    fn test_missing_account() {
        let (store, _temp) = test_store();
        let result = store.balance(&buyer("missing"));
        assert!(matches!(result, Err(Error::BuyerNotFound(_))));
    }

    #[test]
    fn test_negative_opening_balance_rejected() {
        let (store, _temp) = test_store();
        let result = store.create_account(&BuyerAccount::new(buyer("b1"), dec!(-1.00)));
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_debit_and_credit() {
        let (store, _temp) = test_store();
        store
            .create_account(&BuyerAccount::new(buyer("b1"), dec!(10.00)))
            .unwrap();

        let new_balance = store.debit(&buyer("b1"), dec!(7.00)).unwrap();
        assert_eq!(new_balance, dec!(3.00));

        let new_balance = store.credit(&buyer("b1"), dec!(7.00)).unwrap();
        assert_eq!(new_balance, dec!(10.00));
    }

    #[test]
    fn test_debit_rejects_overdraft() {
        let (store, _temp) = test_store();
        store
            .create_account(&BuyerAccount::new(buyer("b1"), dec!(5.00)))
            .unwrap();

        let result = store.debit(&buyer("b1"), dec!(7.00));
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));

        // Balance untouched
        assert_eq!(store.balance(&buyer("b1")).unwrap(), dec!(5.00));
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let (store, _temp) = test_store();
        store
            .create_account(&BuyerAccount::new(buyer("b1"), dec!(5.00)))
            .unwrap();

        assert!(store.debit(&buyer("b1"), dec!(0.00)).is_err());
        assert!(store.credit(&buyer("b1"), dec!(-1.00)).is_err());
    }

    #[test]
    fn test_concurrent_mutations_no_lost_updates() {
        let (store, _temp) = test_store();
        store
            .create_account(&BuyerAccount::new(buyer("b1"), dec!(100.00)))
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                store.debit(&buyer("b1"), dec!(1.00)).unwrap();
                store.credit(&buyer("b1"), dec!(0.50)).unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // 8 * (-1.00 + 0.50) = -4.00
        assert_eq!(store.balance(&buyer("b1")).unwrap(), dec!(96.00));
    }

    #[test]
    fn test_concurrent_debits_never_overdraw() {
        let (store, _temp) = test_store();
        store
            .create_account(&BuyerAccount::new(buyer("b1"), dec!(10.00)))
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                store.debit(&buyer("b1"), dec!(3.00)).is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        // 3 debits of 3.00 fit into 10.00, never more
        assert_eq!(successes, 3);
        assert_eq!(store.balance(&buyer("b1")).unwrap(), dec!(1.00));
        assert!(store.balance(&buyer("b1")).unwrap() >= Decimal::ZERO);
    }
}
