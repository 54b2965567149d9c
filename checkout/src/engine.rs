//! Claim coordinator
//!
//! Turns a buy request into a consistent state transition across three
//! entities: the inventory item, the buyer balance, and the ledger.
//!
//! # Settlement protocol
//!
//! 1. Pre-check item and balance (fast-fail only, never authoritative)
//! 2. Win the item through the store's conditional compare-and-set
//! 3. Debit the buyer by the *claimed* record's price
//! 4. On debit failure: release the claim (compensation), surface the error
//! 5. Append a ledger entry, best-effort after the debit
//!
//! The compare-and-set is the only mutual-exclusion mechanism; no in-process
//! lock is held across store calls. Once a claim is won the operation runs to
//! completion or compensates; it is never left claimed-but-unbilled.

use crate::{
    error::{Error, Result},
    metrics::Metrics,
    types::{BatchReceipt, Config, PurchaseReceipt, RefundReceipt},
};
use inventory_core::{
    round_minor_unit, BalanceStore, BuyerId, CatalogReader, EntryKind, InventoryItem,
    InventoryStore, ItemId, LedgerEntry, LedgerStore, Storage,
};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tokio::time::Duration;

/// The claim & settlement coordinator
pub struct CheckoutEngine {
    inventory: InventoryStore,
    balances: BalanceStore,
    ledger: LedgerStore,
    catalog: CatalogReader,
    metrics: Metrics,
    config: Config,
}

impl CheckoutEngine {
    /// Open the engine, creating the underlying store if needed
    pub fn open(config: Config) -> Result<Self> {
        let storage = Storage::open(&config.store).map_err(Error::Store)?;
        Self::with_storage(storage, config)
    }

    /// Build the engine over an already-open store
    pub fn with_storage(storage: Storage, config: Config) -> Result<Self> {
        let inventory = storage.inventory();
        let catalog = CatalogReader::new(inventory.clone());
        let metrics = Metrics::new()?;

        Ok(Self {
            inventory,
            balances: storage.balances(),
            ledger: storage.ledger(),
            catalog,
            metrics,
            config,
        })
    }

    /// Catalog reader for callers that need sanitized listings
    pub fn catalog(&self) -> &CatalogReader {
        &self.catalog
    }

    /// Inventory store, shared with the catalog-management collaborator
    pub fn inventory(&self) -> &InventoryStore {
        &self.inventory
    }

    /// Balance store, shared contract with the deposit-approval collaborator
    pub fn balances(&self) -> &BalanceStore {
        &self.balances
    }

    /// Ledger store for the reporting collaborator (reads only)
    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    /// Engine metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Purchase exactly one item for exactly one buyer, exactly once.
    ///
    /// Returns `AlreadySold` both when the pre-check sees a claimed item and
    /// when a concurrent buyer wins the claim race; the two are
    /// indistinguishable to the caller by design.
    pub async fn purchase_one(&self, buyer: &BuyerId, item_id: &ItemId) -> Result<PurchaseReceipt> {
        let _timer = self.metrics.settle_duration.start_timer();

        // Pre-checks, fast-fail UX only
        let preview = self.catalog.get_item(item_id)?;
        if preview.claimed {
            return Err(Error::AlreadySold(item_id.clone()));
        }
        let balance = self.balances.balance(buyer)?;
        if balance < preview.price {
            return Err(Error::InsufficientFunds {
                needed: preview.price,
                available: balance,
            });
        }

        // The sole serialization point
        let item = match self.inventory.claim(item_id, buyer)? {
            Some(item) => item,
            None => {
                self.metrics.claim_conflicts.inc();
                tracing::debug!(item_id = %item_id, buyer = %buyer, "Purchase lost claim race");
                return Err(Error::AlreadySold(item_id.clone()));
            }
        };

        // Debit the authoritative price from the claimed record, not the
        // pre-check read, so a concurrent price edit cannot be mischarged.
        let new_balance = match self.balances.debit(buyer, item.price) {
            Ok(balance) => balance,
            Err(cause) => {
                return Err(self
                    .compensate(buyer, std::slice::from_ref(item_id), cause)
                    .await)
            }
        };

        self.append_purchase_entry(buyer, &item);
        self.metrics.purchases.inc();

        tracing::info!(
            item_id = %item_id,
            buyer = %buyer,
            price = %item.price,
            new_balance = %new_balance,
            "Purchase settled"
        );

        Ok(PurchaseReceipt { item, new_balance })
    }

    /// Best-effort batch purchase: claim a set of items in one buyer action,
    /// charging only for items actually won.
    ///
    /// Items claimed by someone else between the pre-check and the attempt
    /// are skipped silently; the receipt's `items` is the won subset. A batch
    /// where every claim loses fails with `AllUnavailable` and mutates
    /// nothing.
    pub async fn purchase_batch(
        &self,
        buyer: &BuyerId,
        item_ids: &[ItemId],
    ) -> Result<BatchReceipt> {
        let _timer = self.metrics.settle_duration.start_timer();

        if item_ids.is_empty() {
            return Err(Error::InvalidRequest("empty item list".to_string()));
        }
        let mut seen = HashSet::new();
        for id in item_ids {
            if !seen.insert(id) {
                return Err(Error::InvalidRequest(format!("duplicate item {}", id)));
            }
        }

        // Upfront rejection: any already-claimed item fails the whole batch
        // before charging starts, a stricter policy than the per-item race
        // handling below.
        let mut precheck_total = Decimal::ZERO;
        for id in item_ids {
            let view = self.catalog.get_item(id)?;
            if view.claimed {
                return Err(Error::AlreadySold(id.clone()));
            }
            precheck_total += view.price;
        }

        let balance = self.balances.balance(buyer)?;
        if balance < precheck_total {
            return Err(Error::InsufficientFunds {
                needed: precheck_total,
                available: balance,
            });
        }

        // Sequential claims in caller-supplied order; losing a race skips
        // the item, it does not abort the batch.
        let mut won: Vec<InventoryItem> = Vec::with_capacity(item_ids.len());
        let mut total_charged = Decimal::ZERO;
        for id in item_ids {
            match self.inventory.claim(id, buyer) {
                Ok(Some(item)) => {
                    total_charged += item.price;
                    won.push(item);
                }
                Ok(None) => {
                    self.metrics.claim_conflicts.inc();
                    tracing::debug!(item_id = %id, buyer = %buyer, "Batch item lost claim race, skipped");
                }
                Err(cause) => {
                    // Store fault mid-batch: everything won so far must be
                    // handed back before surfacing the error.
                    let won_ids: Vec<ItemId> = won.iter().map(|i| i.id.clone()).collect();
                    return Err(self.compensate(buyer, &won_ids, cause).await);
                }
            }
        }

        if won.is_empty() {
            return Err(Error::AllUnavailable);
        }

        // One debit for the sum of authoritative prices of won items only
        let new_balance = match self.balances.debit(buyer, total_charged) {
            Ok(balance) => balance,
            Err(cause) => {
                let won_ids: Vec<ItemId> = won.iter().map(|i| i.id.clone()).collect();
                return Err(self.compensate(buyer, &won_ids, cause).await);
            }
        };

        // One ledger entry per won item, keeping the one-entry-per-item shape
        for item in &won {
            self.append_purchase_entry(buyer, item);
        }
        self.metrics.purchases.inc_by(won.len() as u64);

        tracing::info!(
            buyer = %buyer,
            requested = item_ids.len(),
            won = won.len(),
            total_charged = %total_charged,
            new_balance = %new_balance,
            "Batch purchase settled"
        );

        Ok(BatchReceipt {
            items: won,
            total_charged,
            new_balance,
        })
    }

    /// Administratively reverse a completed sale.
    ///
    /// The claimed-to-unclaimed reset is a conditional update just like the
    /// claim itself: of any number of concurrent refunds for one sale exactly
    /// one wins it, so the owner is credited exactly once.
    pub async fn refund(&self, item_id: &ItemId) -> Result<RefundReceipt> {
        let _timer = self.metrics.settle_duration.start_timer();

        // Pre-check, fast-fail UX only
        let preview = self.inventory.get_item(item_id)?;
        if !preview.claimed {
            return Err(Error::NotSold(item_id.clone()));
        }

        // The sole serialization point: losing the release race means
        // another refund of this sale already credited the owner.
        let prior = match self.inventory.release(item_id)? {
            Some(prior) => prior,
            None => return Err(Error::NotSold(item_id.clone())),
        };
        let owner = prior.owner.clone().ok_or_else(|| {
            Error::Store(inventory_core::Error::InvariantViolation(format!(
                "claimed item {} has no owner",
                item_id
            )))
        })?;

        let refund_amount = round_minor_unit(prior.price);

        // The item is already back on sale; a failed credit leaves the owner
        // owed money and goes to reconciliation.
        let new_balance = match self.balances.credit(&owner, refund_amount) {
            Ok(balance) => balance,
            Err(cause) => {
                tracing::error!(
                    item_id = %item_id,
                    owner = %owner,
                    amount = %refund_amount,
                    error = %cause,
                    "RECONCILIATION: item released but refund credit failed"
                );
                return Err(Error::SettlementFailed(format!(
                    "item {} released but owner not credited: {}",
                    item_id, cause
                )));
            }
        };

        // Ledger is reporting-only; a failed append does not void the refund
        let entry = LedgerEntry::completed(
            owner.clone(),
            EntryKind::Refund,
            refund_amount,
            format!("Refund for item {}", item_id),
        );
        if let Err(e) = self.ledger.append(&entry) {
            self.metrics.ledger_append_failures.inc();
            tracing::error!(
                item_id = %item_id,
                buyer = %owner,
                amount = %refund_amount,
                error = %e,
                "RECONCILIATION: refund ledger append failed"
            );
        }

        self.metrics.refunds.inc();

        tracing::info!(
            item_id = %item_id,
            owner = %owner,
            refund_amount = %refund_amount,
            new_balance = %new_balance,
            "Refund settled"
        );

        Ok(RefundReceipt {
            item_id: item_id.clone(),
            refund_amount,
            new_balance,
        })
    }

    /// Release every won item after a failed debit, then translate the cause
    /// into the caller-facing error.
    ///
    /// Insufficient funds at the authoritative debit (a concurrent purchase
    /// drained the balance after the pre-check) stays `InsufficientFunds`;
    /// anything else is a durability hiccup and surfaces as
    /// `SettlementFailed`.
    async fn compensate(
        &self,
        buyer: &BuyerId,
        won: &[ItemId],
        cause: inventory_core::Error,
    ) -> Error {
        self.metrics.compensations.inc();
        tracing::warn!(
            buyer = %buyer,
            won_items = won.len(),
            cause = %cause,
            "Debit failed after claim, releasing won items"
        );

        for id in won {
            if let Err(e) = self.release_with_retry(id).await {
                // Escalation point: the claim is charged to nobody and must
                // be handed back by an operator.
                tracing::error!(
                    item_id = %id,
                    buyer = %buyer,
                    error = %e,
                    "RECONCILIATION: failed to release claimed item after debit failure"
                );
            }
        }

        match cause {
            inventory_core::Error::InsufficientFunds { needed, available } => {
                Error::InsufficientFunds { needed, available }
            }
            other => Error::SettlementFailed(other.to_string()),
        }
    }

    /// Retry a claim release with linear backoff until it succeeds or the
    /// attempt limit is reached.
    async fn release_with_retry(&self, item_id: &ItemId) -> inventory_core::Result<()> {
        let mut last_err = None;
        for attempt in 1..=self.config.max_release_attempts {
            match self.inventory.release(item_id) {
                Ok(_) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        item_id = %item_id,
                        attempt,
                        error = %e,
                        "Claim release failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(
                        self.config.release_backoff_ms * attempt as u64,
                    ))
                    .await;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            inventory_core::Error::Contention(format!("release of {} never attempted", item_id))
        }))
    }

    /// Append the per-item purchase entry; failures are logged for
    /// reconciliation, never propagated (the debit already settled).
    fn append_purchase_entry(&self, buyer: &BuyerId, item: &InventoryItem) {
        let entry = LedgerEntry::completed(
            buyer.clone(),
            EntryKind::Purchase,
            item.price,
            format!("Purchased item {}", item.id),
        );
        if let Err(e) = self.ledger.append(&entry) {
            self.metrics.ledger_append_failures.inc();
            tracing::error!(
                item_id = %item.id,
                buyer = %buyer,
                amount = %item.price,
                error = %e,
                "RECONCILIATION: purchase ledger append failed"
            );
        }
    }
}
