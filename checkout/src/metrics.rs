//! Metrics collection for observability
//!
//! Prometheus metrics for the claim coordinator.
//!
//! # Metrics
//!
//! - `checkout_purchases_total` - Items successfully purchased
//! - `checkout_refunds_total` - Items refunded
//! - `checkout_claim_conflicts_total` - Claim attempts lost to a concurrent buyer
//! - `checkout_compensations_total` - Won claims released after a debit failure
//! - `checkout_ledger_append_failures_total` - Ledger writes deferred to reconciliation
//! - `checkout_settle_duration_seconds` - Histogram of settlement latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Items successfully purchased
    pub purchases: IntCounter,

    /// Items refunded
    pub refunds: IntCounter,

    /// Claim attempts lost to a concurrent buyer (benign)
    pub claim_conflicts: IntCounter,

    /// Won claims released after a debit failure
    pub compensations: IntCounter,

    /// Ledger appends that failed and were logged for reconciliation
    pub ledger_append_failures: IntCounter,

    /// Settlement latency histogram
    pub settle_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let purchases = IntCounter::new(
            "checkout_purchases_total",
            "Items successfully purchased",
        )?;
        registry.register(Box::new(purchases.clone()))?;

        let refunds = IntCounter::new("checkout_refunds_total", "Items refunded")?;
        registry.register(Box::new(refunds.clone()))?;

        let claim_conflicts = IntCounter::new(
            "checkout_claim_conflicts_total",
            "Claim attempts lost to a concurrent buyer",
        )?;
        registry.register(Box::new(claim_conflicts.clone()))?;

        let compensations = IntCounter::new(
            "checkout_compensations_total",
            "Won claims released after a debit failure",
        )?;
        registry.register(Box::new(compensations.clone()))?;

        let ledger_append_failures = IntCounter::new(
            "checkout_ledger_append_failures_total",
            "Ledger writes deferred to reconciliation",
        )?;
        registry.register(Box::new(ledger_append_failures.clone()))?;

        let settle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "checkout_settle_duration_seconds",
                "Histogram of settlement latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(settle_duration.clone()))?;

        Ok(Self {
            purchases,
            refunds,
            claim_conflicts,
            compensations,
            ledger_append_failures,
            settle_duration,
            registry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.purchases.inc();
        metrics.claim_conflicts.inc();
        assert_eq!(metrics.purchases.get(), 1);
        assert_eq!(metrics.claim_conflicts.get(), 1);
    }

    #[test]
    fn test_independent_registries() {
        // Two engines in one process must not collide on registration
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.purchases.inc();
        assert_eq!(b.purchases.get(), 0);
    }
}
