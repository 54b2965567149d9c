//! Storefront simulation
//!
//! Seeds a catalog and a population of buyers, fires concurrent purchases at
//! overlapping item sets, then verifies the engine's invariants:
//! no double-sell, conservation of funds, no negative balances.

use anyhow::Result;
use checkout::{CheckoutEngine, Config, Error};
use inventory_core::{BuyerAccount, BuyerId, InventoryItem, ItemId};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing_subscriber::EnvFilter;

const ITEM_COUNT: usize = 40;
const BUYER_COUNT: usize = 12;
const ATTEMPTS_PER_BUYER: usize = 10;
const OPENING_BALANCE: Decimal = dec!(50.00);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = std::env::temp_dir().join(format!("storefront-sim-{}", uuid::Uuid::new_v4()));
    let mut config = Config::default();
    config.store.data_dir = data_dir.clone();

    let engine = Arc::new(CheckoutEngine::open(config)?);

    seed(&engine)?;
    let initial_total = total_balances(&engine)?;

    tracing::info!(
        items = ITEM_COUNT,
        buyers = BUYER_COUNT,
        "Simulation starting"
    );

    let mut handles = Vec::new();
    for b in 0..BUYER_COUNT {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            run_buyer(engine, BuyerId::new(format!("buyer-{:02}", b))).await
        }));
    }

    let mut purchased = 0usize;
    let mut lost_races = 0usize;
    let mut broke = 0usize;
    for handle in handles {
        let (p, l, b) = handle.await?;
        purchased += p;
        lost_races += l;
        broke += b;
    }

    verify(&engine, initial_total)?;

    println!("--- simulation summary ---");
    println!("items purchased:          {}", purchased);
    println!("claim races lost:         {}", lost_races);
    println!("insufficient funds:       {}", broke);
    println!(
        "claim conflicts (metric): {}",
        engine.metrics().claim_conflicts.get()
    );
    println!(
        "purchases (metric):       {}",
        engine.metrics().purchases.get()
    );
    println!("invariants verified: no double-sell, funds conserved");

    std::fs::remove_dir_all(&data_dir).ok();
    Ok(())
}

/// Seeding stands in for the out-of-scope catalog-management and
/// deposit-approval collaborators; both share the engine's stores.
fn seed(engine: &CheckoutEngine) -> Result<()> {
    let mut rng = rand::thread_rng();

    for i in 0..ITEM_COUNT {
        let cents: i64 = rng.gen_range(100..1500);
        engine.inventory().put_item(&InventoryItem::new(
            ItemId::new(format!("itm-{:03}", i)),
            Decimal::new(cents, 2),
            format!("record-{:03}", i),
        ))?;
    }
    for b in 0..BUYER_COUNT {
        engine.balances().create_account(&BuyerAccount::new(
            BuyerId::new(format!("buyer-{:02}", b)),
            OPENING_BALANCE,
        ))?;
    }
    Ok(())
}

async fn run_buyer(engine: Arc<CheckoutEngine>, buyer: BuyerId) -> (usize, usize, usize) {
    let mut purchased = 0;
    let mut lost = 0;
    let mut broke = 0;

    for _ in 0..ATTEMPTS_PER_BUYER {
        let target = {
            let mut rng = rand::thread_rng();
            ItemId::new(format!("itm-{:03}", rng.gen_range(0..ITEM_COUNT)))
        };

        match engine.purchase_one(&buyer, &target).await {
            Ok(receipt) => {
                purchased += 1;
                tracing::debug!(
                    buyer = %buyer,
                    item = %receipt.item.id,
                    balance = %receipt.new_balance,
                    "bought"
                );
            }
            Err(Error::AlreadySold(_)) => lost += 1,
            Err(Error::InsufficientFunds { .. }) => broke += 1,
            Err(e) => tracing::error!(buyer = %buyer, error = %e, "unexpected failure"),
        }

        let jitter = {
            let mut rng = rand::thread_rng();
            rng.gen_range(0..5)
        };
        sleep(Duration::from_millis(jitter)).await;
    }

    (purchased, lost, broke)
}

fn total_balances(engine: &CheckoutEngine) -> Result<Decimal> {
    let mut total = Decimal::ZERO;
    for b in 0..BUYER_COUNT {
        total += engine
            .balances()
            .balance(&BuyerId::new(format!("buyer-{:02}", b)))?;
    }
    Ok(total)
}

fn verify(engine: &CheckoutEngine, initial_total: Decimal) -> Result<()> {
    let items = engine.inventory().items()?;

    // No double-sell: every claimed item has exactly one owner and holds the
    // claimed-flag invariant
    let mut claimed_total = Decimal::ZERO;
    for item in &items {
        anyhow::ensure!(
            item.invariant_holds(),
            "item {} violates claimed/owner invariant",
            item.id
        );
        if item.claimed {
            claimed_total += item.price;
        }
    }

    // Conservation: what left the buyers' balances equals the price of what
    // they now own
    let final_total = total_balances(engine)?;
    let spent = initial_total - final_total;
    anyhow::ensure!(
        spent == claimed_total,
        "spent {} but claimed items are worth {}",
        spent,
        claimed_total
    );
    anyhow::ensure!(
        final_total >= Decimal::ZERO,
        "negative aggregate balance observed"
    );

    tracing::info!(%spent, %claimed_total, "funds conserved");
    Ok(())
}
