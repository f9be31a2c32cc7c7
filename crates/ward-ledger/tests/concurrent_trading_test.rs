//! Concurrency tests for the trading protocol.
//!
//! Many threads hammer one ledger; the totals must match what the ledger
//! actually had to give, no matter how the calls interleave.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::thread;

use ward_ledger::{CostTable, Ledger, ResourceType, TradeOutcome};

const X: ResourceType = ResourceType::Syringe;

// ============================================================================
// Sell
// ============================================================================

#[test]
fn concurrent_sells_never_oversell() {
    const THREADS: usize = 4;
    const CALLS: usize = 20_000;
    const INITIAL: u32 = 500;
    const PRODUCED: u32 = 3_000;

    let costs = CostTable::default();
    let price = costs.unit_cost(X);
    let ledger = Arc::new(Ledger::with_funds(0, [X]));
    ledger.restock(X, INITIAL).unwrap();

    let successes = Arc::new(AtomicU64::new(0));
    let produced_all = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::new();

    for _ in 0..THREADS {
        let ledger = Arc::clone(&ledger);
        let successes = Arc::clone(&successes);
        let produced_all = Arc::clone(&produced_all);
        handles.push(thread::spawn(move || {
            let mut local = 0u64;
            let mut calls = 0;
            loop {
                if ledger.sell(X, 1, price).is_filled() {
                    local += 1;
                }
                calls += 1;
                // Once production is over, an empty shelf stays empty.
                if calls >= CALLS
                    && produced_all.load(Ordering::Acquire)
                    && ledger.snapshot().quantity(X) == 0
                {
                    break;
                }
            }
            successes.fetch_add(local, Ordering::Relaxed);
        }));
    }

    let producer = {
        let ledger = Arc::clone(&ledger);
        let produced_all = Arc::clone(&produced_all);
        thread::spawn(move || {
            for _ in 0..PRODUCED {
                ledger.restock(X, 1).unwrap();
            }
            produced_all.store(true, Ordering::Release);
        })
    };

    producer.join().unwrap();
    for handle in handles {
        handle.join().unwrap();
    }

    let sold = successes.load(Ordering::Relaxed);
    assert_eq!(sold, u64::from(INITIAL + PRODUCED));
    assert_eq!(ledger.snapshot().quantity(X), 0);
    assert_eq!(ledger.funds(), price * i64::try_from(sold).unwrap());
}

#[test]
fn concurrent_sells_with_ample_stock_sell_exactly_the_stock() {
    const THREADS: usize = 4;
    const CALLS: usize = 20_000;
    const INITIAL: u32 = 10_000;

    let ledger = Arc::new(Ledger::with_funds(0, [X]));
    ledger.restock(X, INITIAL).unwrap();
    let successes = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let successes = Arc::clone(&successes);
            thread::spawn(move || {
                for _ in 0..CALLS {
                    if ledger.sell(X, 1, 3).is_filled() {
                        successes.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(successes.load(Ordering::Relaxed), u64::from(INITIAL));
    assert_eq!(ledger.snapshot().quantity(X), 0);
    assert_eq!(ledger.funds(), 3 * i64::from(INITIAL));
}

// ============================================================================
// Buy / sell mix
// ============================================================================

#[test]
fn concurrent_buys_and_sells_conserve_money() {
    const THREADS: usize = 2;
    const CALLS: usize = 5_000;
    const INITIAL_FUNDS: i64 = 20_000;
    const CAPACITY: u32 = 10;
    const BILL: i64 = 20;
    const LABOR: i64 = 5;

    // extra = occupied slots
    let ledger = Arc::new(Ledger::new(INITIAL_FUNDS, [X], 0u32));
    let paid_in = Arc::new(AtomicI64::new(0));
    let earned = Arc::new(AtomicI64::new(0));
    let labor_paid = Arc::new(AtomicI64::new(0));

    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let buy_ledger = Arc::clone(&ledger);
        let paid_in = Arc::clone(&paid_in);
        let labor_paid = Arc::clone(&labor_paid);
        handles.push(thread::spawn(move || {
            for _ in 0..CALLS {
                let outcome = buy_ledger.buy_with(
                    X,
                    1,
                    BILL,
                    LABOR,
                    |used, qty| {
                        if used + qty > CAPACITY {
                            Err(ward_ledger::DeclineReason::CapacityExceeded)
                        } else {
                            Ok(())
                        }
                    },
                    |used, qty| *used += qty,
                );
                if let TradeOutcome::Filled { amount } = outcome {
                    paid_in.fetch_add(amount, Ordering::Relaxed);
                    labor_paid.fetch_add(LABOR, Ordering::Relaxed);
                }
            }
        }));

        let sell_ledger = Arc::clone(&ledger);
        let earned = Arc::clone(&earned);
        handles.push(thread::spawn(move || {
            for _ in 0..CALLS {
                let outcome = sell_ledger.sell_with(X, 1, BILL, |used, qty| *used -= qty);
                earned.fetch_add(outcome.amount(), Ordering::Relaxed);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let funds = ledger.funds();
    let occupied = ledger.read(|s| s.extra);
    let on_hand = ledger.snapshot().quantity(X);

    assert!(occupied <= CAPACITY);
    assert_eq!(occupied, on_hand);
    assert!(funds >= 0);
    assert_eq!(
        funds + paid_in.load(Ordering::Relaxed) + labor_paid.load(Ordering::Relaxed)
            - earned.load(Ordering::Relaxed),
        INITIAL_FUNDS
    );
}
