//! Criterion benchmarks for veledger-escrow hot paths.
//!
//! Covers: historical lookup, checkpoint planning, and supply extrapolation
//! across many distinct expiry boundaries.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use veledger_core::constants::{EPOCH, TOKEN};
use veledger_core::types::{AccountId, Point};
use veledger_escrow::{Engine, PointHistory};

const T0: u64 = 3_000 * EPOCH;

fn account(i: u64) -> AccountId {
    AccountId::from_label(&format!("account-{i}"))
}

/// Engine with `n` locks spread over the first 200 epochs.
fn populated_engine(n: u64) -> Engine {
    let mut rng = StdRng::seed_from_u64(7);
    let mut engine = Engine::default();
    for i in 0..n {
        let weeks = rng.gen_range(2..200u64);
        let amount = rng.gen_range(1..10_000u128) * TOKEN;
        engine
            .create_lock(account(i), amount, T0 + weeks * EPOCH, T0 + i, i + 1)
            .unwrap();
    }
    engine
}

fn bench_find_by_block(c: &mut Criterion) {
    let mut history = PointHistory::new();
    for i in 1..=100_000u64 {
        let point = Point { bias: i as i128, slope: -1, timestamp: i * 12, block: i };
        history.append(point).unwrap();
    }

    c.bench_function("find_by_block_100k", |b| {
        b.iter(|| history.find_by_block(black_box(73_421)))
    });
}

fn bench_plan_create_lock(c: &mut Criterion) {
    let engine = populated_engine(10_000);
    let now = T0 + 20_000;
    let who = AccountId::from_label("newcomer");

    c.bench_function("plan_create_lock_10k_accounts", |b| {
        b.iter(|| {
            engine.plan_create_lock(
                black_box(who),
                black_box(500 * TOKEN),
                black_box(now + 52 * EPOCH),
                now,
                20_000,
            )
        })
    });
}

fn bench_total_supply(c: &mut Criterion) {
    let engine = populated_engine(10_000);
    // Crosses every scheduled boundary since the last checkpoint.
    let target = T0 + 150 * EPOCH;

    c.bench_function("total_supply_150_epochs_ahead", |b| {
        b.iter(|| engine.total_supply(black_box(target)))
    });
}

criterion_group!(
    benches,
    bench_find_by_block,
    bench_plan_create_lock,
    bench_total_supply,
);
criterion_main!(benches);
