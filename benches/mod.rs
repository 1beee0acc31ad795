//! Criterion benchmarks for the matching hot paths.

use criterion::{Criterion, criterion_group, criterion_main};
use matchbook_rs::prelude::*;
use std::hint::black_box;

/// A book seeded with `levels` prices per side, `orders_per_level` each.
fn seeded_engine(levels: i64, orders_per_level: u64) -> (MatchingEngine, u64) {
    let mut engine = MatchingEngine::new();
    let mut id = 0u64;
    for level in 0..levels {
        for _ in 0..orders_per_level {
            id += 1;
            engine.submit(Order::limit(id, Side::Buy, 99 - level, 10));
            id += 1;
            engine.submit(Order::limit(id, Side::Sell, 101 + level, 10));
        }
    }
    (engine, id)
}

fn bench_add_resting(c: &mut Criterion) {
    c.bench_function("add_resting_order", |b| {
        let (mut engine, seed_count) = seeded_engine(16, 4);
        let mut id = seed_count;
        b.iter(|| {
            id += 1;
            black_box(engine.submit(Order::limit(id, Side::Buy, 90 - (id % 8) as i64, 10)));
        });
    });
}

fn bench_aggressive_walk(c: &mut Criterion) {
    c.bench_function("aggressive_buy_through_three_levels", |b| {
        b.iter_batched(
            || seeded_engine(8, 4).0,
            |mut engine| {
                black_box(engine.submit(Order::limit(1_000_000, Side::Buy, 103, 100)));
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_cancel(c: &mut Criterion) {
    c.bench_function("submit_then_cancel", |b| {
        let mut engine = MatchingEngine::new();
        let mut id = 0u64;
        b.iter(|| {
            id += 1;
            engine.submit(Order::limit(id, Side::Buy, 90, 10));
            black_box(engine.cancel(id));
        });
    });
}

fn bench_batch_sharded(c: &mut Criterion) {
    c.bench_function("sharded_batch_4x1000", |b| {
        b.iter_batched(
            || {
                let engine = ConcurrentEngine::with_shards(4);
                engine.set_risk_checks_enabled(false);
                let orders: Vec<Order> = (0..1_000u64)
                    .map(|i| {
                        let side = if i % 2 == 0 { Side::Sell } else { Side::Buy };
                        Order::limit(i + 1, side, 100, 5).with_client(i % 4 + 1)
                    })
                    .collect();
                (engine, orders)
            },
            |(engine, orders)| {
                black_box(engine.submit_batch(orders));
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_add_resting,
    bench_aggressive_walk,
    bench_cancel,
    bench_batch_sharded
);
criterion_main!(benches);
