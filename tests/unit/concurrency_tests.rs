//! Sharded and async-callback front-end behaviour under real threads.

use matchbook_rs::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[test]
fn sharded_batch_counts_aggregate_across_shards() {
    let engine = ConcurrentEngine::with_shards(4);
    engine.set_risk_checks_enabled(false);

    // 4 clients, each with a self-contained matching flow on one shard.
    let mut orders = Vec::new();
    let mut id = 0u64;
    for client in 1..=4u64 {
        for round in 0..25u64 {
            id += 1;
            orders.push(Order::limit(id, Side::Sell, 100 + round as i64 % 3, 2).with_client(client));
        }
        for round in 0..25u64 {
            id += 1;
            orders.push(
                Order::limit(id, Side::Buy, 102 - round as i64 % 3 + 1, 2).with_client(client + 4),
            );
        }
    }
    // client and client+4 share shard (mod 4).
    let results = engine.submit_batch(orders);

    assert_eq!(results.len(), 200);
    assert_eq!(engine.orders_processed(), 200);
    let filled: u64 = results
        .iter()
        .map(|result| result.filled_quantity)
        .sum();
    let traded: u64 = results
        .iter()
        .flat_map(|result| result.trades.iter())
        .map(|trade| trade.quantity)
        .sum();
    assert_eq!(filled, traded);
    assert_eq!(engine.total_volume(), traded);
}

#[test]
fn within_shard_submission_order_is_preserved() {
    let engine = ConcurrentEngine::with_shards(2);
    engine.set_risk_checks_enabled(false);

    // All one client: one shard, strictly ordered.
    let orders = vec![
        Order::limit(1, Side::Sell, 100, 10).with_client(2),
        Order::limit(2, Side::Sell, 100, 10).with_client(2),
        Order::limit(3, Side::Buy, 100, 10).with_client(4),
    ];
    let results = engine.submit_batch(orders);

    // Time priority: the buy fills against order 1, not order 2.
    assert_eq!(results[2].trades.len(), 1);
    assert_eq!(results[2].trades[0].sell_order_id, 1);
}

#[test]
fn async_callbacks_complete_by_wait_all() {
    let volume_seen = Arc::new(AtomicU64::new(0));
    let sink = Arc::clone(&volume_seen);
    let mut engine = ConcurrentEngine::with_async_fanout(
        2,
        Arc::new(move |batch: Vec<Trade>| {
            // Simulate slow post-trade I/O.
            std::thread::sleep(std::time::Duration::from_millis(1));
            sink.fetch_add(batch.iter().map(|t| t.quantity).sum::<u64>(), Ordering::Relaxed);
        }),
    );
    engine.set_risk_checks_enabled(false);

    for id in 1..=30u64 {
        engine.submit(Order::limit(id, Side::Sell, 100, 3));
    }
    for id in 31..=60u64 {
        engine.submit(Order::limit(id, Side::Buy, 100, 3));
    }

    engine.wait_all();
    assert_eq!(volume_seen.load(Ordering::Relaxed), 90);
    engine.shutdown();
}

#[test]
fn parallel_submitters_share_the_front_end() {
    let engine = Arc::new(ConcurrentEngine::with_shards(8));
    engine.set_risk_checks_enabled(false);

    std::thread::scope(|scope| {
        for thread_index in 0..8u64 {
            let engine = Arc::clone(&engine);
            scope.spawn(move || {
                for i in 0..100u64 {
                    let id = thread_index * 10_000 + i + 1;
                    let side = if i % 2 == 0 { Side::Sell } else { Side::Buy };
                    engine.submit(Order::limit(id, side, 100, 1).with_client(thread_index + 1));
                }
            });
        }
    });

    assert_eq!(engine.orders_processed(), 800);
    // Each thread's alternating flow matches pairwise on its own shard.
    assert_eq!(engine.trade_count(), 400);
    assert_eq!(engine.total_order_count(), 0);
}

#[test]
fn shard_isolation_no_cross_shard_matching() {
    let engine = ConcurrentEngine::with_shards(2);
    engine.set_risk_checks_enabled(false);

    // Clients 1 and 2 land on different shards; their crossing orders
    // must not match each other.
    engine.submit(Order::limit(1, Side::Sell, 100, 10).with_client(2));
    let result = engine.submit(Order::limit(2, Side::Buy, 100, 10).with_client(1));

    assert_eq!(result.status, ExecutionStatus::Resting);
    assert_eq!(engine.trade_count(), 0);
    assert_eq!(engine.total_order_count(), 2);
}
