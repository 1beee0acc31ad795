use super::*;
use crate::types::{ExecutionStatus, Order, Side, Trade};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

#[test]
fn single_threaded_mode_matches_like_a_plain_engine() {
    let engine = ConcurrentEngine::new();
    assert_eq!(engine.mode(), Mode::SingleThreaded);

    engine.submit(Order::limit(1, Side::Sell, 100, 50).with_client(1));
    let result = engine.submit(Order::limit(2, Side::Buy, 100, 50).with_client(2));

    assert_eq!(result.status, ExecutionStatus::Filled);
    assert_eq!(engine.trade_count(), 1);
    assert_eq!(engine.total_volume(), 50);
    assert_eq!(engine.orders_processed(), 2);
    assert_eq!(engine.total_order_count(), 0);
}

#[test]
fn routing_is_by_client_then_order_id() {
    let engine = ConcurrentEngine::with_shards(4);
    assert_eq!(engine.mode(), Mode::Sharded);

    // client 5 -> shard 1; client 0, order 6 -> shard 2.
    engine.submit(Order::limit(10, Side::Buy, 100, 5).with_client(5));
    engine.submit(Order::limit(6, Side::Buy, 100, 5));

    assert_eq!(
        engine.shard(1).lock().unwrap().engine.book().order_count(),
        1
    );
    assert_eq!(
        engine.shard(2).lock().unwrap().engine.book().order_count(),
        1
    );
}

#[test]
fn same_client_orders_land_on_one_shard_and_match() {
    let engine = ConcurrentEngine::with_shards(4);
    engine.set_risk_checks_enabled(false);

    // Same routing key (client 9 vs 13 mod 4 = 1): both on shard 1.
    engine.submit(Order::limit(1, Side::Sell, 100, 10).with_client(9));
    let result = engine.submit(Order::limit(2, Side::Buy, 100, 10).with_client(13));
    assert_eq!(result.status, ExecutionStatus::Filled);
    assert_eq!(engine.trade_count(), 1);
}

#[test]
fn batch_submission_preserves_input_order_of_results() {
    let engine = ConcurrentEngine::with_shards(4);
    engine.set_risk_checks_enabled(false);

    let mut orders = Vec::new();
    for id in 1..=40u64 {
        let side = if id % 2 == 0 { Side::Buy } else { Side::Sell };
        // Route by order id (anonymous clients).
        orders.push(Order::limit(id, side, 100, 1));
    }
    let results = engine.submit_batch(orders);

    assert_eq!(results.len(), 40);
    for (position, result) in results.iter().enumerate() {
        assert_eq!(result.order_id, position as u64 + 1);
    }
    assert_eq!(engine.orders_processed(), 40);
}

#[test]
fn batch_matching_stays_within_shards() {
    let engine = ConcurrentEngine::with_shards(2);
    engine.set_risk_checks_enabled(false);

    // Clients 2 and 4 share shard 0; clients 1 and 3 share shard 1.
    let orders = vec![
        Order::limit(1, Side::Sell, 100, 10).with_client(2),
        Order::limit(2, Side::Sell, 100, 10).with_client(1),
        Order::limit(3, Side::Buy, 100, 10).with_client(4),
        Order::limit(4, Side::Buy, 100, 10).with_client(3),
    ];
    engine.submit_batch(orders);

    assert_eq!(engine.trade_count(), 2);
    assert_eq!(engine.total_volume(), 20);
    assert_eq!(engine.total_order_count(), 0);
}

#[test]
fn risk_gate_runs_inside_the_shard() {
    let engine = ConcurrentEngine::new();
    // Default limits: quantity cap is 10_000.
    let result = engine.submit(Order::limit(1, Side::Buy, 100, 50_000).with_client(1));
    assert_eq!(result.status, ExecutionStatus::Rejected);
    assert!(result.message.contains("risk check failed"));
    assert_eq!(engine.total_order_count(), 0);

    engine.set_risk_checks_enabled(false);
    let result = engine.submit(Order::limit(2, Side::Buy, 100, 50_000).with_client(1));
    assert_eq!(result.status, ExecutionStatus::Resting);
}

#[test]
fn post_trade_updates_risk_and_pnl_in_shard() {
    let engine = ConcurrentEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 100, 10).with_client(1));
    engine.submit(Order::limit(2, Side::Buy, 100, 10).with_client(2));

    let shard = engine.shard(0).lock().unwrap();
    assert_eq!(shard.risk.position(2).long_quantity, 10);
    assert_eq!(shard.risk.position(1).short_quantity, 10);
    assert_eq!(shard.pnl.client(2).long_quantity, 10);
    assert_eq!(shard.pnl.client(1).short_quantity, 10);
}

#[test]
fn async_fanout_sees_all_trades_after_wait_all() {
    let fanned_out = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&fanned_out);
    let mut engine = ConcurrentEngine::with_async_fanout(
        2,
        Arc::new(move |batch: Vec<Trade>| {
            counter.fetch_add(batch.iter().map(|t| t.quantity).sum::<u64>(), AtomicOrdering::Relaxed);
        }),
    );
    assert_eq!(engine.mode(), Mode::AsyncCallbacks);
    engine.set_risk_checks_enabled(false);

    for id in 1..=10u64 {
        engine.submit(Order::limit(id, Side::Sell, 100, 5));
    }
    for id in 11..=20u64 {
        engine.submit(Order::limit(id, Side::Buy, 100, 5));
    }

    engine.wait_all();
    assert_eq!(fanned_out.load(AtomicOrdering::Relaxed), 50);
    assert_eq!(engine.trade_count(), 10);

    engine.shutdown();
}

#[test]
fn cancel_routes_by_key() {
    let engine = ConcurrentEngine::with_shards(4);
    engine.set_risk_checks_enabled(false);
    engine.submit(Order::limit(10, Side::Buy, 100, 5).with_client(5));

    let result = engine.cancel(10, 5);
    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert_eq!(engine.total_order_count(), 0);

    // Wrong key lands on a shard that never saw the order.
    engine.submit(Order::limit(11, Side::Buy, 100, 5).with_client(5));
    let result = engine.cancel(11, 6);
    assert_eq!(result.status, ExecutionStatus::Rejected);
}

#[test]
fn concurrent_submissions_from_many_threads() {
    let engine = Arc::new(ConcurrentEngine::with_shards(4));
    engine.set_risk_checks_enabled(false);

    std::thread::scope(|scope| {
        for thread_index in 0..4u64 {
            let engine = Arc::clone(&engine);
            scope.spawn(move || {
                for i in 0..50u64 {
                    let id = thread_index * 1_000 + i + 1;
                    let side = if i % 2 == 0 { Side::Sell } else { Side::Buy };
                    // Per-thread client keeps each thread's flow on one shard.
                    engine.submit(Order::limit(id, side, 100, 1).with_client(thread_index + 1));
                }
            });
        }
    });

    assert_eq!(engine.orders_processed(), 200);
    // Within each shard, alternating sides match pairwise.
    assert_eq!(engine.trade_count(), 100);
}
