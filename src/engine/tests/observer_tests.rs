use crate::engine::MatchingEngine;
use crate::types::{ExecutionStatus, Order, Side};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn trade_listener_sees_every_trade_in_order() {
    let mut engine = MatchingEngine::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.set_trade_listener(Arc::new(move |trade| {
        sink.lock().unwrap().push(trade.trade_id);
    }));

    engine.submit(Order::limit(1, Side::Sell, 100, 10));
    engine.submit(Order::limit(2, Side::Sell, 100, 10));
    engine.submit(Order::limit(3, Side::Buy, 100, 20));

    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
}

#[test]
fn execution_listener_fires_once_per_call() {
    let mut engine = MatchingEngine::new();
    let count = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&count);
    engine.set_execution_listener(Arc::new(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    }));

    engine.submit(Order::limit(1, Side::Sell, 100, 10)); // resting
    engine.submit(Order::limit(0, Side::Buy, 100, 10)); // rejected
    engine.cancel(1); // cancelled
    engine.cancel(1); // rejected (not found)
    engine.modify(1, 105, 0); // rejected (not found)

    assert_eq!(count.load(Ordering::Relaxed), 5);
}

#[test]
fn execution_listener_sees_final_status() {
    let mut engine = MatchingEngine::new();
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&statuses);
    engine.set_execution_listener(Arc::new(move |result| {
        sink.lock().unwrap().push(result.status);
    }));

    engine.submit(Order::limit(1, Side::Sell, 100, 10));
    engine.submit(Order::limit(2, Side::Buy, 100, 10));

    assert_eq!(
        *statuses.lock().unwrap(),
        vec![ExecutionStatus::Resting, ExecutionStatus::Filled]
    );
}

#[test]
fn listeners_can_be_removed() {
    let mut engine = MatchingEngine::new();
    let count = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&count);
    engine.set_trade_listener(Arc::new(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    }));
    engine.remove_trade_listener();

    engine.submit(Order::limit(1, Side::Sell, 100, 10));
    engine.submit(Order::limit(2, Side::Buy, 100, 10));
    assert_eq!(count.load(Ordering::Relaxed), 0);
}
