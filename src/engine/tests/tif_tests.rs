use crate::engine::MatchingEngine;
use crate::types::{ExecutionStatus, Order, RejectReason, Side, TimeInForce};

#[test]
fn ioc_partial_fill_never_rests() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 100, 30));

    let result = engine.submit(Order::limit(2, Side::Buy, 100, 50).with_tif(TimeInForce::Ioc));
    assert_eq!(result.status, ExecutionStatus::PartialFill);
    assert_eq!(result.filled_quantity, 30);
    assert_eq!(result.remaining_quantity, 20);
    assert!(!engine.book().contains(2));
    assert!(!engine.book().has_bids());
}

#[test]
fn ioc_with_no_liquidity_is_cancelled() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 105, 30));

    // Limit 100 cannot reach the 105 ask.
    let result = engine.submit(Order::limit(2, Side::Buy, 100, 10).with_tif(TimeInForce::Ioc));
    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert_eq!(result.filled_quantity, 0);
    assert!(!engine.book().contains(2));
}

#[test]
fn ioc_full_fill_reports_filled() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 100, 50));

    let result = engine.submit(Order::limit(2, Side::Buy, 100, 50).with_tif(TimeInForce::Ioc));
    assert_eq!(result.status, ExecutionStatus::Filled);
}

#[test]
fn fok_insufficient_depth_rejects_atomically() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 100, 30));
    let trades_before = engine.trade_count();

    let result = engine.submit(Order::limit(2, Side::Buy, 100, 50).with_tif(TimeInForce::Fok));
    assert_eq!(result.status, ExecutionStatus::Rejected);
    assert_eq!(result.reject_reason, Some(RejectReason::FokCannotFill));
    assert!(result.trades.is_empty());
    assert_eq!(result.remaining_quantity, 50);

    // No state change at all.
    assert_eq!(engine.trade_count(), trades_before);
    assert_eq!(engine.book().get(1).unwrap().quantity, 30);
    assert!(!engine.book().contains(2));
}

#[test]
fn fok_fills_completely_across_levels() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 100, 30));
    engine.submit(Order::limit(2, Side::Sell, 101, 30));

    let result = engine.submit(Order::limit(3, Side::Buy, 101, 50).with_tif(TimeInForce::Fok));
    assert_eq!(result.status, ExecutionStatus::Filled);
    assert_eq!(result.filled_quantity, 50);
    assert_eq!(result.trades.len(), 2);
}

#[test]
fn fok_ignores_unacceptable_levels() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 100, 30));
    engine.submit(Order::limit(2, Side::Sell, 110, 100));

    // Depth exists but not at acceptable prices for a 105 limit.
    let result = engine.submit(Order::limit(3, Side::Buy, 105, 50).with_tif(TimeInForce::Fok));
    assert_eq!(result.status, ExecutionStatus::Rejected);
    assert_eq!(result.reject_reason, Some(RejectReason::FokCannotFill));
}

#[test]
fn fok_market_order_checks_total_depth() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 100, 30));
    engine.submit(Order::limit(2, Side::Sell, 110, 30));

    let mut order = Order::market(3, Side::Buy, 60);
    order.tif = TimeInForce::Fok;
    let result = engine.submit(order);
    assert_eq!(result.status, ExecutionStatus::Filled);
    assert_eq!(result.filled_quantity, 60);

    let mut order = Order::market(4, Side::Buy, 10);
    order.tif = TimeInForce::Fok;
    let result = engine.submit(order);
    assert_eq!(result.status, ExecutionStatus::Rejected);
    assert_eq!(result.reject_reason, Some(RejectReason::NoLiquidity));
}

#[test]
fn gtc_is_the_default_and_rests() {
    let mut engine = MatchingEngine::new();
    let result = engine.submit(Order::limit(1, Side::Buy, 100, 10));
    assert_eq!(result.status, ExecutionStatus::Resting);
    assert!(engine.book().contains(1));
}
