use crate::engine::MatchingEngine;
use crate::types::{ExecutionStatus, Order, RejectReason, Side};

#[test]
fn cancel_removes_resting_order() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Buy, 100, 40));

    let result = engine.cancel(1);
    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert_eq!(result.order_id, 1);
    assert_eq!(result.remaining_quantity, 40);
    assert!(engine.book().is_empty());
}

#[test]
fn cancel_reports_partial_remaining() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 100, 50));
    engine.submit(Order::limit(2, Side::Buy, 100, 20));

    let result = engine.cancel(1);
    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert_eq!(result.remaining_quantity, 30);
}

#[test]
fn cancel_is_not_idempotent() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Buy, 100, 10));
    assert_eq!(engine.cancel(1).status, ExecutionStatus::Cancelled);

    // Second cancel finds nothing and mutates nothing.
    let result = engine.cancel(1);
    assert_eq!(result.status, ExecutionStatus::Rejected);
    assert_eq!(result.reject_reason, Some(RejectReason::OrderNotFound));
    assert!(engine.book().is_empty());
}

#[test]
fn cancel_via_submit_resolves_target() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(7, Side::Sell, 101, 5));

    let result = engine.submit(Order::cancel(1000, 7));
    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert_eq!(result.order_id, 7);
    assert!(!engine.book().contains(7));
}

#[test]
fn cancel_unknown_and_zero_ids() {
    let mut engine = MatchingEngine::new();
    assert_eq!(
        engine.cancel(99).reject_reason,
        Some(RejectReason::OrderNotFound)
    );
    assert_eq!(
        engine.cancel(0).reject_reason,
        Some(RejectReason::InvalidOrderId)
    );
}

#[test]
fn modify_price_moves_order_to_new_level() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Buy, 100, 10));

    let result = engine.modify(1, 99, 0);
    assert_eq!(result.status, ExecutionStatus::Modified);
    assert_eq!(result.remaining_quantity, 10);
    assert_eq!(engine.book().quantity_at(100, Side::Buy), 0);
    assert_eq!(engine.book().quantity_at(99, Side::Buy), 10);
}

#[test]
fn modify_quantity_keeps_price() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 105, 10));

    let result = engine.modify(1, 0, 25);
    assert_eq!(result.status, ExecutionStatus::Modified);
    assert_eq!(engine.book().get(1).unwrap().quantity, 25);
    assert_eq!(engine.book().get(1).unwrap().price, 105);
}

#[test]
fn modify_loses_time_priority() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 100, 10));
    engine.submit(Order::limit(2, Side::Sell, 100, 10));

    // Re-sizing order 1 sends it behind order 2 in the queue.
    engine.modify(1, 0, 15);

    let result = engine.submit(Order::limit(3, Side::Buy, 100, 10));
    assert_eq!(result.trades[0].sell_order_id, 2);
}

#[test]
fn modify_crossing_price_fills() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 105, 10));
    engine.submit(Order::limit(2, Side::Buy, 100, 10));

    // Re-price the bid through the ask: it must execute, and the fill
    // status wins over `Modified`.
    let result = engine.modify(2, 105, 0);
    assert_eq!(result.status, ExecutionStatus::Filled);
    assert_eq!(result.filled_quantity, 10);
    assert_eq!(result.trades[0].price, 105);
    assert!(engine.book().is_empty());
}

#[test]
fn modify_crossing_partial_keeps_partial_status() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 105, 5));
    engine.submit(Order::limit(2, Side::Buy, 100, 20));

    let result = engine.modify(2, 105, 0);
    assert_eq!(result.status, ExecutionStatus::PartialFill);
    assert_eq!(result.filled_quantity, 5);
    assert_eq!(result.remaining_quantity, 15);
    assert_eq!(engine.book().quantity_at(105, Side::Buy), 15);
}

#[test]
fn modify_rejections() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Buy, 100, 10));

    assert_eq!(
        engine.modify(0, 101, 0).reject_reason,
        Some(RejectReason::InvalidOrderId)
    );
    assert_eq!(
        engine.modify(1, 0, 0).reject_reason,
        Some(RejectReason::ModifyNoChanges)
    );
    assert_eq!(
        engine.modify(1, -5, 0).reject_reason,
        Some(RejectReason::InvalidPrice)
    );
    assert_eq!(
        engine.modify(99, 101, 0).reject_reason,
        Some(RejectReason::OrderNotFound)
    );
    // Same values as the resting order: nothing to change.
    assert_eq!(
        engine.modify(1, 100, 10).reject_reason,
        Some(RejectReason::ModifyNoChanges)
    );
    // All rejects leave the order untouched.
    assert_eq!(engine.book().get(1).unwrap().quantity, 10);
    assert_eq!(engine.book().get(1).unwrap().price, 100);
}

#[test]
fn round_trip_add_cancel_restores_book() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 110, 10));

    let live_before = engine.book().pool_live_count();
    let bids_before = engine.book().bid_level_count();

    engine.submit(Order::limit(2, Side::Buy, 100, 25));
    engine.cancel(2);

    assert_eq!(engine.book().pool_live_count(), live_before);
    assert_eq!(engine.book().bid_level_count(), bids_before);
    assert!(!engine.book().contains(2));
    assert_eq!(engine.book().get(1).unwrap().quantity, 10);
}
