//! End-to-end matching scenarios with literal inputs and expected outputs.

use matchbook_rs::prelude::*;

#[test]
fn full_match_at_single_level() {
    let mut engine = MatchingEngine::new();

    let sell = engine.submit(Order::limit(1, Side::Sell, 100, 50));
    assert_eq!(sell.status, ExecutionStatus::Resting);

    let buy = engine.submit(Order::limit(2, Side::Buy, 100, 50));
    assert_eq!(buy.status, ExecutionStatus::Filled);
    assert_eq!(buy.filled_quantity, 50);
    assert_eq!(buy.trades.len(), 1);
    assert_eq!(buy.trades[0].buy_order_id, 2);
    assert_eq!(buy.trades[0].sell_order_id, 1);
    assert_eq!(buy.trades[0].price, 100);
    assert_eq!(buy.trades[0].quantity, 50);
    assert!(engine.book().is_empty());
}

#[test]
fn price_time_priority_across_price_then_time() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 101, 50));
    engine.submit(Order::limit(2, Side::Sell, 100, 50));
    engine.submit(Order::limit(3, Side::Sell, 100, 50));

    let result = engine.submit(Order::market(4, Side::Buy, 80));
    assert_eq!(result.trades.len(), 2);
    assert_eq!(
        (result.trades[0].buy_order_id, result.trades[0].sell_order_id),
        (4, 2)
    );
    assert_eq!((result.trades[0].price, result.trades[0].quantity), (100, 50));
    assert_eq!(
        (result.trades[1].buy_order_id, result.trades[1].sell_order_id),
        (4, 3)
    );
    assert_eq!((result.trades[1].price, result.trades[1].quantity), (100, 30));

    // id=3 keeps 20 at 100; id=1 untouched.
    assert_eq!(engine.book().quantity_at(100, Side::Sell), 20);
    assert_eq!(engine.book().quantity_at(101, Side::Sell), 50);
}

#[test]
fn ioc_partial() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 100, 30));

    let result = engine.submit(Order::limit(2, Side::Buy, 100, 50).with_tif(TimeInForce::Ioc));
    assert_eq!(result.status, ExecutionStatus::PartialFill);
    assert_eq!(result.filled_quantity, 30);
    assert_eq!(result.remaining_quantity, 20);
    assert!(!engine.book().contains(2));
}

#[test]
fn fok_insufficient() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 100, 30));

    let result = engine.submit(Order::limit(2, Side::Buy, 100, 50).with_tif(TimeInForce::Fok));
    assert_eq!(result.status, ExecutionStatus::Rejected);
    assert_eq!(result.reject_reason, Some(RejectReason::FokCannotFill));
    assert!(result.trades.is_empty());
    assert_eq!(engine.book().get(1).unwrap().quantity, 30);
}

#[test]
fn stp_skip() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 100, 50).with_client(42));

    let result = engine.submit(Order::limit(2, Side::Buy, 100, 50).with_client(42));
    assert_eq!(result.status, ExecutionStatus::Resting);
    assert_eq!(result.filled_quantity, 0);
    assert_eq!(engine.book().quantity_at(100, Side::Buy), 50);
    assert_eq!(engine.book().quantity_at(100, Side::Sell), 50);
}

#[test]
fn fifo_pnl() {
    let mut tracker = PnlTracker::new();
    let trade = |id: u64, price: i64, quantity: u64| Trade {
        trade_id: id,
        buy_order_id: 1,
        sell_order_id: 2,
        price,
        quantity,
        timestamp: id,
    };

    // Client 7: buy 10 @ 100 (lot A), buy 10 @ 110 (lot B), sell 10 @ 120.
    tracker.on_trade(&trade(1, 100, 10), 7, 0, 0);
    tracker.on_trade(&trade(2, 110, 10), 7, 0, 0);
    tracker.on_trade(&trade(3, 120, 10), 0, 7, 0);

    let pnl = tracker.client(7);
    assert_eq!(pnl.realized_pnl, 200);
    assert_eq!(pnl.long_quantity, 10);
    assert_eq!(pnl.open_longs.len(), 1);
    assert_eq!(pnl.open_longs[0].quantity, 10);
    assert_eq!(pnl.open_longs[0].price, 110);

    // Sell 10 @ 105: realized (105-110)*10 = -50, totals 150.
    tracker.on_trade(&trade(4, 105, 10), 0, 7, 0);
    assert_eq!(tracker.client(7).realized_pnl, 150);
    assert_eq!(tracker.client(7).long_quantity, 0);
}

#[test]
fn cancel_round_trip_restores_book_state() {
    let mut engine = MatchingEngine::new();
    engine.submit(Order::limit(1, Side::Sell, 110, 10));

    let levels_before = (
        engine.book().bid_level_count(),
        engine.book().ask_level_count(),
        engine.book().pool_live_count(),
    );

    engine.submit(Order::limit(2, Side::Buy, 100, 25));
    engine.cancel(2);

    let levels_after = (
        engine.book().bid_level_count(),
        engine.book().ask_level_count(),
        engine.book().pool_live_count(),
    );
    assert_eq!(levels_before, levels_after);

    // Second cancel is a pure no-op reject.
    let result = engine.cancel(2);
    assert_eq!(result.status, ExecutionStatus::Rejected);
    assert_eq!(result.reject_reason, Some(RejectReason::OrderNotFound));
}
