//! Randomized order streams against the public engine API.

use matchbook_rs::prelude::*;
use proptest::prelude::*;
use proptest::strategy::Strategy;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct RandomOrder {
    kind: u8,
    buy: bool,
    price: i64,
    quantity: u64,
    tif: u8,
    client: u64,
}

fn order_stream() -> impl Strategy<Value = Vec<RandomOrder>> {
    proptest::collection::vec(
        (0u8..4, any::<bool>(), 90i64..111, 1u64..50, 0u8..3, 0u64..4).prop_map(
            |(kind, buy, price, quantity, tif, client)| RandomOrder {
                kind,
                buy,
                price,
                quantity,
                tif,
                client,
            },
        ),
        1..120,
    )
}

fn build_order(id: u64, raw: &RandomOrder, live_target: u64) -> Order {
    let side = if raw.buy { Side::Buy } else { Side::Sell };
    let tif = match raw.tif {
        0 => TimeInForce::Gtc,
        1 => TimeInForce::Ioc,
        _ => TimeInForce::Fok,
    };
    match raw.kind {
        0 => Order::market(id, side, raw.quantity).with_client(raw.client),
        1 => Order::cancel(id, live_target),
        2 => Order::modify(id, live_target, raw.price, raw.quantity),
        _ => Order::limit(id, side, raw.price, raw.quantity)
            .with_client(raw.client)
            .with_tif(tif),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Execution results are internally consistent and the engine's
    /// counters stay monotone, whatever the order stream.
    #[test]
    fn execution_results_are_consistent(stream in order_stream()) {
        let mut engine = MatchingEngine::new();
        let mut client_of: HashMap<u64, u64> = HashMap::new();
        let mut last_trade_id = 0u64;
        let mut last_timestamp = 0u64;
        let mut live: Vec<u64> = Vec::new();

        for (index, raw) in stream.iter().enumerate() {
            let id = index as u64 + 1;
            let live_target = live.last().copied().unwrap_or(1);
            let order = build_order(id, raw, live_target);
            let submitted_quantity = order.quantity;
            let is_new = matches!(order.kind, OrderKind::Limit | OrderKind::Market);
            if is_new {
                client_of.insert(order.id, order.client_id);
            }

            let result = engine.submit(order);

            if is_new && result.status != ExecutionStatus::Rejected {
                // Conservation: fills plus remainder equal the submission.
                prop_assert_eq!(
                    result.filled_quantity + result.remaining_quantity,
                    submitted_quantity
                );
                let traded: u64 = result.trades.iter().map(|t| t.quantity).sum();
                prop_assert_eq!(traded, result.filled_quantity);
            }
            if result.status == ExecutionStatus::Rejected {
                prop_assert!(result.reject_reason.is_some());
                prop_assert!(result.trades.is_empty());
            }

            for trade in &result.trades {
                // Monotone IDs and timestamps.
                prop_assert!(trade.trade_id > last_trade_id);
                prop_assert!(trade.timestamp > last_timestamp);
                last_trade_id = trade.trade_id;
                last_timestamp = trade.timestamp;

                // Self-trade prevention: both sides known and non-zero
                // implies distinct clients.
                let buy_client = client_of.get(&trade.buy_order_id).copied().unwrap_or(0);
                let sell_client = client_of.get(&trade.sell_order_id).copied().unwrap_or(0);
                if buy_client != 0 && sell_client != 0 {
                    prop_assert_ne!(buy_client, sell_client);
                }
            }

            // Track a rough set of live orders for cancel/modify targets.
            match result.status {
                ExecutionStatus::Resting | ExecutionStatus::PartialFill
                    if result.remaining_quantity > 0 && is_new =>
                {
                    live.push(result.order_id);
                }
                ExecutionStatus::Cancelled | ExecutionStatus::Filled => {
                    live.retain(|&l| l != result.order_id);
                }
                _ => {}
            }
            live.retain(|&l| engine.book().contains(l));
        }
    }

    /// With self-trade prevention out of the picture (all clients zero),
    /// the book is never crossed.
    #[test]
    fn anonymous_flow_never_crosses_the_book(stream in order_stream()) {
        let mut engine = MatchingEngine::new();
        for (index, raw) in stream.iter().enumerate() {
            let id = index as u64 + 1;
            let mut raw = raw.clone();
            raw.client = 0;
            engine.submit(build_order(id, &raw, 1));

            if let (Some(bid), Some(ask)) = (engine.book().best_bid(), engine.book().best_ask()) {
                prop_assert!(bid < ask, "book crossed: bid {} >= ask {}", bid, ask);
            }
        }
    }

    /// FIFO lot conservation holds for any trade stream.
    #[test]
    fn pnl_lot_conservation(
        trades in proptest::collection::vec((95i64..106, 1u64..30, any::<bool>()), 1..60)
    ) {
        let mut tracker = PnlTracker::new();
        for (index, (price, quantity, client_buys)) in trades.iter().enumerate() {
            let trade = Trade {
                trade_id: index as u64 + 1,
                buy_order_id: 1,
                sell_order_id: 2,
                price: *price,
                quantity: *quantity,
                timestamp: index as u64 + 1,
            };
            let (buy_client, sell_client) = if *client_buys { (7, 0) } else { (0, 7) };
            tracker.on_trade(&trade, buy_client, sell_client, 0);

            let pnl = tracker.client(7);
            let open_long: u64 = pnl.open_longs.iter().map(|lot| lot.quantity).sum();
            let open_short: u64 = pnl.open_shorts.iter().map(|lot| lot.quantity).sum();
            prop_assert_eq!(pnl.long_quantity, open_long as i64);
            prop_assert_eq!(pnl.short_quantity, open_short as i64);
            prop_assert!(pnl.open_longs.is_empty() || pnl.open_shorts.is_empty());
        }
    }
}
