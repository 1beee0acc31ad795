//! CSV-in to CSV-out pipeline: parse, gate, match, emit.

use matchbook_rs::prelude::*;
use std::sync::{Arc, Mutex};

const ORDERS_CSV: &str = "\
id,timestamp,type,side,price,quantity,client_id
1,0,limit,sell,100,50,1
2,0,limit,buy,100,30,2
3,0,limit,buy,99,10,2
3,0,cancel,buy,0,0
5,0,market,buy,0,20,3
bogus line
6,0,limit,sell,0,0,1
";

#[test]
fn csv_stream_through_the_shard_pipeline() {
    let mut parser = OrderCsvParser::new();
    let orders = parser.parse_content(ORDERS_CSV);
    // "bogus line" and the zero-quantity limit are dropped at parse time.
    assert_eq!(parser.parse_error_count(), 2);
    assert_eq!(orders.len(), 5);

    let mut shard = Shard::new();
    let trades = Arc::new(Mutex::new(TradeWriter::new(Vec::new()).unwrap()));
    {
        let trades = Arc::clone(&trades);
        shard.engine.set_trade_listener(Arc::new(move |trade| {
            let _ = trades.lock().unwrap().write_trade(trade);
        }));
    }
    let mut reports = ExecutionReportWriter::new(Vec::new()).unwrap();

    let mut statuses = Vec::new();
    for order in orders {
        let result = shard.process(order.clone());
        reports.write_report(&order, &result).unwrap();
        statuses.push(result.status);
    }

    assert_eq!(
        statuses,
        vec![
            ExecutionStatus::Resting,      // 1: sell 50 @ 100
            ExecutionStatus::Filled,       // 2: buy 30 @ 100
            ExecutionStatus::Resting,      // 3: buy 10 @ 99
            ExecutionStatus::Cancelled,    // cancel row targeting order 3
            ExecutionStatus::Filled,       // 5: market buy 20 eats the 100 ask
        ]
    );
    assert_eq!(reports.written(), 5);
    assert_eq!(trades.lock().unwrap().written(), 2);
}

#[test]
fn risk_rejects_surface_in_reports_and_events() {
    let mut shard = Shard::new();
    shard.risk.set_default_limits(RiskLimits {
        max_order_quantity: 10,
        ..RiskLimits::default()
    });

    let events = Arc::new(Mutex::new(RiskEventWriter::new(Vec::new()).unwrap()));
    {
        let events = Arc::clone(&events);
        shard.risk.set_listener(Arc::new(move |event| {
            let _ = events.lock().unwrap().write_event(event);
        }));
    }
    let mut reports = ExecutionReportWriter::new(Vec::new()).unwrap();

    let order = Order::limit(1, Side::Buy, 100, 50).with_client(1);
    let result = shard.process(order.clone());
    reports.write_report(&order, &result).unwrap();

    assert_eq!(result.status, ExecutionStatus::Rejected);
    assert!(result.message.contains("risk check failed"));
    // The gate never touched the engine.
    assert!(shard.engine.book().is_empty());
    // One risk event (the rejection) and one execution report.
    assert_eq!(events.lock().unwrap().written(), 1);
    assert_eq!(reports.written(), 1);
}

#[test]
fn pnl_snapshots_flow_to_the_writer() {
    let mut shard = Shard::new();
    let snapshots = Arc::new(Mutex::new(PnlWriter::new(Vec::new()).unwrap()));
    {
        let snapshots = Arc::clone(&snapshots);
        shard.pnl.set_listener(Arc::new(move |snapshot| {
            let _ = snapshots.lock().unwrap().write_snapshot(snapshot);
        }));
    }

    shard.process(Order::limit(1, Side::Sell, 100, 10).with_client(1));
    shard.process(Order::limit(2, Side::Buy, 100, 10).with_client(2));

    // One trade, both sides tracked: two snapshots.
    assert_eq!(snapshots.lock().unwrap().written(), 2);
    assert_eq!(shard.pnl.client(2).long_quantity, 10);
    assert_eq!(shard.pnl.client(1).short_quantity, 10);
}

#[test]
fn parse_errors_do_not_abort_the_batch() {
    let mut parser = OrderCsvParser::new();
    let content = "id,timestamp,type,side,price,quantity\n\
                   nonsense\n\
                   1,0,limit,buy,100,10\n\
                   more,nonsense,here,x,y,z\n\
                   2,0,limit,sell,101,10\n";
    let orders = parser.parse_content(content);
    assert_eq!(orders.len(), 2);
    assert_eq!(parser.parse_error_count(), 2);
    assert_eq!(parser.lines_processed(), 4);
}
