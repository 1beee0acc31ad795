//! Engine binary: reads an orders CSV, runs it through the pipeline
//! (risk gate, matching engine, post-trade tracking) and emits trade,
//! execution-report, risk-event and P&L CSVs.
//!
//! ```text
//! matchbook <orders.csv> [--trades PATH] [--executions PATH]
//!           [--risk-events PATH] [--pnl PATH] [--shards N]
//!           [--async-io] [--strategies] [--ticks N] [--no-risk]
//! ```

use matchbook_rs::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

struct Args {
    input: PathBuf,
    trades: Option<PathBuf>,
    executions: Option<PathBuf>,
    risk_events: Option<PathBuf>,
    pnl: Option<PathBuf>,
    shards: usize,
    async_io: bool,
    strategies: bool,
    ticks: u64,
    risk_checks: bool,
}

const USAGE: &str = "usage: matchbook <orders.csv> [--trades PATH] [--executions PATH] \
[--risk-events PATH] [--pnl PATH] [--shards N] [--async-io] [--strategies] [--ticks N] [--no-risk]";

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut input = None;
    let mut parsed = Args {
        input: PathBuf::new(),
        trades: None,
        executions: None,
        risk_events: None,
        pnl: None,
        shards: 1,
        async_io: false,
        strategies: false,
        ticks: 100,
        risk_checks: true,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--trades" => parsed.trades = Some(next_value(&mut args, "--trades")?.into()),
            "--executions" => parsed.executions = Some(next_value(&mut args, "--executions")?.into()),
            "--risk-events" => parsed.risk_events = Some(next_value(&mut args, "--risk-events")?.into()),
            "--pnl" => parsed.pnl = Some(next_value(&mut args, "--pnl")?.into()),
            "--shards" => {
                parsed.shards = next_value(&mut args, "--shards")?
                    .parse()
                    .map_err(|_| "--shards expects a positive integer".to_string())?;
            }
            "--ticks" => {
                parsed.ticks = next_value(&mut args, "--ticks")?
                    .parse()
                    .map_err(|_| "--ticks expects a positive integer".to_string())?;
            }
            "--async-io" => parsed.async_io = true,
            "--strategies" => parsed.strategies = true,
            "--no-risk" => parsed.risk_checks = false,
            "--help" | "-h" => return Err(USAGE.to_string()),
            other if input.is_none() && !other.starts_with('-') => {
                input = Some(PathBuf::from(other));
            }
            other => return Err(format!("unknown argument: {other}\n{USAGE}")),
        }
    }

    parsed.input = input.ok_or_else(|| USAGE.to_string())?;
    Ok(parsed)
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    args.next().ok_or_else(|| format!("{flag} expects a value"))
}

type SharedTradeWriter = Arc<Mutex<TradeWriter<BufWriter<File>>>>;

#[derive(Default)]
struct StatusTally {
    filled: u64,
    partial: u64,
    resting: u64,
    cancelled: u64,
    modified: u64,
    rejected: u64,
}

impl StatusTally {
    fn record(&mut self, status: ExecutionStatus) {
        match status {
            ExecutionStatus::Filled => self.filled += 1,
            ExecutionStatus::PartialFill => self.partial += 1,
            ExecutionStatus::Resting => self.resting += 1,
            ExecutionStatus::Cancelled => self.cancelled += 1,
            ExecutionStatus::Modified => self.modified += 1,
            ExecutionStatus::Rejected => self.rejected += 1,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("fatal: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut parser = OrderCsvParser::new();
    let orders = parser.parse_file(&args.input)?;
    info!(
        orders = orders.len(),
        parse_errors = parser.parse_error_count(),
        "orders loaded"
    );

    if args.strategies {
        return run_strategies(args, orders);
    }
    if args.shards > 1 || args.async_io {
        return run_concurrent(args, orders);
    }
    run_single(args, orders)
}

fn open_trade_writer(args: &Args) -> Result<Option<SharedTradeWriter>, std::io::Error> {
    args.trades
        .as_deref()
        .map(|path| TradeWriter::create(path).map(|w| Arc::new(Mutex::new(w))))
        .transpose()
}

/// Wires the risk-event and P&L writers into a shard's listeners.
fn wire_shard_writers(
    shard: &mut Shard,
    risk_writer: Option<&Arc<Mutex<RiskEventWriter<BufWriter<File>>>>>,
    pnl_writer: Option<&Arc<Mutex<PnlWriter<BufWriter<File>>>>>,
) {
    if let Some(writer) = risk_writer {
        let writer = Arc::clone(writer);
        shard.risk.set_listener(Arc::new(move |event| {
            if let Ok(mut writer) = writer.lock() {
                let _ = writer.write_event(event);
            }
        }));
    }
    if let Some(writer) = pnl_writer {
        let writer = Arc::clone(writer);
        shard.pnl.set_listener(Arc::new(move |snapshot| {
            if let Ok(mut writer) = writer.lock() {
                let _ = writer.write_snapshot(snapshot);
            }
        }));
    }
}

fn run_single(args: &Args, orders: Vec<Order>) -> Result<(), Box<dyn std::error::Error>> {
    let trade_writer = open_trade_writer(args)?;
    let risk_writer = args
        .risk_events
        .as_deref()
        .map(|p| RiskEventWriter::create(p).map(|w| Arc::new(Mutex::new(w))))
        .transpose()?;
    let pnl_writer = args
        .pnl
        .as_deref()
        .map(|p| PnlWriter::create(p).map(|w| Arc::new(Mutex::new(w))))
        .transpose()?;
    let mut execution_writer = args
        .executions
        .as_deref()
        .map(ExecutionReportWriter::create)
        .transpose()?;

    let mut shard = Shard::new();
    shard.risk_checks_enabled = args.risk_checks;
    wire_shard_writers(&mut shard, risk_writer.as_ref(), pnl_writer.as_ref());
    if let Some(writer) = &trade_writer {
        let writer = Arc::clone(writer);
        shard.engine.set_trade_listener(Arc::new(move |trade| {
            if let Ok(mut writer) = writer.lock() {
                let _ = writer.write_trade(trade);
            }
        }));
    }

    let mut tally = StatusTally::default();
    for order in orders {
        let result = shard.process(order.clone());
        tally.record(result.status);
        if let Some(writer) = &mut execution_writer {
            writer.write_report(&order, &result)?;
        }
    }

    if let Some(writer) = &trade_writer {
        writer.lock().unwrap().flush()?;
    }
    if let Some(writer) = &risk_writer {
        writer.lock().unwrap().flush()?;
    }
    if let Some(writer) = &pnl_writer {
        writer.lock().unwrap().flush()?;
    }
    if let Some(writer) = &mut execution_writer {
        writer.flush()?;
    }

    print_summary(
        &tally,
        shard.engine.trade_count(),
        shard.engine.total_volume(),
    );
    if let Some(fault) = shard.engine.fault() {
        return Err(format!("engine fault: {fault}").into());
    }
    Ok(())
}

fn run_concurrent(args: &Args, orders: Vec<Order>) -> Result<(), Box<dyn std::error::Error>> {
    let trade_writer = open_trade_writer(args)?;
    let mut execution_writer = args
        .executions
        .as_deref()
        .map(ExecutionReportWriter::create)
        .transpose()?;

    let mut engine = if args.async_io {
        // Trades cross to the worker pool as owned batches.
        let handler: TradeBatchHandler = match &trade_writer {
            Some(writer) => {
                let writer = Arc::clone(writer);
                Arc::new(move |batch: Vec<Trade>| {
                    if let Ok(mut writer) = writer.lock() {
                        for trade in &batch {
                            let _ = writer.write_trade(trade);
                        }
                    }
                })
            }
            None => Arc::new(|_batch: Vec<Trade>| {}),
        };
        ConcurrentEngine::with_async_fanout(2, handler)
    } else {
        let engine = ConcurrentEngine::with_shards(args.shards);
        // Synchronous trade writing straight from the engine observer.
        if let Some(writer) = &trade_writer {
            for index in 0..engine.shard_count() {
                let writer = Arc::clone(writer);
                if let Ok(mut shard) = engine.shard(index).lock() {
                    shard.engine.set_trade_listener(Arc::new(move |trade| {
                        if let Ok(mut writer) = writer.lock() {
                            let _ = writer.write_trade(trade);
                        }
                    }));
                }
            }
        }
        engine
    };
    engine.set_risk_checks_enabled(args.risk_checks);

    let mut tally = StatusTally::default();
    let submitted = orders.clone();
    let results = engine.submit_batch(orders);
    for (order, result) in submitted.iter().zip(&results) {
        tally.record(result.status);
        if let Some(writer) = &mut execution_writer {
            writer.write_report(order, result)?;
        }
    }

    engine.wait_all();
    engine.shutdown();

    if let Some(writer) = &trade_writer {
        writer.lock().unwrap().flush()?;
    }
    if let Some(writer) = &mut execution_writer {
        writer.flush()?;
    }

    print_summary(&tally, engine.trade_count(), engine.total_volume());
    Ok(())
}

fn run_strategies(args: &Args, orders: Vec<Order>) -> Result<(), Box<dyn std::error::Error>> {
    let trade_writer = open_trade_writer(args)?;
    let pnl_writer = args
        .pnl
        .as_deref()
        .map(|p| PnlWriter::create(p).map(|w| Arc::new(Mutex::new(w))))
        .transpose()?;

    let mut shard = Shard::new();
    shard.risk_checks_enabled = args.risk_checks;
    wire_shard_writers(&mut shard, None, pnl_writer.as_ref());
    if let Some(writer) = &trade_writer {
        let writer = Arc::clone(writer);
        shard.engine.set_trade_listener(Arc::new(move |trade| {
            if let Ok(mut writer) = writer.lock() {
                let _ = writer.write_trade(trade);
            }
        }));
    }

    // Seed the book with the input order flow, then let the strategies
    // trade against it.
    let mut tally = StatusTally::default();
    for order in orders {
        let result = shard.process(order);
        tally.record(result.status);
    }

    let mut dispatcher = StrategyDispatcher::new();
    dispatcher.register(Box::new(MarketMakerStrategy::new(
        "market-maker",
        MarketMakerParams::default(),
    )));
    dispatcher.register(Box::new(MomentumStrategy::new(
        "momentum",
        MomentumParams::default(),
    )));

    for _ in 0..args.ticks {
        let tick = dispatcher.tick_from_book(&shard.engine);
        dispatcher.on_market_tick(&tick, &mut shard.engine, &mut shard.risk, &mut shard.pnl);
    }

    if let Some(writer) = &trade_writer {
        writer.lock().unwrap().flush()?;
    }
    if let Some(writer) = &pnl_writer {
        writer.lock().unwrap().flush()?;
    }

    print_summary(
        &tally,
        shard.engine.trade_count(),
        shard.engine.total_volume(),
    );
    println!(
        "{}",
        serde_json::to_string_pretty(dispatcher.all_metrics())?
    );
    Ok(())
}

fn print_summary(tally: &StatusTally, trade_count: u64, total_volume: u64) {
    println!("orders: filled={} partial={} resting={} cancelled={} modified={} rejected={}",
        tally.filled, tally.partial, tally.resting, tally.cancelled, tally.modified, tally.rejected);
    println!("trades: {trade_count} volume: {total_volume}");
}
