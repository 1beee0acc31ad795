//! Prelude: the types most callers need, importable in one line.
//!
//! ```rust
//! use matchbook_rs::prelude::*;
//! ```

pub use crate::concurrent::{ConcurrentEngine, Mode, PostTradeWorkers, Shard, TradeBatchHandler};
pub use crate::engine::{ExecutionListener, MatchingEngine, TradeListener};
pub use crate::io::{ExecutionReportWriter, OrderCsvParser, PnlWriter, RiskEventWriter, TradeWriter};
pub use crate::orderbook::{BookError, LevelView, OrderBook};
pub use crate::pnl::{ClientPnl, PnlSnapshot, PnlTracker};
pub use crate::risk::{ClientPosition, RiskEvent, RiskEventKind, RiskLimits, RiskManager};
pub use crate::strategy::{
    MarketMakerParams, MarketMakerStrategy, MarketTick, MomentumParams, MomentumStrategy,
    SignalKind, Strategy, StrategyConfig, StrategyDispatcher, StrategySignal,
};
pub use crate::types::{
    ExecutionResult, ExecutionStatus, MAX_PRICE, Order, OrderKind, RejectReason, Side,
    TimeInForce, Trade,
};
