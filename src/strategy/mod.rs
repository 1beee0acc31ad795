//! Strategy framing: what a strategy is, what it may observe and what it
//! may emit. Strategies never touch the engine directly; the
//! [`dispatcher`](crate::strategy::StrategyDispatcher) turns their signals
//! into orders, runs the risk gate and routes fills back.

mod dispatcher;
mod market_maker;
mod momentum;


pub use dispatcher::{DispatcherConfig, StrategyDispatcher, StrategyMetrics};
pub use market_maker::{MarketMakerParams, MarketMakerStrategy};
pub use momentum::{MomentumParams, MomentumStrategy};

use crate::types::{ExecutionResult, Side, Trade};
use serde::Serialize;

/// One observable market update, derived from the book and trade stream.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MarketTick {
    /// Logical tick timestamp.
    pub timestamp: u64,
    /// Best bid price (0 when the side is empty).
    pub bid_price: i64,
    /// Best ask price (0 when the side is empty).
    pub ask_price: i64,
    /// Quantity at the best bid.
    pub bid_quantity: u64,
    /// Quantity at the best ask.
    pub ask_quantity: u64,
    /// Last traded price (0 when nothing traded yet).
    pub last_trade_price: i64,
    /// Quantity of the last trade.
    pub last_trade_quantity: u64,
    /// Cumulative traded volume.
    pub total_volume: u64,
}

impl MarketTick {
    /// Midpoint of the touch, 0 when either side is empty.
    #[must_use]
    pub fn mid_price(&self) -> i64 {
        if self.bid_price > 0 && self.ask_price > 0 {
            (self.bid_price + self.ask_price) / 2
        } else {
            0
        }
    }

    /// Touch spread, 0 when either side is empty.
    #[must_use]
    pub fn spread(&self) -> i64 {
        if self.bid_price > 0 && self.ask_price > 0 {
            self.ask_price - self.bid_price
        } else {
            0
        }
    }

    /// A tick is observable once at least one side is quoted.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.bid_price > 0 || self.ask_price > 0
    }
}

/// The action a strategy wants taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SignalKind {
    /// No action.
    #[default]
    None,
    /// Open or increase a long position.
    Buy,
    /// Open or increase a short position.
    Sell,
    /// Close the long position (sells).
    CloseLong,
    /// Close the short position (buys).
    CloseShort,
    /// Cancel this strategy's resting bids.
    CancelBids,
    /// Cancel this strategy's resting asks.
    CancelAsks,
    /// Cancel everything this strategy has resting.
    CancelAll,
}

/// A signal with its parameters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrategySignal {
    /// What to do.
    pub kind: SignalKind,
    /// Target price; 0 means a market order.
    pub price: i64,
    /// Desired quantity (ignored for cancel signals).
    pub quantity: u64,
    /// Signal confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Human-readable motivation.
    pub reason: String,
}

impl StrategySignal {
    /// Cancel signals carry no quantity; everything else needs one.
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        match self.kind {
            SignalKind::None => false,
            SignalKind::CancelBids | SignalKind::CancelAsks | SignalKind::CancelAll => true,
            _ => self.quantity > 0,
        }
    }
}

/// Static configuration of a strategy instance.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyConfig {
    /// Unique strategy name (used as the correlation key).
    pub name: String,
    /// Client ID stamped on every order; assigned by the dispatcher at
    /// registration.
    pub client_id: u64,
    /// Disabled strategies receive no ticks.
    pub enabled: bool,
    /// Advisory cap on the strategy's own net position.
    pub max_position: i64,
    /// Advisory cap on a single order's notional.
    pub max_order_value: i64,
    /// Advisory cap on a single order's quantity.
    pub max_order_quantity: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: "strategy".to_string(),
            client_id: 0,
            enabled: true,
            max_position: 1_000,
            max_order_value: 100_000,
            max_order_quantity: 100,
        }
    }
}

/// Mutable per-strategy state. Position fields are maintained by the
/// dispatcher through [`Strategy::update_position`], not by the strategy.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrategyState {
    /// `long - short` from this strategy's own fills.
    pub net_position: i64,
    /// Total bought.
    pub long_position: i64,
    /// Total sold.
    pub short_position: i64,
    /// Last fill price, used as the unrealized P&L reference.
    pub last_fill_price: i64,
    /// Advisory unrealized P&L against the latest mid.
    pub unrealized_pnl: i64,
    /// Fills attributed to this strategy.
    pub total_trades: u64,
    /// Quantity filled for this strategy.
    pub total_volume: u64,
    /// Resting buy orders the dispatcher tracks for this strategy.
    pub active_bid_order_ids: Vec<u64>,
    /// Resting sell orders the dispatcher tracks for this strategy.
    pub active_ask_order_ids: Vec<u64>,
    /// Next order ID to allocate (range assigned by the dispatcher).
    pub next_order_id: u64,
}

impl StrategyState {
    /// Refreshes the advisory unrealized P&L against `current_price`.
    pub fn update_unrealized(&mut self, current_price: i64) {
        if self.net_position != 0 && self.last_fill_price > 0 && current_price > 0 {
            self.unrealized_pnl = (current_price - self.last_fill_price) * self.net_position;
        } else {
            self.unrealized_pnl = 0;
        }
    }
}

/// The capability set every strategy implements.
///
/// Object-safe: the dispatcher owns strategies as `Box<dyn Strategy>`.
pub trait Strategy: Send {
    /// Observe a tick, emit zero or more signals.
    fn on_market_tick(&mut self, tick: &MarketTick) -> Vec<StrategySignal>;

    /// A trade happened; `was_ours` is true when one side was this
    /// strategy's order.
    fn on_trade_executed(&mut self, trade: &Trade, was_ours: bool);

    /// The final result of an order this strategy submitted.
    fn on_order_filled(&mut self, result: &ExecutionResult);

    /// Clear all internal state.
    fn reset(&mut self);

    /// Strategy name; must be unique within a dispatcher.
    fn name(&self) -> &str {
        &self.config().name
    }

    fn config(&self) -> &StrategyConfig;
    fn config_mut(&mut self) -> &mut StrategyConfig;
    fn state(&self) -> &StrategyState;
    fn state_mut(&mut self) -> &mut StrategyState;

    /// Uniform position hook called by the dispatcher after each fill.
    fn update_position(&mut self, side: Side, quantity: u64, price: i64) {
        let state = self.state_mut();
        let quantity = i64::try_from(quantity).unwrap_or(i64::MAX);
        match side {
            Side::Buy => {
                state.net_position += quantity;
                state.long_position += quantity;
            }
            Side::Sell => {
                state.net_position -= quantity;
                state.short_position += quantity;
            }
        }
        state.last_fill_price = price;
    }

    /// Allocates the next order ID from this strategy's reserved range.
    fn take_order_id(&mut self) -> u64 {
        let state = self.state_mut();
        let id = state.next_order_id;
        state.next_order_id += 1;
        id
    }
}
