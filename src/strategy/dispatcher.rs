//! The strategy dispatcher: ticks in, orders out, fills correlated back.
//!
//! The dispatcher shares the engine, risk gate and P&L tracker with its
//! caller (mutable access, serialized per shard) and exclusively owns the
//! order-to-strategy correlation maps.

use super::{MarketTick, SignalKind, Strategy, StrategySignal};
use crate::engine::MatchingEngine;
use crate::pnl::PnlTracker;
use crate::risk::RiskManager;
use crate::types::{ExecutionResult, ExecutionStatus, Order, Side, TimeInForce};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Dispatcher knobs. The client-ID base and order-ID span are
/// configuration, not correctness: they only keep strategies from
/// colliding with external flow.
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherConfig {
    /// Run the risk gate before submitting opening orders.
    pub enable_risk_checks: bool,
    /// Feed fills into the P&L tracker.
    pub enable_pnl_tracking: bool,
    /// First order ID handed to the first registered strategy.
    pub base_order_id: u64,
    /// Order IDs reserved per strategy.
    pub order_id_span: u64,
    /// Client IDs are assigned as `client_id_base + registration index`.
    pub client_id_base: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enable_risk_checks: true,
            enable_pnl_tracking: true,
            base_order_id: 1_000_000,
            order_id_span: 1_000_000,
            client_id_base: 100,
        }
    }
}

/// Per-strategy performance counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrategyMetrics {
    /// Strategy these metrics belong to.
    pub strategy_name: String,
    /// Orders submitted to the engine.
    pub orders_submitted: u64,
    /// Orders that fully filled.
    pub orders_filled: u64,
    /// Orders that partially filled.
    pub orders_partial_filled: u64,
    /// Orders cancelled.
    pub orders_cancelled: u64,
    /// Orders rejected (risk gate or engine).
    pub orders_rejected: u64,
    /// Fills attributed to the strategy.
    pub total_trades: u64,
    /// Quantity filled.
    pub total_volume: u64,
    /// Advisory realized P&L mirror (authoritative numbers live in the
    /// P&L tracker).
    pub realized_pnl: i64,
    /// Advisory unrealized P&L mirror.
    pub unrealized_pnl: i64,
    /// Current net position.
    pub net_position: i64,
    /// Largest absolute net position seen.
    pub max_position: i64,
    /// Signals the strategy emitted.
    pub signals_generated: u64,
    /// Tick timestamp of the last signal.
    pub last_signal_time: u64,
}

/// Routes ticks to strategies and strategy signals into the engine.
pub struct StrategyDispatcher {
    config: DispatcherConfig,
    strategies: Vec<Box<dyn Strategy>>,
    names: HashMap<String, usize>,
    metrics: Vec<StrategyMetrics>,
    /// Populated on submit, cleared on terminal statuses.
    order_to_strategy: HashMap<u64, usize>,
    /// Reverse map: every live order ID per strategy.
    live_orders: Vec<Vec<u64>>,
    tick_count: u64,
    last_tick: MarketTick,
}

impl Default for StrategyDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StrategyDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyDispatcher")
            .field("strategies", &self.names)
            .field("ticks", &self.tick_count)
            .finish_non_exhaustive()
    }
}

impl StrategyDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    #[must_use]
    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            config,
            strategies: Vec::new(),
            names: HashMap::new(),
            metrics: Vec::new(),
            order_to_strategy: HashMap::new(),
            live_orders: Vec::new(),
            tick_count: 0,
            last_tick: MarketTick::default(),
        }
    }

    /// Registers a strategy, assigning its client ID
    /// (`client_id_base + index`) and its reserved order-ID range.
    /// Returns the strategy's name.
    pub fn register(&mut self, mut strategy: Box<dyn Strategy>) -> String {
        let index = self.strategies.len();
        let client_id = self.config.client_id_base + index as u64;
        strategy.config_mut().client_id = client_id;
        strategy.state_mut().next_order_id =
            self.config.base_order_id + index as u64 * self.config.order_id_span;

        let name = strategy.name().to_string();
        debug!(%name, client_id, "strategy registered");
        self.names.insert(name.clone(), index);
        self.metrics.push(StrategyMetrics {
            strategy_name: name.clone(),
            ..StrategyMetrics::default()
        });
        self.live_orders.push(Vec::new());
        self.strategies.push(strategy);
        name
    }

    /// Enables or disables a strategy by name.
    pub fn set_strategy_enabled(&mut self, name: &str, enabled: bool) {
        if let Some(&index) = self.names.get(name) {
            self.strategies[index].config_mut().enabled = enabled;
        }
    }

    #[must_use]
    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Metrics for one strategy.
    #[must_use]
    pub fn metrics(&self, name: &str) -> Option<&StrategyMetrics> {
        self.names.get(name).map(|&index| &self.metrics[index])
    }

    /// Metrics for every strategy, in registration order.
    #[must_use]
    pub fn all_metrics(&self) -> &[StrategyMetrics] {
        &self.metrics
    }

    /// Live (tracked) order IDs for one strategy.
    #[must_use]
    pub fn live_orders(&self, name: &str) -> &[u64] {
        self.names
            .get(name)
            .map_or(&[][..], |&index| &self.live_orders[index])
    }

    /// The strategy that submitted `order_id`, while the order is live.
    #[must_use]
    pub fn strategy_for_order(&self, order_id: u64) -> Option<&str> {
        self.order_to_strategy
            .get(&order_id)
            .map(|&index| self.metrics[index].strategy_name.as_str())
    }

    /// Builds a tick from the current book state.
    #[must_use]
    pub fn tick_from_book(&self, engine: &MatchingEngine) -> MarketTick {
        let book = engine.book();
        MarketTick {
            timestamp: self.tick_count + 1,
            bid_price: book.best_bid().unwrap_or(0),
            ask_price: book.best_ask().unwrap_or(0),
            bid_quantity: book.best_bid_quantity(),
            ask_quantity: book.best_ask_quantity(),
            last_trade_price: self.last_tick.last_trade_price,
            last_trade_quantity: self.last_tick.last_trade_quantity,
            total_volume: engine.total_volume(),
        }
    }

    /// Feeds one tick through every enabled strategy and executes the
    /// emitted signals.
    pub fn on_market_tick(
        &mut self,
        tick: &MarketTick,
        engine: &mut MatchingEngine,
        risk: &mut RiskManager,
        pnl: &mut PnlTracker,
    ) {
        self.last_tick = *tick;
        for index in 0..self.strategies.len() {
            if !self.strategies[index].config().enabled {
                continue;
            }
            let signals = self.strategies[index].on_market_tick(tick);
            for signal in signals {
                if !signal.is_actionable() {
                    continue;
                }
                self.metrics[index].signals_generated += 1;
                self.metrics[index].last_signal_time = tick.timestamp;
                trace!(
                    strategy = %self.metrics[index].strategy_name,
                    kind = ?signal.kind,
                    quantity = signal.quantity,
                    "signal"
                );
                self.execute_signal(index, &signal, tick, engine, risk, pnl);
            }
        }
        self.tick_count += 1;
    }

    /// Cancels all tracked orders for a strategy.
    pub fn cancel_strategy_orders(&mut self, name: &str, engine: &mut MatchingEngine) {
        if let Some(&index) = self.names.get(name) {
            let ids = self.live_orders[index].clone();
            for order_id in ids {
                self.cancel_tracked_order(index, order_id, engine);
            }
        }
    }

    /// Cancels a strategy's tracked orders on one side only.
    pub fn cancel_side_orders(&mut self, name: &str, side: Side, engine: &mut MatchingEngine) {
        if let Some(&index) = self.names.get(name) {
            self.cancel_side_for_index(index, side, engine);
        }
    }

    /// Cancels everything and resets every strategy and metric.
    pub fn reset(&mut self, engine: &mut MatchingEngine) {
        for index in 0..self.strategies.len() {
            let ids = self.live_orders[index].clone();
            for order_id in ids {
                self.cancel_tracked_order(index, order_id, engine);
            }
        }
        for (index, strategy) in self.strategies.iter_mut().enumerate() {
            strategy.reset();
            let name = self.metrics[index].strategy_name.clone();
            self.metrics[index] = StrategyMetrics {
                strategy_name: name,
                ..StrategyMetrics::default()
            };
        }
        self.order_to_strategy.clear();
        self.tick_count = 0;
    }

    fn execute_signal(
        &mut self,
        index: usize,
        signal: &StrategySignal,
        tick: &MarketTick,
        engine: &mut MatchingEngine,
        risk: &mut RiskManager,
        pnl: &mut PnlTracker,
    ) {
        let (side, closing) = match signal.kind {
            SignalKind::Buy => (Side::Buy, false),
            SignalKind::Sell => (Side::Sell, false),
            SignalKind::CloseLong => (Side::Sell, true),
            SignalKind::CloseShort => (Side::Buy, true),
            SignalKind::CancelBids => {
                self.cancel_side_for_index(index, Side::Buy, engine);
                return;
            }
            SignalKind::CancelAsks => {
                self.cancel_side_for_index(index, Side::Sell, engine);
                return;
            }
            SignalKind::CancelAll => {
                let ids = self.live_orders[index].clone();
                for order_id in ids {
                    self.cancel_tracked_order(index, order_id, engine);
                }
                return;
            }
            SignalKind::None => return,
        };

        let order = self.order_from_signal(index, side, signal);

        // Exits must always be permitted: the risk gate only sees opening
        // orders.
        if self.config.enable_risk_checks && !closing {
            let event = risk.check(&order);
            if event.is_rejected() {
                self.metrics[index].orders_rejected += 1;
                debug!(
                    strategy = %self.metrics[index].strategy_name,
                    order_id = order.id,
                    details = %event.details,
                    "strategy order rejected by risk gate"
                );
                return;
            }
        }

        self.order_to_strategy.insert(order.id, index);
        self.live_orders[index].push(order.id);
        self.metrics[index].orders_submitted += 1;

        let order_id = order.id;
        let result = engine.submit(order);
        self.process_result(index, side, order_id, &result, tick, pnl);
    }

    fn order_from_signal(&mut self, index: usize, side: Side, signal: &StrategySignal) -> Order {
        let order_id = self.strategies[index].take_order_id();
        let client_id = self.strategies[index].config().client_id;
        if signal.price > 0 {
            Order::limit(order_id, side, signal.price, signal.quantity).with_client(client_id)
        } else {
            let mut order = Order::market(order_id, side, signal.quantity).with_client(client_id);
            order.tif = TimeInForce::Ioc;
            order
        }
    }

    fn process_result(
        &mut self,
        index: usize,
        side: Side,
        order_id: u64,
        result: &ExecutionResult,
        tick: &MarketTick,
        pnl: &mut PnlTracker,
    ) {
        match result.status {
            ExecutionStatus::Filled => self.metrics[index].orders_filled += 1,
            ExecutionStatus::PartialFill => self.metrics[index].orders_partial_filled += 1,
            ExecutionStatus::Cancelled => self.metrics[index].orders_cancelled += 1,
            ExecutionStatus::Rejected => self.metrics[index].orders_rejected += 1,
            ExecutionStatus::Resting | ExecutionStatus::Modified => {}
        }

        // Track the resting remainder, if any, for side-scoped cancels.
        if matches!(
            result.status,
            ExecutionStatus::Resting | ExecutionStatus::PartialFill
        ) && result.remaining_quantity > 0
        {
            let state = self.strategies[index].state_mut();
            match side {
                Side::Buy => state.active_bid_order_ids.push(order_id),
                Side::Sell => state.active_ask_order_ids.push(order_id),
            }
        }

        let client_id = self.strategies[index].config().client_id;
        for trade in &result.trades {
            self.metrics[index].total_trades += 1;
            self.metrics[index].total_volume += trade.quantity;

            // Position updates are the dispatcher's job, not the
            // strategy's.
            self.strategies[index].update_position(side, trade.quantity, trade.price);
            self.strategies[index].state_mut().total_trades += 1;
            self.strategies[index].state_mut().total_volume += trade.quantity;
            self.strategies[index].on_trade_executed(trade, true);

            if self.config.enable_pnl_tracking {
                let (buy_client_id, sell_client_id) = match side {
                    Side::Buy => (client_id, 0),
                    Side::Sell => (0, client_id),
                };
                pnl.on_trade(trade, buy_client_id, sell_client_id, trade.price);
            }
        }

        self.strategies[index].on_order_filled(result);

        // Sync advisory metrics from the strategy state.
        {
            let mid = tick.mid_price();
            let state = self.strategies[index].state_mut();
            state.update_unrealized(mid);
            let net = state.net_position;
            let unrealized = state.unrealized_pnl;
            let metrics = &mut self.metrics[index];
            metrics.net_position = net;
            metrics.max_position = metrics.max_position.max(net.abs());
            metrics.unrealized_pnl = unrealized;
        }

        if matches!(
            result.status,
            ExecutionStatus::Filled | ExecutionStatus::Cancelled | ExecutionStatus::Rejected
        ) {
            self.forget_order(index, order_id);
        }
    }

    fn cancel_side_for_index(&mut self, index: usize, side: Side, engine: &mut MatchingEngine) {
        let ids = match side {
            Side::Buy => self.strategies[index].state().active_bid_order_ids.clone(),
            Side::Sell => self.strategies[index].state().active_ask_order_ids.clone(),
        };
        for order_id in ids {
            self.cancel_tracked_order(index, order_id, engine);
        }
    }

    fn cancel_tracked_order(&mut self, index: usize, order_id: u64, engine: &mut MatchingEngine) {
        let result = engine.cancel(order_id);
        if result.status == ExecutionStatus::Cancelled {
            self.metrics[index].orders_cancelled += 1;
        }
        // Forget it either way: a not-found order is already terminal.
        self.forget_order(index, order_id);
    }

    fn forget_order(&mut self, index: usize, order_id: u64) {
        self.order_to_strategy.remove(&order_id);
        self.live_orders[index].retain(|&id| id != order_id);
        let state = self.strategies[index].state_mut();
        state.active_bid_order_ids.retain(|&id| id != order_id);
        state.active_ask_order_ids.retain(|&id| id != order_id);
    }
}
