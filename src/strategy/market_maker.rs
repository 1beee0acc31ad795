//! Symmetric quoting strategy: keeps one bid and one ask around the mid,
//! skewing quotes against inventory and flattening when inventory runs
//! past its cap.

use super::{
    MarketTick, SignalKind, Strategy, StrategyConfig, StrategySignal, StrategyState,
};
use crate::types::{ExecutionResult, Trade};

/// Quoting parameters.
#[derive(Debug, Clone, Copy)]
pub struct MarketMakerParams {
    /// Desired distance between own bid and ask.
    pub target_spread: i64,
    /// Quantity quoted on each side.
    pub quote_size: u64,
    /// Inventory cap; beyond it the strategy flattens with a market order.
    pub max_inventory: i64,
    /// Re-quote only when the desired price moved at least this far.
    pub requote_threshold: i64,
}

impl Default for MarketMakerParams {
    fn default() -> Self {
        Self {
            target_spread: 4,
            quote_size: 10,
            max_inventory: 50,
            requote_threshold: 2,
        }
    }
}

/// A plain two-sided market maker.
pub struct MarketMakerStrategy {
    config: StrategyConfig,
    params: MarketMakerParams,
    state: StrategyState,
    last_bid_quote: i64,
    last_ask_quote: i64,
}

impl MarketMakerStrategy {
    #[must_use]
    pub fn new(name: &str, params: MarketMakerParams) -> Self {
        Self {
            config: StrategyConfig {
                name: name.to_string(),
                ..StrategyConfig::default()
            },
            params,
            state: StrategyState::default(),
            last_bid_quote: 0,
            last_ask_quote: 0,
        }
    }

    fn reference_price(tick: &MarketTick) -> i64 {
        let mid = tick.mid_price();
        if mid > 0 {
            mid
        } else if tick.last_trade_price > 0 {
            tick.last_trade_price
        } else if tick.bid_price > 0 {
            tick.bid_price
        } else {
            tick.ask_price
        }
    }
}

impl Strategy for MarketMakerStrategy {
    fn on_market_tick(&mut self, tick: &MarketTick) -> Vec<StrategySignal> {
        if !tick.is_valid() {
            return Vec::new();
        }
        let reference = Self::reference_price(tick);
        if reference <= 0 {
            return Vec::new();
        }

        let mut signals = Vec::new();

        // Flatten runaway inventory with a market order before quoting on.
        let net = self.state.net_position;
        if net > self.params.max_inventory {
            signals.push(StrategySignal {
                kind: SignalKind::CloseLong,
                price: 0,
                quantity: (net - self.params.max_inventory) as u64,
                confidence: 1.0,
                reason: "inventory above cap".to_string(),
            });
            return signals;
        }
        if net < -self.params.max_inventory {
            signals.push(StrategySignal {
                kind: SignalKind::CloseShort,
                price: 0,
                quantity: (-net - self.params.max_inventory) as u64,
                confidence: 1.0,
                reason: "inventory below cap".to_string(),
            });
            return signals;
        }

        let half = (self.params.target_spread / 2).max(1);
        // Long inventory pushes both quotes down, short pushes them up.
        let skew = if self.params.max_inventory > 0 {
            (net * half / self.params.max_inventory).clamp(-half, half)
        } else {
            0
        };
        let bid = reference - half - skew;
        let ask = reference + half - skew;
        if bid <= 0 || ask <= bid {
            return signals;
        }

        if (bid - self.last_bid_quote).abs() >= self.params.requote_threshold
            || self.last_bid_quote == 0
        {
            if self.last_bid_quote != 0 {
                signals.push(StrategySignal {
                    kind: SignalKind::CancelBids,
                    confidence: 1.0,
                    reason: "re-quoting bid".to_string(),
                    ..StrategySignal::default()
                });
            }
            signals.push(StrategySignal {
                kind: SignalKind::Buy,
                price: bid,
                quantity: self.params.quote_size,
                confidence: 0.5,
                reason: format!("quote bid at {bid}"),
            });
            self.last_bid_quote = bid;
        }

        if (ask - self.last_ask_quote).abs() >= self.params.requote_threshold
            || self.last_ask_quote == 0
        {
            if self.last_ask_quote != 0 {
                signals.push(StrategySignal {
                    kind: SignalKind::CancelAsks,
                    confidence: 1.0,
                    reason: "re-quoting ask".to_string(),
                    ..StrategySignal::default()
                });
            }
            signals.push(StrategySignal {
                kind: SignalKind::Sell,
                price: ask,
                quantity: self.params.quote_size,
                confidence: 0.5,
                reason: format!("quote ask at {ask}"),
            });
            self.last_ask_quote = ask;
        }

        signals
    }

    fn on_trade_executed(&mut self, _trade: &Trade, _was_ours: bool) {}

    fn on_order_filled(&mut self, _result: &ExecutionResult) {}

    fn reset(&mut self) {
        self.state = StrategyState::default();
        self.last_bid_quote = 0;
        self.last_ask_quote = 0;
    }

    fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut StrategyConfig {
        &mut self.config
    }

    fn state(&self) -> &StrategyState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StrategyState {
        &mut self.state
    }
}
