//! Momentum strategy: a fast moving average crossing a slow one opens a
//! position in the direction of the move; a reversal closes it first.

use super::{
    MarketTick, SignalKind, Strategy, StrategyConfig, StrategySignal, StrategyState,
};
use crate::types::{ExecutionResult, Trade};
use std::collections::VecDeque;

/// Momentum parameters.
#[derive(Debug, Clone, Copy)]
pub struct MomentumParams {
    /// Slow window length in ticks; the fast window is a quarter of it.
    pub window: usize,
    /// Entry threshold in basis points of the slow average.
    pub entry_threshold_bps: i64,
    /// Quantity per entry.
    pub trade_size: u64,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            window: 20,
            entry_threshold_bps: 10,
            trade_size: 5,
        }
    }
}

/// Moving-average crossover over the mid-price stream.
pub struct MomentumStrategy {
    config: StrategyConfig,
    params: MomentumParams,
    state: StrategyState,
    prices: VecDeque<i64>,
}

impl MomentumStrategy {
    #[must_use]
    pub fn new(name: &str, params: MomentumParams) -> Self {
        Self {
            config: StrategyConfig {
                name: name.to_string(),
                ..StrategyConfig::default()
            },
            params: MomentumParams {
                window: params.window.max(4),
                ..params
            },
            state: StrategyState::default(),
            prices: VecDeque::new(),
        }
    }

    fn average(prices: impl Iterator<Item = i64>, count: usize) -> i64 {
        if count == 0 {
            return 0;
        }
        let sum: i128 = prices.map(i128::from).sum();
        (sum / count as i128) as i64
    }
}

impl Strategy for MomentumStrategy {
    fn on_market_tick(&mut self, tick: &MarketTick) -> Vec<StrategySignal> {
        let price = if tick.mid_price() > 0 {
            tick.mid_price()
        } else {
            tick.last_trade_price
        };
        if price <= 0 {
            return Vec::new();
        }

        self.prices.push_back(price);
        if self.prices.len() > self.params.window {
            self.prices.pop_front();
        }
        if self.prices.len() < self.params.window {
            return Vec::new();
        }

        let fast_len = (self.params.window / 4).max(1);
        let slow = Self::average(self.prices.iter().copied(), self.prices.len());
        let fast = Self::average(
            self.prices.iter().rev().take(fast_len).copied(),
            fast_len,
        );
        if slow <= 0 {
            return Vec::new();
        }
        let divergence_bps = (fast - slow) * 10_000 / slow;

        let mut signals = Vec::new();
        let net = self.state.net_position;

        if divergence_bps >= self.params.entry_threshold_bps {
            if net < 0 {
                signals.push(StrategySignal {
                    kind: SignalKind::CloseShort,
                    price: 0,
                    quantity: (-net) as u64,
                    confidence: 0.8,
                    reason: "momentum reversed up".to_string(),
                });
            } else if net == 0 {
                signals.push(StrategySignal {
                    kind: SignalKind::Buy,
                    price: 0,
                    quantity: self.params.trade_size,
                    confidence: (divergence_bps as f64 / 100.0).min(1.0),
                    reason: format!("upward momentum {divergence_bps}bps"),
                });
            }
        } else if divergence_bps <= -self.params.entry_threshold_bps {
            if net > 0 {
                signals.push(StrategySignal {
                    kind: SignalKind::CloseLong,
                    price: 0,
                    quantity: net as u64,
                    confidence: 0.8,
                    reason: "momentum reversed down".to_string(),
                });
            } else if net == 0 {
                signals.push(StrategySignal {
                    kind: SignalKind::Sell,
                    price: 0,
                    quantity: self.params.trade_size,
                    confidence: (-divergence_bps as f64 / 100.0).min(1.0),
                    reason: format!("downward momentum {divergence_bps}bps"),
                });
            }
        }

        signals
    }

    fn on_trade_executed(&mut self, _trade: &Trade, _was_ours: bool) {}

    fn on_order_filled(&mut self, _result: &ExecutionResult) {}

    fn reset(&mut self) {
        self.state = StrategyState::default();
        self.prices.clear();
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
