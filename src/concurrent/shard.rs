//! One shard: an independent engine plus the risk gate and P&L tracker it
//! exclusively owns. Everything inside a shard is single-threaded; the
//! front-end serializes access through the shard mutex.

use crate::engine::MatchingEngine;
use crate::pnl::PnlTracker;
use crate::risk::RiskManager;
use crate::types::{ExecutionResult, ExecutionStatus, Order, RejectReason, Side};
use std::collections::HashMap;

/// The `(engine, risk gate, P&L tracker)` quartet owned by one shard. The
/// strategy dispatcher, when used, sits on top of the same shard and
/// inherits its single-ownership rule.
pub struct Shard {
    /// The matching engine and its book.
    pub engine: MatchingEngine,
    /// Pre-trade gate for this shard's clients.
    pub risk: RiskManager,
    /// Post-trade P&L for this shard's clients.
    pub pnl: PnlTracker,
    /// When false, orders go straight to the engine.
    pub risk_checks_enabled: bool,
    /// Owner of each resting order, so maker-side fills can be attributed.
    client_index: HashMap<u64, u64>,
}

impl Default for Shard {
    fn default() -> Self {
        Self::new()
    }
}

impl Shard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine: MatchingEngine::new(),
            risk: RiskManager::new(),
            pnl: PnlTracker::new(),
            risk_checks_enabled: true,
            client_index: HashMap::new(),
        }
    }

    /// Full order pipeline for one submission: risk gate, engine, then
    /// post-trade bookkeeping (risk positions, open-order counts, P&L) for
    /// both sides of every fill.
    ///
    /// A risk rejection synthesizes a `Rejected` execution result carrying
    /// the gate's details; the engine is never touched in that case.
    pub fn process(&mut self, order: Order) -> ExecutionResult {
        if self.risk_checks_enabled {
            let verdict = self.risk.check(&order);
            if verdict.is_rejected() {
                let mut result =
                    ExecutionResult::rejection(order.id, RejectReason::InternalError);
                result.remaining_quantity = order.quantity;
                result.message = format!("risk check failed: {}", verdict.details);
                return result;
            }
        }

        let result = self.engine.submit(order.clone());
        self.post_trade(&order, &result);
        result
    }

    fn post_trade(&mut self, order: &Order, result: &ExecutionResult) {
        // Open-order accounting: resting remainders add, cancels remove.
        match result.status {
            ExecutionStatus::Resting | ExecutionStatus::PartialFill
                if result.remaining_quantity > 0 =>
            {
                self.risk.on_order_added(order);
                if order.client_id != 0 {
                    self.client_index.insert(order.id, order.client_id);
                }
            }
            ExecutionStatus::Cancelled => {
                self.risk.on_order_removed(order);
                self.client_index.remove(&result.order_id);
            }
            _ => {}
        }

        for trade in &result.trades {
            // The taker's side is known from the order; the maker's client
            // comes from the resting-order owner map.
            let maker_order_id = match order.side {
                Side::Buy => trade.sell_order_id,
                Side::Sell => trade.buy_order_id,
            };
            let maker_client_id = self
                .client_index
                .get(&maker_order_id)
                .copied()
                .unwrap_or(0);
            let (buy_client_id, sell_client_id) = match order.side {
                Side::Buy => (order.client_id, maker_client_id),
                Side::Sell => (maker_client_id, order.client_id),
            };

            self.risk.on_trade(trade, buy_client_id, sell_client_id);
            self.pnl
                .on_trade(trade, buy_client_id, sell_client_id, trade.price);
            self.risk.set_market_reference_price(trade.price);

            // Fully consumed makers leave the book and the owner map.
            if !self.engine.book().contains(maker_order_id) {
                self.client_index.remove(&maker_order_id);
            }
        }
    }
}
