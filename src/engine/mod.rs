//! The matching engine: validation, dispatch, TIF handling, trade emission.
//!
//! One engine owns one [`OrderBook`] and is strictly single-threaded; the
//! concurrent front-end serializes access per shard. Engine timestamps and
//! trade IDs are monotone logical counters, never wall-clock time.

#[cfg(test)]
mod tests;

use crate::orderbook::{BookError, Fill, OrderBook};
use crate::types::{
    ExecutionResult, ExecutionStatus, MAX_PRICE, Order, OrderKind, RejectReason, Side, TimeInForce,
    Trade,
};
use std::sync::Arc;
use tracing::{debug, trace};

/// Observer invoked once per trade, in emission order, under the engine
/// call. Must be non-blocking and must not re-enter the engine.
pub type TradeListener = Arc<dyn Fn(&Trade) + Send + Sync>;

/// Observer invoked once per `submit`/`cancel`/`modify` with the final
/// result. Same restrictions as [`TradeListener`].
pub type ExecutionListener = Arc<dyn Fn(&ExecutionResult) + Send + Sync>;

/// Price-time priority matching engine over a single order book.
pub struct MatchingEngine {
    book: OrderBook,
    trade_id_counter: u64,
    timestamp_counter: u64,
    trade_count: u64,
    total_volume: u64,
    /// First system-level failure observed; latched until reset. While set,
    /// every submission is rejected with `InternalError`.
    fault: Option<BookError>,
    trade_listener: Option<TradeListener>,
    execution_listener: Option<ExecutionListener>,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MatchingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchingEngine")
            .field("orders", &self.book.order_count())
            .field("trade_count", &self.trade_count)
            .field("total_volume", &self.total_volume)
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}

impl MatchingEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::with_book(OrderBook::new())
    }

    /// Builds an engine over a pre-sized book.
    #[must_use]
    pub fn with_book(book: OrderBook) -> Self {
        Self {
            book,
            trade_id_counter: 0,
            timestamp_counter: 0,
            trade_count: 0,
            total_volume: 0,
            fault: None,
            trade_listener: None,
            execution_listener: None,
        }
    }

    /// Registers the per-trade observer.
    pub fn set_trade_listener(&mut self, listener: TradeListener) {
        self.trade_listener = Some(listener);
    }

    /// Removes the per-trade observer.
    pub fn remove_trade_listener(&mut self) {
        self.trade_listener = None;
    }

    /// Registers the per-execution observer.
    pub fn set_execution_listener(&mut self, listener: ExecutionListener) {
        self.execution_listener = Some(listener);
    }

    /// Removes the per-execution observer.
    pub fn remove_execution_listener(&mut self) {
        self.execution_listener = None;
    }

    /// The book this engine matches against.
    #[must_use]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Trades executed so far.
    #[must_use]
    #[inline]
    pub fn trade_count(&self) -> u64 {
        self.trade_count
    }

    /// Quantity traded so far.
    #[must_use]
    #[inline]
    pub fn total_volume(&self) -> u64 {
        self.total_volume
    }

    /// The latched system-level failure, if any. A faulted engine rejects
    /// every submission and must not be retried; it is fatal to its shard.
    #[must_use]
    pub fn fault(&self) -> Option<&BookError> {
        self.fault.as_ref()
    }

    /// Next logical timestamp (monotone per engine).
    fn next_timestamp(&mut self) -> u64 {
        self.timestamp_counter += 1;
        self.timestamp_counter
    }

    fn next_trade_id(&mut self) -> u64 {
        self.trade_id_counter += 1;
        self.trade_id_counter
    }

    /// Submits an order of any kind. This is the single entry point:
    /// validates, rejects with a precise reason, otherwise dispatches on
    /// the order kind. The execution observer fires exactly once.
    pub fn submit(&mut self, mut order: Order) -> ExecutionResult {
        if order.timestamp == 0 {
            order.timestamp = self.next_timestamp();
        }

        let result = self.dispatch(&order);
        self.notify_execution(&result);
        result
    }

    /// Cancels a resting order directly (thin wrapper used by cancel rows
    /// and by the strategy dispatcher).
    pub fn cancel(&mut self, order_id: u64) -> ExecutionResult {
        let result = self.cancel_inner(order_id);
        self.notify_execution(&result);
        result
    }

    /// Modifies a resting order directly. Zero-valued fields keep the
    /// original price/quantity; the order loses time priority.
    pub fn modify(&mut self, order_id: u64, new_price: i64, new_quantity: u64) -> ExecutionResult {
        let result = self.modify_inner(order_id, new_price, new_quantity);
        self.notify_execution(&result);
        result
    }

    fn dispatch(&mut self, order: &Order) -> ExecutionResult {
        if let Some(fault) = &self.fault {
            debug!(order_id = order.id, %fault, "submission rejected: engine faulted");
            return ExecutionResult::rejection(order.id, RejectReason::InternalError);
        }
        if self.book.is_saturated() {
            self.fault = Some(BookError::QuantitySaturated {
                price: self.book.best_bid().or(self.book.best_ask()).unwrap_or(0),
            });
            return ExecutionResult::rejection(order.id, RejectReason::InternalError);
        }

        if let Some(reason) = order.validate() {
            return ExecutionResult::rejection(order.id, reason);
        }

        if matches!(order.kind, OrderKind::Limit | OrderKind::Market)
            && self.book.contains(order.id)
        {
            return ExecutionResult::rejection(order.id, RejectReason::DuplicateOrderId);
        }

        match order.kind {
            OrderKind::Limit => self.process_limit(order.clone()),
            OrderKind::Market => self.process_market(order),
            OrderKind::Cancel => self.cancel_inner(order.target_order_id),
            OrderKind::Modify => {
                self.modify_inner(order.target_order_id, order.new_price, order.new_quantity)
            }
        }
    }

    fn process_limit(&mut self, order: Order) -> ExecutionResult {
        let mut result = ExecutionResult::new(order.id);
        let original_quantity = order.quantity;

        // Fill-or-kill is all-or-nothing: a depth pre-check keeps the book
        // untouched when the order cannot be fully filled.
        if order.tif == TimeInForce::Fok {
            let available =
                self.book
                    .peek_match(order.side, order.quantity, Some(order.price), order.client_id);
            if available < order.quantity {
                let mut rejection = ExecutionResult::rejection(order.id, RejectReason::FokCannotFill);
                rejection.remaining_quantity = order.quantity;
                rejection.message = "fill-or-kill order cannot be fully filled".to_string();
                return rejection;
            }
        }

        let mut fills = Vec::new();
        let filled = self.book.match_against(
            order.side,
            order.quantity,
            Some(order.price),
            order.client_id,
            &mut fills,
        );
        result.trades = self.record_fills(&order, &fills);
        result.filled_quantity = filled;
        result.remaining_quantity = original_quantity - filled;

        if order.tif == TimeInForce::Ioc {
            if result.filled_quantity == 0 {
                result.status = ExecutionStatus::Cancelled;
                result.message = "IOC order not filled, no matching liquidity".to_string();
            } else if result.remaining_quantity > 0 {
                result.status = ExecutionStatus::PartialFill;
                result.message = "IOC order partially filled, remainder cancelled".to_string();
            } else {
                result.status = ExecutionStatus::Filled;
                result.message = "IOC order fully filled".to_string();
            }
            return result;
        }

        if result.remaining_quantity > 0 {
            let mut resting = order;
            resting.quantity = result.remaining_quantity;
            match self.book.add(&resting) {
                Ok(true) => {
                    if result.has_fills() {
                        result.status = ExecutionStatus::PartialFill;
                        result.message =
                            "partially filled, remainder resting in book".to_string();
                    } else {
                        result.status = ExecutionStatus::Resting;
                        result.message = "order added to book".to_string();
                    }
                }
                Ok(false) => {
                    // Unreachable: duplicates and zero quantities were
                    // rejected up front.
                    result.status = ExecutionStatus::Rejected;
                    result.reject_reason = Some(RejectReason::InternalError);
                }
                Err(error) => return self.fail(result.order_id, error),
            }
        } else {
            result.status = ExecutionStatus::Filled;
            result.message = "order fully filled".to_string();
        }

        trace!(
            order_id = result.order_id,
            status = %result.status,
            filled = result.filled_quantity,
            "limit order processed"
        );
        result
    }

    fn process_market(&mut self, order: &Order) -> ExecutionResult {
        let mut result = ExecutionResult::new(order.id);
        let original_quantity = order.quantity;

        let has_liquidity = match order.side {
            Side::Buy => self.book.has_asks(),
            Side::Sell => self.book.has_bids(),
        };
        if !has_liquidity {
            let mut rejection = ExecutionResult::rejection(order.id, RejectReason::NoLiquidity);
            rejection.remaining_quantity = order.quantity;
            return rejection;
        }

        if order.tif == TimeInForce::Fok {
            let available =
                self.book
                    .peek_match(order.side, order.quantity, None, order.client_id);
            if available < order.quantity {
                let mut rejection = ExecutionResult::rejection(order.id, RejectReason::FokCannotFill);
                rejection.remaining_quantity = order.quantity;
                rejection.message = "fill-or-kill order cannot be fully filled".to_string();
                return rejection;
            }
        }

        let mut fills = Vec::new();
        let filled =
            self.book
                .match_against(order.side, order.quantity, None, order.client_id, &mut fills);
        result.trades = self.record_fills(order, &fills);
        result.filled_quantity = filled;
        result.remaining_quantity = original_quantity - filled;

        // Market remainders never rest.
        if result.remaining_quantity > 0 {
            if result.filled_quantity > 0 {
                result.status = ExecutionStatus::PartialFill;
                result.message =
                    "partially filled, remainder cancelled (no more liquidity)".to_string();
            } else {
                result.status = ExecutionStatus::Cancelled;
                result.reject_reason = Some(RejectReason::NoLiquidity);
                result.message = "market order cancelled, insufficient liquidity".to_string();
            }
        } else {
            result.status = ExecutionStatus::Filled;
            result.message = "market order fully filled".to_string();
        }
        result
    }

    fn cancel_inner(&mut self, order_id: u64) -> ExecutionResult {
        if order_id == 0 {
            return ExecutionResult::rejection(order_id, RejectReason::InvalidOrderId);
        }
        let Some(existing) = self.book.get(order_id) else {
            return ExecutionResult::rejection(order_id, RejectReason::OrderNotFound);
        };
        self.book.remove(order_id);

        let mut result = ExecutionResult::new(order_id);
        result.status = ExecutionStatus::Cancelled;
        result.remaining_quantity = existing.quantity;
        result.message = "order cancelled".to_string();
        trace!(order_id, remaining = existing.quantity, "order cancelled");
        result
    }

    fn modify_inner(&mut self, order_id: u64, new_price: i64, new_quantity: u64) -> ExecutionResult {
        if order_id == 0 {
            return ExecutionResult::rejection(order_id, RejectReason::InvalidOrderId);
        }
        if new_price < 0 {
            return ExecutionResult::rejection(order_id, RejectReason::InvalidPrice);
        }
        if new_price > MAX_PRICE {
            return ExecutionResult::rejection(order_id, RejectReason::PriceOutOfRange);
        }
        if new_price == 0 && new_quantity == 0 {
            return ExecutionResult::rejection(order_id, RejectReason::ModifyNoChanges);
        }

        let Some(existing) = self.book.get(order_id) else {
            return ExecutionResult::rejection(order_id, RejectReason::OrderNotFound);
        };

        let mut modified = existing.clone();
        let mut changed = false;
        if new_price > 0 && new_price != existing.price {
            modified.price = new_price;
            changed = true;
        }
        if new_quantity > 0 && new_quantity != existing.quantity {
            modified.quantity = new_quantity;
            changed = true;
        }
        if !changed {
            return ExecutionResult::rejection(order_id, RejectReason::ModifyNoChanges);
        }

        // The original slot is removed first; the replacement is stamped
        // with a fresh timestamp and loses time priority.
        self.book.remove(order_id);
        modified.timestamp = self.next_timestamp();

        let would_cross = match modified.side {
            Side::Buy => self.book.best_ask().is_some_and(|ask| modified.price >= ask),
            Side::Sell => self.book.best_bid().is_some_and(|bid| modified.price <= bid),
        };

        if would_cross {
            let mut result = self.process_limit(modified);
            if result.status != ExecutionStatus::Rejected {
                if result.has_fills() {
                    // Keep the fill status from the limit path.
                    result.message = format!("order modified, {}", result.message);
                } else {
                    result.status = ExecutionStatus::Modified;
                    result.message = "order modified".to_string();
                }
            }
            result
        } else {
            let mut result = ExecutionResult::new(order_id);
            match self.book.add(&modified) {
                Ok(_) => {
                    result.status = ExecutionStatus::Modified;
                    result.remaining_quantity = modified.quantity;
                    result.message = "order modified".to_string();
                }
                Err(error) => return self.fail(order_id, error),
            }
            result
        }
    }

    /// Turns raw fills into numbered trades, updates engine statistics and
    /// notifies the trade observer in emission order.
    fn record_fills(&mut self, taker: &Order, fills: &[Fill]) -> Vec<Trade> {
        let mut trades = Vec::with_capacity(fills.len());
        for fill in fills {
            let (buy_order_id, sell_order_id) = match taker.side {
                Side::Buy => (taker.id, fill.maker_order_id),
                Side::Sell => (fill.maker_order_id, taker.id),
            };
            let trade = Trade {
                trade_id: self.next_trade_id(),
                buy_order_id,
                sell_order_id,
                price: fill.price,
                quantity: fill.quantity,
                timestamp: self.next_timestamp(),
            };
            self.trade_count += 1;
            self.total_volume = self.total_volume.saturating_add(fill.quantity);
            if let Some(listener) = &self.trade_listener {
                listener(&trade);
            }
            trades.push(trade);
        }
        trades
    }

    /// Latches a system-level failure and produces the rejection that
    /// reports it.
    fn fail(&mut self, order_id: u64, error: BookError) -> ExecutionResult {
        debug!(order_id, %error, "engine fault");
        self.fault = Some(error);
        ExecutionResult::rejection(order_id, RejectReason::InternalError)
    }

    fn notify_execution(&self, result: &ExecutionResult) {
        if let Some(listener) = &self.execution_listener {
            listener(result);
        }
    }
}
