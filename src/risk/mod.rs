//! Pre-trade risk gate: per-client limit checks before an order reaches the
//! matching engine, plus post-trade position upkeep.
//!
//! The gate is strictly pre-trade: a rejected check mutates nothing. Checks
//! run in a fixed order and the first failure wins. Cancels and modifies
//! bypass every check since they can only reduce risk.
//!
//! Not internally thread-safe; the concurrent front-end gives each shard
//! its own gate behind the shard mutex.

use crate::types::{Order, OrderKind, Side, Trade};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Fallback reference price for market-order exposure when the caller has
/// not supplied one.
pub const DEFAULT_MARKET_REFERENCE_PRICE: i64 = 10_000;

/// Outcome taxonomy of a risk check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskEventKind {
    /// Order passed all checks.
    Approved,
    /// Single order quantity above the per-order limit.
    OrderQuantityLimitBreached,
    /// Single order notional above the per-order limit.
    OrderValueLimitBreached,
    /// Client already has too many open orders.
    MaxOpenOrdersExceeded,
    /// Potential net position beyond the position limit.
    PositionLimitBreached,
    /// Potential gross exposure beyond the limit.
    GrossExposureLimitBreached,
    /// Potential net exposure beyond the limit.
    NetExposureLimitBreached,
    /// Realized losses already beyond the daily loss limit.
    DailyLossLimitBreached,
    /// Too many orders inside the current rate window.
    OrderRateExceeded,
}

impl RiskEventKind {
    /// Stable upper-snake string used in risk event CSV output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RiskEventKind::Approved => "APPROVED",
            RiskEventKind::OrderQuantityLimitBreached => "ORDER_QUANTITY_LIMIT_BREACHED",
            RiskEventKind::OrderValueLimitBreached => "ORDER_VALUE_LIMIT_BREACHED",
            RiskEventKind::MaxOpenOrdersExceeded => "MAX_OPEN_ORDERS_EXCEEDED",
            RiskEventKind::PositionLimitBreached => "POSITION_LIMIT_BREACHED",
            RiskEventKind::GrossExposureLimitBreached => "GROSS_EXPOSURE_LIMIT_BREACHED",
            RiskEventKind::NetExposureLimitBreached => "NET_EXPOSURE_LIMIT_BREACHED",
            RiskEventKind::DailyLossLimitBreached => "DAILY_LOSS_LIMIT_BREACHED",
            RiskEventKind::OrderRateExceeded => "ORDER_RATE_EXCEEDED",
        }
    }
}

/// Result of one pre-trade check.
#[derive(Debug, Clone, Serialize)]
pub struct RiskEvent {
    /// Monotone per-gate event identifier.
    pub event_id: u64,
    /// Gate-local logical timestamp.
    pub timestamp: u64,
    /// Order under check.
    pub order_id: u64,
    /// Owning client.
    pub client_id: u64,
    /// Approved or the breached limit.
    pub kind: RiskEventKind,
    /// Current exposure/position/value relevant to the check.
    pub current_value: i64,
    /// The limit that was checked.
    pub limit_value: i64,
    /// What the order would have added.
    pub requested_value: i64,
    /// Human-readable detail.
    pub details: String,
}

impl RiskEvent {
    #[must_use]
    #[inline]
    pub fn is_approved(&self) -> bool {
        self.kind == RiskEventKind::Approved
    }

    #[must_use]
    #[inline]
    pub fn is_rejected(&self) -> bool {
        !self.is_approved()
    }
}

/// Observer for every risk event (approved and rejected alike).
pub type RiskListener = Arc<dyn Fn(&RiskEvent) + Send + Sync>;

/// Per-client (or default) limit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskLimits {
    /// Max absolute net position per client.
    pub max_position_quantity: i64,
    /// Max gross exposure (quantity x price, both sides).
    pub max_gross_exposure: i64,
    /// Max absolute net exposure.
    pub max_net_exposure: i64,
    /// Max daily loss; negative, breached when realized P&L is
    /// more negative than this.
    pub max_daily_loss: i64,
    /// Max single order notional.
    pub max_order_value: i64,
    /// Max single order quantity.
    pub max_order_quantity: u64,
    /// Max orders accepted per rate window (externally reset).
    pub max_orders_per_window: u64,
    /// Max open orders per client.
    pub max_open_orders: u64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_quantity: 100_000,
            max_gross_exposure: 1_000_000_000,
            max_net_exposure: 500_000_000,
            max_daily_loss: -100_000_000,
            max_order_value: 10_000_000,
            max_order_quantity: 10_000,
            max_orders_per_window: 100,
            max_open_orders: 1_000,
        }
    }
}

/// Running position and counters for one client.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ClientPosition {
    /// Total long quantity held.
    pub long_quantity: i64,
    /// Total short quantity held.
    pub short_quantity: i64,
    /// Realized P&L, reset with the daily counters.
    pub realized_pnl: i64,
    /// Currently open (resting) orders.
    pub open_order_count: u64,
    /// Orders submitted since the last daily reset.
    pub daily_order_count: u64,
    /// Orders approved in the current rate window.
    pub orders_in_window: u64,
    /// Average entry price of the long side.
    pub avg_buy_price: i64,
    /// Average entry price of the short side.
    pub avg_sell_price: i64,
}

impl ClientPosition {
    /// `long - short`.
    #[must_use]
    #[inline]
    pub fn net_position(&self) -> i64 {
        self.long_quantity - self.short_quantity
    }

    /// `long + short`.
    #[must_use]
    #[inline]
    pub fn gross_position(&self) -> i64 {
        self.long_quantity + self.short_quantity
    }
}

/// Clamp an unsigned quantity into the signed domain used by position math.
#[inline]
fn quantity_to_i64(quantity: u64) -> i64 {
    i64::try_from(quantity).unwrap_or(i64::MAX)
}

/// The pre-trade risk gate.
pub struct RiskManager {
    default_limits: RiskLimits,
    client_limits: HashMap<u64, RiskLimits>,
    positions: HashMap<u64, ClientPosition>,
    event_id_counter: u64,
    timestamp_counter: u64,
    last_market_price: i64,
    approved_count: u64,
    rejected_count: u64,
    listener: Option<RiskListener>,
}

impl Default for RiskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskManager")
            .field("clients", &self.positions.len())
            .field("approved", &self.approved_count)
            .field("rejected", &self.rejected_count)
            .finish_non_exhaustive()
    }
}

impl RiskManager {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(RiskLimits::default())
    }

    /// A gate whose default limits are `limits`.
    #[must_use]
    pub fn with_limits(limits: RiskLimits) -> Self {
        Self {
            default_limits: limits,
            client_limits: HashMap::new(),
            positions: HashMap::new(),
            event_id_counter: 0,
            timestamp_counter: 0,
            last_market_price: DEFAULT_MARKET_REFERENCE_PRICE,
            approved_count: 0,
            rejected_count: 0,
            listener: None,
        }
    }

    /// Registers the risk-event observer.
    pub fn set_listener(&mut self, listener: RiskListener) {
        self.listener = Some(listener);
    }

    /// Overrides limits for one client; lookup falls back to the default
    /// limits on miss.
    pub fn set_client_limits(&mut self, client_id: u64, limits: RiskLimits) {
        self.client_limits.insert(client_id, limits);
    }

    /// Applicable limits for `client_id`.
    #[must_use]
    pub fn limits(&self, client_id: u64) -> &RiskLimits {
        if client_id != 0
            && let Some(limits) = self.client_limits.get(&client_id)
        {
            return limits;
        }
        &self.default_limits
    }

    /// Replaces the default limit set.
    pub fn set_default_limits(&mut self, limits: RiskLimits) {
        self.default_limits = limits;
    }

    /// Reference price used for market-order exposure. The caller should
    /// keep this near the last traded or mid price.
    pub fn set_market_reference_price(&mut self, price: i64) {
        self.last_market_price = price;
    }

    #[must_use]
    pub fn market_reference_price(&self) -> i64 {
        self.last_market_price
    }

    /// Current position for a client (default when unseen).
    #[must_use]
    pub fn position(&self, client_id: u64) -> ClientPosition {
        self.positions.get(&client_id).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn approved_count(&self) -> u64 {
        self.approved_count
    }

    #[must_use]
    pub fn rejected_count(&self) -> u64 {
        self.rejected_count
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.positions.len()
    }

    /// Runs every pre-trade check against `order`, first failure wins.
    /// Rejections leave all gate state untouched apart from the counters.
    pub fn check(&mut self, order: &Order) -> RiskEvent {
        if matches!(order.kind, OrderKind::Cancel | OrderKind::Modify) {
            let event = self.event(
                order,
                RiskEventKind::Approved,
                0,
                0,
                0,
                "cancel/modify orders bypass risk checks".to_string(),
            );
            self.approved_count += 1;
            self.notify(&event);
            return event;
        }

        let position = self.position(order.client_id);
        let limits = *self.limits(order.client_id);

        let verdict = self
            .check_order_limits(order, &limits)
            .or_else(|| self.check_open_orders(order, &position, &limits))
            .or_else(|| self.check_position(order, &position, &limits))
            .or_else(|| self.check_exposure(order, &position, &limits))
            .or_else(|| self.check_daily_loss(order, &position, &limits))
            .or_else(|| self.check_order_rate(order, &position, &limits));

        match verdict {
            Some(event) => {
                self.rejected_count += 1;
                debug!(
                    order_id = order.id,
                    client_id = order.client_id,
                    kind = ?event.kind,
                    "order rejected by risk gate"
                );
                self.notify(&event);
                event
            }
            None => {
                let event = self.event(
                    order,
                    RiskEventKind::Approved,
                    0,
                    0,
                    0,
                    "all risk checks passed".to_string(),
                );
                self.approved_count += 1;
                if order.client_id != 0 {
                    self.positions
                        .entry(order.client_id)
                        .or_default()
                        .orders_in_window += 1;
                }
                trace!(order_id = order.id, client_id = order.client_id, "risk approved");
                self.notify(&event);
                event
            }
        }
    }

    fn check_order_limits(&mut self, order: &Order, limits: &RiskLimits) -> Option<RiskEvent> {
        if order.quantity > limits.max_order_quantity {
            return Some(self.event(
                order,
                RiskEventKind::OrderQuantityLimitBreached,
                0,
                quantity_to_i64(limits.max_order_quantity),
                quantity_to_i64(order.quantity),
                format!(
                    "order quantity {} exceeds limit {}",
                    order.quantity, limits.max_order_quantity
                ),
            ));
        }

        if order.kind == OrderKind::Limit && order.price > 0 {
            let order_value = order.price.saturating_mul(quantity_to_i64(order.quantity));
            if order_value > limits.max_order_value {
                return Some(self.event(
                    order,
                    RiskEventKind::OrderValueLimitBreached,
                    0,
                    limits.max_order_value,
                    order_value,
                    format!(
                        "order value {order_value} exceeds limit {}",
                        limits.max_order_value
                    ),
                ));
            }
        }
        None
    }

    fn check_open_orders(
        &mut self,
        order: &Order,
        position: &ClientPosition,
        limits: &RiskLimits,
    ) -> Option<RiskEvent> {
        if position.open_order_count >= limits.max_open_orders {
            return Some(self.event(
                order,
                RiskEventKind::MaxOpenOrdersExceeded,
                quantity_to_i64(position.open_order_count),
                quantity_to_i64(limits.max_open_orders),
                1,
                format!(
                    "open orders {} would exceed limit {}",
                    position.open_order_count, limits.max_open_orders
                ),
            ));
        }
        None
    }

    fn check_position(
        &mut self,
        order: &Order,
        position: &ClientPosition,
        limits: &RiskLimits,
    ) -> Option<RiskEvent> {
        let delta = quantity_to_i64(order.quantity);
        let potential = match order.side {
            Side::Buy => position.net_position().saturating_add(delta),
            Side::Sell => position.net_position().saturating_sub(delta),
        };
        if potential.saturating_abs() > limits.max_position_quantity {
            return Some(self.event(
                order,
                RiskEventKind::PositionLimitBreached,
                position.net_position(),
                limits.max_position_quantity,
                delta,
                format!(
                    "net position would be {potential}, exceeding limit +/-{}",
                    limits.max_position_quantity
                ),
            ));
        }
        None
    }

    fn check_exposure(
        &mut self,
        order: &Order,
        position: &ClientPosition,
        limits: &RiskLimits,
    ) -> Option<RiskEvent> {
        // Market orders have no price; fall back to the conservative
        // reference price supplied by the caller.
        let reference_price = if order.kind == OrderKind::Market {
            self.last_market_price
        } else {
            order.price
        };
        let order_value = reference_price.saturating_mul(quantity_to_i64(order.quantity));

        let long_value = position
            .long_quantity
            .saturating_mul(position.avg_buy_price.max(0));
        let short_value = position
            .short_quantity
            .saturating_mul(position.avg_sell_price.max(0));

        let current_gross = long_value.saturating_add(short_value);
        let potential_gross = current_gross.saturating_add(order_value);
        if potential_gross > limits.max_gross_exposure {
            return Some(self.event(
                order,
                RiskEventKind::GrossExposureLimitBreached,
                current_gross,
                limits.max_gross_exposure,
                order_value,
                format!(
                    "gross exposure would be {potential_gross}, exceeding limit {}",
                    limits.max_gross_exposure
                ),
            ));
        }

        let current_net = long_value.saturating_sub(short_value);
        let potential_net = match order.side {
            Side::Buy => current_net.saturating_add(order_value),
            Side::Sell => current_net.saturating_sub(order_value),
        };
        if potential_net.saturating_abs() > limits.max_net_exposure {
            return Some(self.event(
                order,
                RiskEventKind::NetExposureLimitBreached,
                current_net,
                limits.max_net_exposure,
                order_value,
                format!(
                    "net exposure would be {potential_net}, exceeding limit +/-{}",
                    limits.max_net_exposure
                ),
            ));
        }
        None
    }

    fn check_daily_loss(
        &mut self,
        order: &Order,
        position: &ClientPosition,
        limits: &RiskLimits,
    ) -> Option<RiskEvent> {
        if position.realized_pnl < limits.max_daily_loss {
            return Some(self.event(
                order,
                RiskEventKind::DailyLossLimitBreached,
                position.realized_pnl,
                limits.max_daily_loss,
                0,
                format!(
                    "daily realized loss {} exceeds limit {}",
                    position.realized_pnl, limits.max_daily_loss
                ),
            ));
        }
        None
    }

    fn check_order_rate(
        &mut self,
        order: &Order,
        position: &ClientPosition,
        limits: &RiskLimits,
    ) -> Option<RiskEvent> {
        if position.orders_in_window >= limits.max_orders_per_window {
            return Some(self.event(
                order,
                RiskEventKind::OrderRateExceeded,
                quantity_to_i64(position.orders_in_window),
                quantity_to_i64(limits.max_orders_per_window),
                1,
                format!(
                    "order rate {} reached window limit {}",
                    position.orders_in_window, limits.max_orders_per_window
                ),
            ));
        }
        None
    }

    /// Post-trade position update for both counterparties. A zero client
    /// ID on either side skips that side. Closing consumes the opposite
    /// position before opening, and realized P&L accrues against the
    /// average entry price of the side being closed.
    pub fn on_trade(&mut self, trade: &Trade, buy_client_id: u64, sell_client_id: u64) {
        if buy_client_id != 0 {
            let position = self.positions.entry(buy_client_id).or_default();
            let quantity = quantity_to_i64(trade.quantity);
            if position.short_quantity >= quantity {
                // Buy-to-cover against the short side.
                position.realized_pnl +=
                    (position.avg_sell_price - trade.price).saturating_mul(quantity);
                position.short_quantity -= quantity;
            } else if position.short_quantity > 0 {
                let close_quantity = position.short_quantity;
                let opened = quantity - close_quantity;
                position.realized_pnl +=
                    (position.avg_sell_price - trade.price).saturating_mul(close_quantity);
                position.short_quantity = 0;
                position.long_quantity += opened;
                if position.long_quantity > 0 {
                    position.avg_buy_price = (position
                        .avg_buy_price
                        .saturating_mul(position.long_quantity - opened)
                        + trade.price.saturating_mul(opened))
                        / position.long_quantity;
                }
            } else {
                let old_value = position.avg_buy_price.saturating_mul(position.long_quantity);
                position.long_quantity += quantity;
                if position.long_quantity > 0 {
                    position.avg_buy_price = (old_value
                        + trade.price.saturating_mul(quantity))
                        / position.long_quantity;
                }
            }
        }

        if sell_client_id != 0 {
            let position = self.positions.entry(sell_client_id).or_default();
            let quantity = quantity_to_i64(trade.quantity);
            if position.long_quantity >= quantity {
                position.realized_pnl +=
                    (trade.price - position.avg_buy_price).saturating_mul(quantity);
                position.long_quantity -= quantity;
            } else if position.long_quantity > 0 {
                let close_quantity = position.long_quantity;
                let opened = quantity - close_quantity;
                position.realized_pnl +=
                    (trade.price - position.avg_buy_price).saturating_mul(close_quantity);
                position.long_quantity = 0;
                position.short_quantity += opened;
                if position.short_quantity > 0 {
                    position.avg_sell_price = (position
                        .avg_sell_price
                        .saturating_mul(position.short_quantity - opened)
                        + trade.price.saturating_mul(opened))
                        / position.short_quantity;
                }
            } else {
                let old_value = position
                    .avg_sell_price
                    .saturating_mul(position.short_quantity);
                position.short_quantity += quantity;
                if position.short_quantity > 0 {
                    position.avg_sell_price = (old_value
                        + trade.price.saturating_mul(quantity))
                        / position.short_quantity;
                }
            }
        }
    }

    /// Book-keeping when an order starts resting.
    pub fn on_order_added(&mut self, order: &Order) {
        if order.client_id == 0 {
            return;
        }
        let position = self.positions.entry(order.client_id).or_default();
        position.open_order_count += 1;
        position.daily_order_count += 1;
    }

    /// Book-keeping when a resting order leaves the book.
    pub fn on_order_removed(&mut self, order: &Order) {
        if order.client_id == 0 {
            return;
        }
        let position = self.positions.entry(order.client_id).or_default();
        position.open_order_count = position.open_order_count.saturating_sub(1);
    }

    /// Drops all client positions.
    pub fn reset_positions(&mut self) {
        self.positions.clear();
    }

    /// Externally driven "new day": clears daily order counts and realized
    /// P&L. There is no wall-clock boundary inside the gate.
    pub fn reset_daily_counters(&mut self) {
        for position in self.positions.values_mut() {
            position.daily_order_count = 0;
            position.realized_pnl = 0;
        }
    }

    /// Externally driven rate-window rollover.
    pub fn reset_rate_window(&mut self) {
        for position in self.positions.values_mut() {
            position.orders_in_window = 0;
        }
    }

    fn event(
        &mut self,
        order: &Order,
        kind: RiskEventKind,
        current_value: i64,
        limit_value: i64,
        requested_value: i64,
        details: String,
    ) -> RiskEvent {
        self.event_id_counter += 1;
        self.timestamp_counter += 1;
        RiskEvent {
            event_id: self.event_id_counter,
            timestamp: self.timestamp_counter,
            order_id: order.id,
            client_id: order.client_id,
            kind,
            current_value,
            limit_value,
            requested_value,
            details,
        }
    }

    fn notify(&self, event: &RiskEvent) {
        if let Some(listener) = &self.listener {
            listener(event);
        }
    }
}
