//! Core order, trade and execution-report types shared by every layer of the
//! engine.
//!
//! Prices are signed integers in the smallest quotable unit; quantities are
//! unsigned. There is no decimal or fractional representation anywhere in the
//! crate.

use serde::Serialize;
use std::fmt;

/// Highest price the engine will accept on a limit order. Prices above this
/// are rejected with [`RejectReason::PriceOutOfRange`] so that notional
/// arithmetic (`price * quantity`) stays far away from `i64` overflow.
pub const MAX_PRICE: i64 = 1_000_000_000_000;

/// Side of the book an order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    /// Buy (bid) side
    Buy,
    /// Sell (ask) side
    Sell,
}

impl Side {
    /// Returns the side an incoming order of this side matches against.
    #[must_use]
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// The four order kinds understood by [`crate::engine::MatchingEngine::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderKind {
    /// Match immediately at any price; never rests.
    Market,
    /// Match up to the limit price; the remainder may rest.
    Limit,
    /// Remove a resting order.
    Cancel,
    /// Re-price and/or re-size a resting order (losing time priority).
    Modify,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "market"),
            OrderKind::Limit => write!(f, "limit"),
            OrderKind::Cancel => write!(f, "cancel"),
            OrderKind::Modify => write!(f, "modify"),
        }
    }
}

/// Time-in-force policy for limit and market orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TimeInForce {
    /// Good-til-cancelled: the remainder rests in the book (default).
    #[default]
    Gtc,
    /// Immediate-or-cancel: fill what is possible, cancel the rest.
    Ioc,
    /// Fill-or-kill: fill entirely or reject without touching the book.
    Fok,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Gtc => write!(f, "GTC"),
            TimeInForce::Ioc => write!(f, "IOC"),
            TimeInForce::Fok => write!(f, "FOK"),
        }
    }
}

/// Reasons an order can be rejected before or during matching.
///
/// Rejects are data, not errors: every invalid submission comes back as a
/// well-formed [`ExecutionResult`] carrying one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    /// Order ID was zero.
    InvalidOrderId,
    /// Quantity was zero on a limit or market order.
    InvalidQuantity,
    /// Negative limit price, or negative new price on a modify.
    InvalidPrice,
    /// Limit price above [`MAX_PRICE`].
    PriceOutOfRange,
    /// Unrecognised order kind.
    InvalidOrderType,
    /// An order with this ID is already resting in the book.
    DuplicateOrderId,
    /// Cancel or modify target does not exist.
    OrderNotFound,
    /// Market order arrived with an empty opposite side.
    NoLiquidity,
    /// Fill-or-kill pre-check found insufficient acceptable quantity.
    FokCannotFill,
    /// Modify carried no effective change.
    ModifyNoChanges,
    /// Internal failure (arena exhaustion, saturated level arithmetic).
    InternalError,
}

impl RejectReason {
    /// Stable lower-snake string used in execution report CSV output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::InvalidOrderId => "invalid_order_id",
            RejectReason::InvalidQuantity => "invalid_quantity",
            RejectReason::InvalidPrice => "invalid_price",
            RejectReason::PriceOutOfRange => "price_out_of_range",
            RejectReason::InvalidOrderType => "invalid_order_type",
            RejectReason::DuplicateOrderId => "duplicate_order_id",
            RejectReason::OrderNotFound => "order_not_found",
            RejectReason::NoLiquidity => "no_liquidity",
            RejectReason::FokCannotFill => "fok_cannot_fill",
            RejectReason::ModifyNoChanges => "modify_no_changes",
            RejectReason::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single order as submitted to the engine.
///
/// The `target_order_id`, `new_price` and `new_quantity` fields are only
/// meaningful for `Cancel` and `Modify` orders; zero means "unset".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    /// Unique order identifier; zero is invalid.
    pub id: u64,
    /// Engine-assigned logical timestamp used for time priority. A zero
    /// value is replaced by the engine on submission.
    pub timestamp: u64,
    /// Order kind.
    pub kind: OrderKind,
    /// Buy or sell.
    pub side: Side,
    /// Limit price; ignored for market orders.
    pub price: i64,
    /// Quantity to trade.
    pub quantity: u64,
    /// Time-in-force policy.
    pub tif: TimeInForce,
    /// Owning client; zero disables self-trade prevention and risk tracking.
    pub client_id: u64,
    /// Target of a cancel or modify.
    pub target_order_id: u64,
    /// Modify: new price (0 keeps the original).
    pub new_price: i64,
    /// Modify: new quantity (0 keeps the original).
    pub new_quantity: u64,
}

impl Order {
    /// A GTC limit order.
    #[must_use]
    pub fn limit(id: u64, side: Side, price: i64, quantity: u64) -> Self {
        Self {
            id,
            timestamp: 0,
            kind: OrderKind::Limit,
            side,
            price,
            quantity,
            tif: TimeInForce::Gtc,
            client_id: 0,
            target_order_id: 0,
            new_price: 0,
            new_quantity: 0,
        }
    }

    /// A market order (IOC by construction: market remainders never rest).
    #[must_use]
    pub fn market(id: u64, side: Side, quantity: u64) -> Self {
        Self {
            kind: OrderKind::Market,
            price: 0,
            tif: TimeInForce::Ioc,
            ..Self::limit(id, side, 0, quantity)
        }
    }

    /// A cancel for `target`.
    #[must_use]
    pub fn cancel(id: u64, target: u64) -> Self {
        Self {
            kind: OrderKind::Cancel,
            quantity: 0,
            target_order_id: target,
            ..Self::limit(id, Side::Buy, 0, 0)
        }
    }

    /// A modify for `target`; zero-valued fields keep the original.
    #[must_use]
    pub fn modify(id: u64, target: u64, new_price: i64, new_quantity: u64) -> Self {
        Self {
            kind: OrderKind::Modify,
            quantity: 0,
            target_order_id: target,
            new_price,
            new_quantity,
            ..Self::limit(id, Side::Buy, 0, 0)
        }
    }

    /// Attach a client ID (builder style).
    #[must_use]
    pub fn with_client(mut self, client_id: u64) -> Self {
        self.client_id = client_id;
        self
    }

    /// Attach a time-in-force (builder style).
    #[must_use]
    pub fn with_tif(mut self, tif: TimeInForce) -> Self {
        self.tif = tif;
        self
    }

    /// Validates the order, returning the first applicable reject reason.
    ///
    /// Cancel needs a non-zero target; modify additionally needs at least
    /// one change. Market orders skip the price checks entirely.
    #[must_use]
    pub fn validate(&self) -> Option<RejectReason> {
        match self.kind {
            OrderKind::Cancel => {
                if self.target_order_id == 0 {
                    return Some(RejectReason::InvalidOrderId);
                }
            }
            OrderKind::Modify => {
                if self.target_order_id == 0 {
                    return Some(RejectReason::InvalidOrderId);
                }
                if self.new_price < 0 {
                    return Some(RejectReason::InvalidPrice);
                }
                if self.new_price == 0 && self.new_quantity == 0 {
                    return Some(RejectReason::ModifyNoChanges);
                }
            }
            OrderKind::Market => {
                if self.id == 0 {
                    return Some(RejectReason::InvalidOrderId);
                }
                if self.quantity == 0 {
                    return Some(RejectReason::InvalidQuantity);
                }
            }
            OrderKind::Limit => {
                if self.id == 0 {
                    return Some(RejectReason::InvalidOrderId);
                }
                if self.quantity == 0 {
                    return Some(RejectReason::InvalidQuantity);
                }
                if self.price < 0 {
                    return Some(RejectReason::InvalidPrice);
                }
                if self.price > MAX_PRICE {
                    return Some(RejectReason::PriceOutOfRange);
                }
            }
        }
        None
    }
}

/// A single fill between one buyer and one seller.
///
/// Emitted exactly once per matched pair segment, priced at the resting
/// order's price (price improvement accrues to the aggressor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Trade {
    /// Monotone per-engine trade identifier.
    pub trade_id: u64,
    /// Order ID of the buy side.
    pub buy_order_id: u64,
    /// Order ID of the sell side.
    pub sell_order_id: u64,
    /// Execution price (the resting order's price).
    pub price: i64,
    /// Executed quantity.
    pub quantity: u64,
    /// Engine logical timestamp of the fill.
    pub timestamp: u64,
}

/// Terminal disposition of a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionStatus {
    /// Fully filled.
    Filled,
    /// Partially filled; the remainder rested or was cancelled per TIF.
    PartialFill,
    /// Added to the book without any fill.
    Resting,
    /// Cancel processed, or an IOC/market remainder discarded unfilled.
    Cancelled,
    /// Modify processed without fills.
    Modified,
    /// Rejected; see [`ExecutionResult::reject_reason`].
    Rejected,
}

impl ExecutionStatus {
    /// Stable lower-snake string used in execution report CSV output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Filled => "filled",
            ExecutionStatus::PartialFill => "partial_fill",
            ExecutionStatus::Resting => "resting",
            ExecutionStatus::Cancelled => "cancelled",
            ExecutionStatus::Modified => "modified",
            ExecutionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single `submit`, `cancel` or `modify` call.
///
/// For limit and market orders, `filled_quantity + remaining_quantity`
/// always equals the originally submitted quantity, and the trade
/// quantities sum to `filled_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Terminal status.
    pub status: ExecutionStatus,
    /// The order (or cancel/modify target) this result describes.
    pub order_id: u64,
    /// Quantity executed by this submission.
    pub filled_quantity: u64,
    /// Quantity left unexecuted (resting or discarded).
    pub remaining_quantity: u64,
    /// Fills generated by this submission, in emission order.
    pub trades: Vec<Trade>,
    /// Set iff `status == Rejected` (plus market remainders discarded for
    /// lack of liquidity).
    pub reject_reason: Option<RejectReason>,
    /// Human-readable disposition note.
    pub message: String,
}

impl ExecutionResult {
    /// An empty result for `order_id`; status defaults to `Rejected` until
    /// the engine fills it in.
    #[must_use]
    pub fn new(order_id: u64) -> Self {
        Self {
            status: ExecutionStatus::Rejected,
            order_id,
            filled_quantity: 0,
            remaining_quantity: 0,
            trades: Vec::new(),
            reject_reason: None,
            message: String::new(),
        }
    }

    /// A rejection carrying `reason`.
    #[must_use]
    pub fn rejection(order_id: u64, reason: RejectReason) -> Self {
        Self {
            reject_reason: Some(reason),
            message: format!("rejected: {reason}"),
            ..Self::new(order_id)
        }
    }

    /// True when at least one trade was generated.
    #[must_use]
    #[inline]
    pub fn has_fills(&self) -> bool {
        !self.trades.is_empty()
    }

    /// Volume-weighted average fill price, or 0 when nothing filled.
    #[must_use]
    pub fn avg_fill_price(&self) -> f64 {
        if self.filled_quantity == 0 {
            return 0.0;
        }
        let notional: i128 = self
            .trades
            .iter()
            .map(|t| i128::from(t.price) * i128::from(t.quantity))
            .sum();
        notional as f64 / self.filled_quantity as f64
    }
}
