//! Core order book: two price-ordered sides over a shared slot arena.
//!
//! Bids and asks are `BTreeMap<i64, PriceLevel>`; the best ask is the first
//! ask key and the best bid the last bid key, so both best-price queries are
//! O(1) through the tree's edge entries. All per-order bookkeeping is O(1)
//! average through the [`OrderIndex`].

use super::arena::{Arena, DEFAULT_POOL_CAPACITY};
use super::error::BookError;
use super::index::{OrderIndex, OrderLocation};
use super::level::PriceLevel;
use crate::types::{Order, OrderKind, Side, TimeInForce};
use std::collections::BTreeMap;
use tracing::trace;

/// Aggregate view of one price level, for depth queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LevelView {
    /// Level price.
    pub price: i64,
    /// Total resting quantity at this price.
    pub quantity: u64,
    /// Number of resting orders at this price.
    pub orders: usize,
}

/// A single-symbol limit order book.
///
/// The book exclusively owns every resting order through its arena; the ID
/// index stores slot handles, never pointers, and is always updated before a
/// slot is released.
#[derive(Debug)]
pub struct OrderBook {
    /// Bid levels; best bid is the highest key (`last_key_value`).
    pub(super) bids: BTreeMap<i64, PriceLevel>,
    /// Ask levels; best ask is the lowest key (`first_key_value`).
    pub(super) asks: BTreeMap<i64, PriceLevel>,
    pub(super) index: OrderIndex,
    pub(super) arena: Arena,
    /// Latched when any level's quantity arithmetic saturated.
    pub(super) saturated: bool,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    /// Creates a book with the default order pool size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    /// Creates a book with `capacity` pre-allocated order slots. The pool
    /// doubles when exhausted and never shrinks within a session.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: OrderIndex::with_capacity(capacity),
            arena: Arena::with_capacity(capacity),
            saturated: false,
        }
    }

    /// Caps the arena's total slot count; exceeding it surfaces
    /// [`BookError::ArenaExhausted`] instead of growing.
    pub fn set_max_orders(&mut self, max: usize) {
        self.arena.set_max_slots(max);
    }

    /// Adds a resting order to its side-and-price FIFO.
    ///
    /// Returns `Ok(false)` (book untouched) when the ID is a duplicate or
    /// the order carries a zero ID or quantity.
    ///
    /// # Errors
    /// [`BookError::ArenaExhausted`] when the pool refuses to grow.
    pub fn add(&mut self, order: &Order) -> Result<bool, BookError> {
        if order.id == 0 || order.quantity == 0 {
            return Ok(false);
        }
        if self.index.contains(order.id) {
            return Ok(false);
        }

        let idx = self.arena.acquire()?;
        {
            let slot = self.arena.get_mut(idx);
            slot.id = order.id;
            slot.client_id = order.client_id;
            slot.price = order.price;
            slot.quantity = order.quantity;
            slot.timestamp = order.timestamp;
            slot.side = order.side;
        }

        let level = match order.side {
            Side::Buy => self
                .bids
                .entry(order.price)
                .or_insert_with(|| PriceLevel::new(order.price)),
            Side::Sell => self
                .asks
                .entry(order.price)
                .or_insert_with(|| PriceLevel::new(order.price)),
        };
        level.push_back(&mut self.arena, idx);
        if level.is_saturated() {
            self.saturated = true;
        }

        // Infallible: the duplicate check above covers the only error path.
        self.index
            .insert(
                order.id,
                OrderLocation {
                    slot: idx,
                    price: order.price,
                    side: order.side,
                },
            )
            .expect("duplicate checked before slot acquisition");

        trace!(
            order_id = order.id,
            side = %order.side,
            price = order.price,
            quantity = order.quantity,
            "order added to book"
        );
        Ok(true)
    }

    /// Removes a resting order: index lookup, O(1) unlink, slot release.
    /// Dropping the last order at a price drops the level.
    pub fn remove(&mut self, order_id: u64) -> bool {
        if order_id == 0 {
            return false;
        }
        let Some(location) = self.index.remove(order_id) else {
            return false;
        };

        let emptied = match location.side {
            Side::Buy => {
                let level = self
                    .bids
                    .get_mut(&location.price)
                    .expect("indexed order must have a level");
                level.unlink(&mut self.arena, location.slot);
                level.is_empty()
            }
            Side::Sell => {
                let level = self
                    .asks
                    .get_mut(&location.price)
                    .expect("indexed order must have a level");
                level.unlink(&mut self.arena, location.slot);
                level.is_empty()
            }
        };
        if emptied {
            match location.side {
                Side::Buy => self.bids.remove(&location.price),
                Side::Sell => self.asks.remove(&location.price),
            };
        }
        self.arena.release(location.slot);

        trace!(order_id, "order removed from book");
        true
    }

    /// Reconstructs a resting order from its slot. Resting orders are
    /// always limit/GTC; the quantity is the current remaining quantity.
    #[must_use]
    pub fn get(&self, order_id: u64) -> Option<Order> {
        let location = self.index.get(order_id)?;
        let slot = self.arena.get(location.slot);
        Some(Order {
            id: slot.id,
            timestamp: slot.timestamp,
            kind: OrderKind::Limit,
            side: slot.side,
            price: slot.price,
            quantity: slot.quantity,
            tif: TimeInForce::Gtc,
            client_id: slot.client_id,
            target_order_id: 0,
            new_price: 0,
            new_quantity: 0,
        })
    }

    /// Adjusts a resting order's quantity in place. `new_quantity == 0` is
    /// equivalent to [`Self::remove`]. Returns `false` when the ID is
    /// unknown.
    pub fn update_quantity(&mut self, order_id: u64, new_quantity: u64) -> bool {
        if new_quantity == 0 {
            return self.remove(order_id);
        }
        let Some(location) = self.index.get(order_id) else {
            return false;
        };
        let level = match location.side {
            Side::Buy => self.bids.get_mut(&location.price),
            Side::Sell => self.asks.get_mut(&location.price),
        };
        let level = level.expect("indexed order must have a level");
        level.set_quantity(&mut self.arena, location.slot, new_quantity);
        if level.is_saturated() {
            self.saturated = true;
        }
        true
    }

    /// Best (highest) bid price, if any. O(1).
    #[must_use]
    #[inline]
    pub fn best_bid(&self) -> Option<i64> {
        self.bids.last_key_value().map(|(price, _)| *price)
    }

    /// Best (lowest) ask price, if any. O(1).
    #[must_use]
    #[inline]
    pub fn best_ask(&self) -> Option<i64> {
        self.asks.first_key_value().map(|(price, _)| *price)
    }

    /// Quantity resting at the best bid, 0 when the side is empty.
    #[must_use]
    pub fn best_bid_quantity(&self) -> u64 {
        self.bids
            .last_key_value()
            .map_or(0, |(_, level)| level.total_quantity())
    }

    /// Quantity resting at the best ask, 0 when the side is empty.
    #[must_use]
    pub fn best_ask_quantity(&self) -> u64 {
        self.asks
            .first_key_value()
            .map_or(0, |(_, level)| level.total_quantity())
    }

    /// Total quantity resting at `price` on `side`, 0 when absent.
    #[must_use]
    pub fn quantity_at(&self, price: i64, side: Side) -> u64 {
        let level = match side {
            Side::Buy => self.bids.get(&price),
            Side::Sell => self.asks.get(&price),
        };
        level.map_or(0, PriceLevel::total_quantity)
    }

    /// Aggregate view of `price` on `side`, if the level exists.
    #[must_use]
    pub fn level(&self, price: i64, side: Side) -> Option<LevelView> {
        let level = match side {
            Side::Buy => self.bids.get(&price),
            Side::Sell => self.asks.get(&price),
        }?;
        Some(LevelView {
            price: level.price(),
            quantity: level.total_quantity(),
            orders: level.order_count(),
        })
    }

    /// Top `depth` levels of `side` in price-priority order.
    #[must_use]
    pub fn depth(&self, side: Side, depth: usize) -> Vec<LevelView> {
        let view = |level: &PriceLevel| LevelView {
            price: level.price(),
            quantity: level.total_quantity(),
            orders: level.order_count(),
        };
        match side {
            Side::Buy => self
                .bids
                .values()
                .rev()
                .take(depth)
                .map(view)
                .collect(),
            Side::Sell => self.asks.values().take(depth).map(view).collect(),
        }
    }

    /// `best_ask - best_bid`, absent when either side is empty.
    #[must_use]
    pub fn spread(&self) -> Option<i64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Midpoint of best bid and ask, absent when either side is empty.
    #[must_use]
    pub fn mid_price(&self) -> Option<i64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2),
            _ => None,
        }
    }

    #[must_use]
    #[inline]
    pub fn has_bids(&self) -> bool {
        !self.bids.is_empty()
    }

    #[must_use]
    #[inline]
    pub fn has_asks(&self) -> bool {
        !self.asks.is_empty()
    }

    /// Number of resting orders across both sides.
    #[must_use]
    #[inline]
    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    /// Number of distinct bid prices.
    #[must_use]
    #[inline]
    pub fn bid_level_count(&self) -> usize {
        self.bids.len()
    }

    /// Number of distinct ask prices.
    #[must_use]
    #[inline]
    pub fn ask_level_count(&self) -> usize {
        self.asks.len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// True when an order with this ID is resting.
    #[must_use]
    #[inline]
    pub fn contains(&self, order_id: u64) -> bool {
        self.index.contains(order_id)
    }

    /// True once any level's aggregate arithmetic saturated; the engine
    /// reports this as an internal error on the next dependent operation.
    #[must_use]
    #[inline]
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    /// Slots currently holding resting orders (equals `order_count`).
    #[must_use]
    pub fn pool_live_count(&self) -> usize {
        self.arena.live_count()
    }

    /// Total slots allocated by the pool so far.
    #[must_use]
    pub fn pool_allocated_count(&self) -> usize {
        self.arena.allocated_count()
    }

    /// Drops all levels and returns every slot to the arena.
    pub fn clear(&mut self) {
        let ids: Vec<u64> = self.index.iter().map(|(id, _)| id).collect();
        for id in ids {
            self.remove(id);
        }
        debug_assert!(self.bids.is_empty() && self.asks.is_empty());
    }
}
