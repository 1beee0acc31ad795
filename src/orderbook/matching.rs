//! Price-time priority matching walk over the book.
//!
//! The book produces raw [`Fill`] records; trade numbering, timestamps and
//! observer notification belong to the engine layer. Fills are always priced
//! at the resting order's level, so price improvement accrues to the
//! aggressor.

use super::arena::NIL;
use super::book::OrderBook;
use crate::types::Side;
use std::ops::Bound;

/// One maker consumed (fully or partially) by an incoming order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fill {
    /// Resting order that provided the liquidity.
    pub maker_order_id: u64,
    /// The resting level's price.
    pub price: i64,
    /// Quantity executed against this maker.
    pub quantity: u64,
}

impl OrderBook {
    /// Matches `quantity` of an incoming `taker_side` order against the
    /// opposite side, appending one [`Fill`] per maker segment.
    ///
    /// Levels are visited strictly best-first; within a level the FIFO is
    /// consumed front to back. Resting orders owned by `taker_client`
    /// (non-zero) are skipped and left untouched; a level consisting only
    /// of skipped orders does not stop the walk, the next level is
    /// considered as long as it stays acceptable under `limit_price`
    /// (`None` accepts every level, i.e. a market order).
    ///
    /// Returns the total quantity filled.
    pub(crate) fn match_against(
        &mut self,
        taker_side: Side,
        quantity: u64,
        limit_price: Option<i64>,
        taker_client: u64,
        fills: &mut Vec<Fill>,
    ) -> u64 {
        let mut remaining = quantity;
        // Price of the last level visited; levels at or inside it are
        // either consumed, emptied, or blocked by self-trade prevention.
        let mut cursor: Option<i64> = None;

        while remaining > 0 {
            let price = match (taker_side, cursor) {
                (Side::Buy, None) => self.best_ask(),
                (Side::Buy, Some(c)) => self
                    .asks
                    .range((Bound::Excluded(c), Bound::Unbounded))
                    .next()
                    .map(|(price, _)| *price),
                (Side::Sell, None) => self.best_bid(),
                (Side::Sell, Some(c)) => self
                    .bids
                    .range((Bound::Unbounded, Bound::Excluded(c)))
                    .next_back()
                    .map(|(price, _)| *price),
            };
            let Some(price) = price else { break };

            if let Some(limit) = limit_price {
                match taker_side {
                    Side::Buy if price > limit => break,
                    Side::Sell if price < limit => break,
                    _ => {}
                }
            }

            remaining = self.match_level(taker_side, price, remaining, taker_client, fills);
            cursor = Some(price);
        }

        quantity - remaining
    }

    /// Consumes the FIFO at one price, front to back, skipping the taker's
    /// own orders. Returns the remaining taker quantity.
    fn match_level(
        &mut self,
        taker_side: Side,
        price: i64,
        mut remaining: u64,
        taker_client: u64,
        fills: &mut Vec<Fill>,
    ) -> u64 {
        let mut cursor = {
            let level = match taker_side {
                Side::Buy => self.asks.get(&price),
                Side::Sell => self.bids.get(&price),
            };
            match level.and_then(super::level::PriceLevel::front) {
                Some(front) => front,
                None => return remaining,
            }
        };

        while cursor != NIL && remaining > 0 {
            let (next, maker_id, maker_client, maker_quantity) = {
                let slot = self.arena.get(cursor);
                (slot.next, slot.id, slot.client_id, slot.quantity)
            };

            if taker_client != 0 && maker_client == taker_client {
                // Self-trade prevention: skip and keep walking the FIFO.
                cursor = next;
                continue;
            }

            let fill_quantity = remaining.min(maker_quantity);
            fills.push(Fill {
                maker_order_id: maker_id,
                price,
                quantity: fill_quantity,
            });
            remaining -= fill_quantity;

            if fill_quantity == maker_quantity {
                self.remove(maker_id);
            } else {
                self.update_quantity(maker_id, maker_quantity - fill_quantity);
            }

            cursor = next;
        }

        remaining
    }

    /// Depth walk without side effects: how much of `quantity` could fill
    /// right now at acceptable levels. Used by the fill-or-kill pre-check.
    ///
    /// Quantity resting for `taker_client` is excluded, since matching
    /// would skip it.
    #[must_use]
    pub(crate) fn peek_match(
        &self,
        taker_side: Side,
        quantity: u64,
        limit_price: Option<i64>,
        taker_client: u64,
    ) -> u64 {
        let mut matched = 0u64;

        let mut visit = |price: i64, level: &super::level::PriceLevel| -> bool {
            if matched >= quantity {
                return false;
            }
            if let Some(limit) = limit_price {
                match taker_side {
                    Side::Buy if price > limit => return false,
                    Side::Sell if price < limit => return false,
                    _ => {}
                }
            }
            let available = if taker_client == 0 {
                level.total_quantity()
            } else {
                level
                    .iter(&self.arena)
                    .filter(|&idx| self.arena.get(idx).client_id != taker_client)
                    .map(|idx| self.arena.get(idx).quantity)
                    .fold(0u64, u64::saturating_add)
            };
            matched = matched.saturating_add(available);
            true
        };

        match taker_side {
            Side::Buy => {
                for (price, level) in &self.asks {
                    if !visit(*price, level) {
                        break;
                    }
                }
            }
            Side::Sell => {
                for (price, level) in self.bids.iter().rev() {
                    if !visit(*price, level) {
                        break;
                    }
                }
            }
        }

        matched.min(quantity)
    }
}
