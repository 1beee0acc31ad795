//! Position and P&L tracking: FIFO lot matching for realized P&L,
//! mark-to-market for unrealized.
//!
//! Each client carries two lot queues, `open_longs` and `open_shorts`; at
//! most one is ever non-empty because buying always covers shorts before
//! opening longs and selling always closes longs before opening shorts.
//! Monetary accumulators are `i128` so `price x quantity` products cannot
//! overflow.
//!
//! Not internally thread-safe; each shard owns its own tracker.

use crate::types::Trade;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::trace;

/// One opening fill awaiting a closing fill (FIFO).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpenLot {
    /// Remaining open quantity of this lot.
    pub quantity: u64,
    /// Entry price.
    pub price: i64,
    /// Trade that opened the lot.
    pub trade_id: u64,
    /// Timestamp of the opening trade.
    pub timestamp: u64,
}

/// Complete P&L state for one client.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientPnl {
    /// Client this record belongs to.
    pub client_id: u64,

    /// Total long quantity held.
    pub long_quantity: i64,
    /// Total short quantity held.
    pub short_quantity: i64,
    /// `long - short`.
    pub net_position: i64,

    /// Total cost of all buys.
    pub total_buy_cost: i128,
    /// Total proceeds from all sells.
    pub total_sell_proceeds: i128,
    /// Cost basis of the current long position.
    pub long_cost_basis: i128,
    /// Cost basis of the current short position.
    pub short_cost_basis: i128,

    /// Realized P&L from closed lots.
    pub realized_pnl: i128,
    /// Mark-to-market P&L on open lots.
    pub unrealized_pnl: i128,
    /// `realized + unrealized`.
    pub total_pnl: i128,

    /// Number of fills this client participated in.
    pub total_trades: u64,
    /// Total quantity bought.
    pub total_buy_quantity: u64,
    /// Total quantity sold.
    pub total_sell_quantity: u64,
    /// Closing segments with positive P&L.
    pub winning_trades: u64,
    /// Closing segments with negative P&L.
    pub losing_trades: u64,
    /// Average buy price across all buys.
    pub avg_buy_price: i64,
    /// Average sell price across all sells.
    pub avg_sell_price: i64,
    /// Volume-weighted entry price of the open position.
    pub vwap_position: i64,

    /// Open long lots, oldest first.
    pub open_longs: VecDeque<OpenLot>,
    /// Open short lots, oldest first.
    pub open_shorts: VecDeque<OpenLot>,
}

impl ClientPnl {
    fn refresh_derived_fields(&mut self) {
        self.net_position = self.long_quantity - self.short_quantity;
        self.total_pnl = self.realized_pnl + self.unrealized_pnl;

        self.avg_buy_price = if self.total_buy_quantity > 0 {
            (self.total_buy_cost / i128::from(self.total_buy_quantity)) as i64
        } else {
            0
        };
        self.avg_sell_price = if self.total_sell_quantity > 0 {
            (self.total_sell_proceeds / i128::from(self.total_sell_quantity)) as i64
        } else {
            0
        };
        self.vwap_position = if self.long_quantity > 0 && self.long_cost_basis != 0 {
            (self.long_cost_basis / i128::from(self.long_quantity)) as i64
        } else if self.short_quantity > 0 && self.short_cost_basis != 0 {
            (self.short_cost_basis / i128::from(self.short_quantity)) as i64
        } else {
            0
        };
    }
}

/// Point-in-time P&L record, one per `(client, trade)` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PnlSnapshot {
    /// Monotone per-tracker snapshot identifier.
    pub snapshot_id: u64,
    /// Tracker-local logical timestamp.
    pub timestamp: u64,
    /// Client this snapshot describes.
    pub client_id: u64,
    /// `long - short`.
    pub net_position: i64,
    /// Long quantity held.
    pub long_quantity: i64,
    /// Short quantity held.
    pub short_quantity: i64,
    /// Realized P&L.
    pub realized_pnl: i128,
    /// Unrealized P&L at `mark_price`.
    pub unrealized_pnl: i128,
    /// `realized + unrealized`.
    pub total_pnl: i128,
    /// Mark price used for the unrealized leg.
    pub mark_price: i64,
    /// Cost basis of the open position (`long - short` basis).
    pub cost_basis: i128,
    /// Volume-weighted entry price of the open position.
    pub avg_entry_price: i64,
    /// Trade that triggered this snapshot (0 for forced snapshots).
    pub trade_id: u64,
}

/// Observer for every snapshot the tracker emits.
pub type PnlListener = Arc<dyn Fn(&PnlSnapshot) + Send + Sync>;

/// FIFO realized / mark-to-market unrealized P&L tracker.
pub struct PnlTracker {
    clients: HashMap<u64, ClientPnl>,
    snapshot_id_counter: u64,
    timestamp_counter: u64,
    last_traded_price: i64,
    listener: Option<PnlListener>,
}

impl Default for PnlTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PnlTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PnlTracker")
            .field("clients", &self.clients.len())
            .field("snapshots", &self.snapshot_id_counter)
            .finish_non_exhaustive()
    }
}

impl PnlTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            snapshot_id_counter: 0,
            timestamp_counter: 0,
            last_traded_price: 0,
            listener: None,
        }
    }

    /// Registers the snapshot observer.
    pub fn set_listener(&mut self, listener: PnlListener) {
        self.listener = Some(listener);
    }

    /// P&L state for a client (default when unseen).
    #[must_use]
    pub fn client(&self, client_id: u64) -> ClientPnl {
        self.clients.get(&client_id).cloned().unwrap_or(ClientPnl {
            client_id,
            ..ClientPnl::default()
        })
    }

    /// All tracked clients, unordered.
    pub fn clients(&self) -> impl Iterator<Item = &ClientPnl> {
        self.clients.values()
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn last_traded_price(&self) -> i64 {
        self.last_traded_price
    }

    /// Applies one trade to both counterparties, emitting a snapshot per
    /// non-zero client. A non-positive `mark_price` falls back to the
    /// trade price.
    pub fn on_trade(
        &mut self,
        trade: &Trade,
        buy_client_id: u64,
        sell_client_id: u64,
        mark_price: i64,
    ) -> Vec<PnlSnapshot> {
        let mark_price = if mark_price > 0 { mark_price } else { trade.price };
        self.last_traded_price = trade.price;

        let mut snapshots = Vec::with_capacity(2);
        if buy_client_id != 0 {
            self.apply_buy(buy_client_id, trade, mark_price);
            snapshots.push(self.emit_snapshot(buy_client_id, mark_price, trade.trade_id));
        }
        if sell_client_id != 0 {
            self.apply_sell(sell_client_id, trade, mark_price);
            snapshots.push(self.emit_snapshot(sell_client_id, mark_price, trade.trade_id));
        }
        snapshots
    }

    fn apply_buy(&mut self, client_id: u64, trade: &Trade, mark_price: i64) {
        let pnl = self.clients.entry(client_id).or_insert_with(|| ClientPnl {
            client_id,
            ..ClientPnl::default()
        });

        let trade_value = i128::from(trade.price) * i128::from(trade.quantity);
        pnl.total_buy_cost += trade_value;
        pnl.total_buy_quantity += trade.quantity;
        pnl.total_trades += 1;

        // Cover open shorts first (FIFO), then open a long with the rest.
        let mut remaining = trade.quantity;
        while remaining > 0
            && let Some(front) = pnl.open_shorts.front_mut()
        {
            let close_quantity = remaining.min(front.quantity);
            let segment_pnl =
                i128::from(front.price - trade.price) * i128::from(close_quantity);
            pnl.realized_pnl += segment_pnl;
            if segment_pnl > 0 {
                pnl.winning_trades += 1;
            } else if segment_pnl < 0 {
                pnl.losing_trades += 1;
            }

            pnl.short_quantity -= close_quantity as i64;
            pnl.short_cost_basis -= i128::from(front.price) * i128::from(close_quantity);
            front.quantity -= close_quantity;
            remaining -= close_quantity;
            if front.quantity == 0 {
                pnl.open_shorts.pop_front();
            }
        }

        if remaining > 0 {
            pnl.long_quantity += remaining as i64;
            pnl.long_cost_basis += i128::from(trade.price) * i128::from(remaining);
            pnl.open_longs.push_back(OpenLot {
                quantity: remaining,
                price: trade.price,
                trade_id: trade.trade_id,
                timestamp: trade.timestamp,
            });
        }

        pnl.unrealized_pnl = Self::unrealized(pnl, mark_price);
        pnl.refresh_derived_fields();
        trace!(client_id, realized = %pnl.realized_pnl, "buy applied");
    }

    fn apply_sell(&mut self, client_id: u64, trade: &Trade, mark_price: i64) {
        let pnl = self.clients.entry(client_id).or_insert_with(|| ClientPnl {
            client_id,
            ..ClientPnl::default()
        });

        let trade_value = i128::from(trade.price) * i128::from(trade.quantity);
        pnl.total_sell_proceeds += trade_value;
        pnl.total_sell_quantity += trade.quantity;
        pnl.total_trades += 1;

        // Close open longs first (FIFO), then open a short with the rest.
        let mut remaining = trade.quantity;
        while remaining > 0
            && let Some(front) = pnl.open_longs.front_mut()
        {
            let close_quantity = remaining.min(front.quantity);
            let segment_pnl =
                i128::from(trade.price - front.price) * i128::from(close_quantity);
            pnl.realized_pnl += segment_pnl;
            if segment_pnl > 0 {
                pnl.winning_trades += 1;
            } else if segment_pnl < 0 {
                pnl.losing_trades += 1;
            }

            pnl.long_quantity -= close_quantity as i64;
            pnl.long_cost_basis -= i128::from(front.price) * i128::from(close_quantity);
            front.quantity -= close_quantity;
            remaining -= close_quantity;
            if front.quantity == 0 {
                pnl.open_longs.pop_front();
            }
        }

        if remaining > 0 {
            pnl.short_quantity += remaining as i64;
            pnl.short_cost_basis += i128::from(trade.price) * i128::from(remaining);
            pnl.open_shorts.push_back(OpenLot {
                quantity: remaining,
                price: trade.price,
                trade_id: trade.trade_id,
                timestamp: trade.timestamp,
            });
        }

        pnl.unrealized_pnl = Self::unrealized(pnl, mark_price);
        pnl.refresh_derived_fields();
        trace!(client_id, realized = %pnl.realized_pnl, "sell applied");
    }

    /// `long_qty x mark - long_basis + short_basis - short_qty x mark`.
    /// Both legs contribute independently; in practice at most one is
    /// non-zero.
    fn unrealized(pnl: &ClientPnl, mark_price: i64) -> i128 {
        let mut unrealized = 0i128;
        if pnl.long_quantity > 0 {
            unrealized +=
                i128::from(mark_price) * i128::from(pnl.long_quantity) - pnl.long_cost_basis;
        }
        if pnl.short_quantity > 0 {
            unrealized +=
                pnl.short_cost_basis - i128::from(mark_price) * i128::from(pnl.short_quantity);
        }
        unrealized
    }

    /// Re-marks one client; returns the refreshed unrealized P&L.
    pub fn update_mark_to_market(&mut self, client_id: u64, mark_price: i64) -> i128 {
        let Some(pnl) = self.clients.get_mut(&client_id) else {
            return 0;
        };
        pnl.unrealized_pnl = Self::unrealized(pnl, mark_price);
        pnl.refresh_derived_fields();
        pnl.unrealized_pnl
    }

    /// Re-marks every client.
    pub fn update_all_mark_to_market(&mut self, mark_price: i64) {
        for pnl in self.clients.values_mut() {
            pnl.unrealized_pnl = Self::unrealized(pnl, mark_price);
            pnl.refresh_derived_fields();
        }
    }

    /// Builds (and numbers) a snapshot without emitting it to the listener.
    pub fn snapshot(&mut self, client_id: u64, mark_price: i64, trade_id: u64) -> PnlSnapshot {
        self.snapshot_id_counter += 1;
        self.timestamp_counter += 1;
        let pnl = self.client(client_id);
        PnlSnapshot {
            snapshot_id: self.snapshot_id_counter,
            timestamp: self.timestamp_counter,
            client_id,
            net_position: pnl.net_position,
            long_quantity: pnl.long_quantity,
            short_quantity: pnl.short_quantity,
            realized_pnl: pnl.realized_pnl,
            unrealized_pnl: pnl.unrealized_pnl,
            total_pnl: pnl.total_pnl,
            mark_price,
            cost_basis: pnl.long_cost_basis - pnl.short_cost_basis,
            avg_entry_price: pnl.vwap_position,
            trade_id,
        }
    }

    /// Snapshots every client at `mark_price` (trade ID 0), notifying the
    /// listener for each.
    pub fn snapshot_all(&mut self, mark_price: i64) -> Vec<PnlSnapshot> {
        self.update_all_mark_to_market(mark_price);
        let ids: Vec<u64> = self.clients.keys().copied().collect();
        ids.into_iter()
            .map(|client_id| self.emit_snapshot(client_id, mark_price, 0))
            .collect()
    }

    /// Drops all state and restarts the snapshot numbering.
    pub fn reset(&mut self) {
        self.clients.clear();
        self.snapshot_id_counter = 0;
        self.timestamp_counter = 0;
        self.last_traded_price = 0;
    }

    fn emit_snapshot(&mut self, client_id: u64, mark_price: i64, trade_id: u64) -> PnlSnapshot {
        let snapshot = self.snapshot(client_id, mark_price, trade_id);
        if let Some(listener) = &self.listener {
            listener(&snapshot);
        }
        snapshot
    }
}
