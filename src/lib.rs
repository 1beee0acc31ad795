//! # Matchbook: a single-symbol limit order book matching engine
//!
//! An in-memory matching engine with price-time priority, together with the
//! runtime needed to exercise it under realistic conditions: a pre-trade
//! risk gate, a FIFO position-and-P&L tracker, a strategy dispatch layer
//! and a sharded concurrent front-end.
//!
//! ## Architecture
//!
//! - [`orderbook`]: two price-ordered sides over a slot arena with an O(1)
//!   order-ID index; O(1) unlink by handle, levels created and destroyed on
//!   demand.
//! - [`engine`]: validation, limit/market/cancel/modify dispatch,
//!   GTC/IOC/FOK semantics, self-trade prevention (skip-and-continue) and a
//!   precise reject taxonomy. Trades always execute at the resting price.
//! - [`risk`]: ordered pre-trade checks (quantity, value, open orders,
//!   position, exposure, daily loss, order rate) with per-client limit
//!   overrides; cancels and modifies bypass the gate.
//! - [`pnl`]: FIFO lot matching for realized P&L, mark-to-market for
//!   unrealized, snapshot stream per `(client, trade)` event.
//! - [`strategy`]: the strategy capability trait, two reference
//!   strategies, and the dispatcher correlating fills back to strategies.
//! - [`concurrent`]: routing-key shards (one `(engine, risk, P&L)`
//!   quartet per shard, serialized by a per-shard mutex) and an optional
//!   async post-trade worker pool.
//! - [`io`]: CSV order ingest plus trade / execution-report / risk-event
//!   / P&L snapshot writers.
//!
//! ## Design rules
//!
//! - Prices and quantities are exact integers; monetary accumulators use
//!   `i128` where products could overflow.
//! - Engine timestamps, trade IDs and snapshot IDs are monotone logical
//!   counters per engine/tracker, never wall-clock time.
//! - Order-level rejects are data ([`types::ExecutionResult`] with a
//!   [`types::RejectReason`]); only system-level failures (arena
//!   exhaustion, saturated aggregates) are errors, and they are fatal to
//!   the owning shard.
//! - Containers are single-threaded; all synchronization lives at the
//!   shard boundary.
//!
//! ## Example
//!
//! ```
//! use matchbook_rs::prelude::*;
//!
//! let mut engine = MatchingEngine::new();
//! engine.submit(Order::limit(1, Side::Sell, 100, 50));
//! let result = engine.submit(Order::limit(2, Side::Buy, 100, 50));
//! assert_eq!(result.status, ExecutionStatus::Filled);
//! assert_eq!(result.trades[0].price, 100);
//! ```

pub mod concurrent;
pub mod engine;
pub mod io;
pub mod orderbook;
pub mod pnl;
pub mod prelude;
pub mod risk;
pub mod strategy;
pub mod types;

pub use engine::MatchingEngine;
pub use orderbook::{BookError, OrderBook};
pub use types::{ExecutionResult, ExecutionStatus, Order, RejectReason, Side, TimeInForce, Trade};
