//! Concurrent front-end: routing-key shards, per-shard serialization and
//! optional async post-trade fan-out.
//!
//! Each shard owns an independent `(engine, risk gate, P&L tracker)`
//! quartet behind its own mutex. Orders route to `key mod N` where `key`
//! is the client ID when non-zero, else the order ID. Cross-shard matching
//! is not supported: the routing key must place all orders that may match
//! into the same shard, which is a caller responsibility.

mod shard;
mod workers;

#[cfg(test)]
mod tests;

pub use shard::Shard;
pub use workers::{PostTradeWorkers, TradeBatchHandler};

use crate::types::{ExecutionResult, Order, RejectReason};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Processing mode of the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One shard, synchronous callbacks.
    SingleThreaded,
    /// Multiple independent shards, batch submission in parallel.
    Sharded,
    /// One shard; trade batches are fanned out to a worker pool.
    AsyncCallbacks,
}

/// Thread-safe matching front-end over one or more shards.
pub struct ConcurrentEngine {
    shards: Vec<Mutex<Shard>>,
    fanout: Option<PostTradeWorkers>,
    orders_processed: AtomicU64,
    trade_count: AtomicU64,
    total_volume: AtomicU64,
}

impl Default for ConcurrentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConcurrentEngine {
    /// Single-threaded mode: one shard, no fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::with_shards(1)
    }

    /// Sharded mode with `shard_count` independent quartets.
    #[must_use]
    pub fn with_shards(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count).map(|_| Mutex::new(Shard::new())).collect(),
            fanout: None,
            orders_processed: AtomicU64::new(0),
            trade_count: AtomicU64::new(0),
            total_volume: AtomicU64::new(0),
        }
    }

    /// Async-callback mode: single-shard matching, `on_trade` batches
    /// published to a worker pool of `worker_count` threads.
    #[must_use]
    pub fn with_async_fanout(worker_count: usize, handler: TradeBatchHandler) -> Self {
        let mut engine = Self::with_shards(1);
        engine.fanout = Some(PostTradeWorkers::new(worker_count, handler));
        engine
    }

    /// The active processing mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        if self.fanout.is_some() {
            Mode::AsyncCallbacks
        } else if self.shards.len() > 1 {
            Mode::Sharded
        } else {
            Mode::SingleThreaded
        }
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Direct access to a shard (for wiring listeners, limits, or
    /// inspection). Indexing is `index mod shard_count`.
    #[must_use]
    pub fn shard(&self, index: usize) -> &Mutex<Shard> {
        &self.shards[index % self.shards.len()]
    }

    /// Toggles the pre-trade risk gate on every shard.
    pub fn set_risk_checks_enabled(&self, enabled: bool) {
        for shard in &self.shards {
            if let Ok(mut shard) = shard.lock() {
                shard.risk_checks_enabled = enabled;
            }
        }
    }

    /// Orders submitted through this front-end.
    #[must_use]
    pub fn orders_processed(&self) -> u64 {
        self.orders_processed.load(Ordering::Relaxed)
    }

    /// Trades executed across all shards.
    #[must_use]
    pub fn trade_count(&self) -> u64 {
        self.trade_count.load(Ordering::Relaxed)
    }

    /// Quantity traded across all shards.
    #[must_use]
    pub fn total_volume(&self) -> u64 {
        self.total_volume.load(Ordering::Relaxed)
    }

    /// Resting orders across all shards.
    #[must_use]
    pub fn total_order_count(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .lock()
                    .map(|shard| shard.engine.book().order_count())
                    .unwrap_or(0)
            })
            .sum()
    }

    /// Routing key: client ID when non-zero, else order ID.
    fn route(&self, order: &Order) -> usize {
        let key = if order.client_id != 0 {
            order.client_id
        } else {
            order.id
        };
        (key % self.shards.len() as u64) as usize
    }

    /// Submits one order to its shard (thread-safe).
    pub fn submit(&self, order: Order) -> ExecutionResult {
        let shard_index = self.route(&order);
        self.submit_on_shard(shard_index, order)
    }

    /// Cancels by explicit routing key (`client_id` of the original order,
    /// or the order ID itself when the client is anonymous).
    pub fn cancel(&self, order_id: u64, routing_key: u64) -> ExecutionResult {
        let key = if routing_key != 0 { routing_key } else { order_id };
        let shard_index = (key % self.shards.len() as u64) as usize;
        match self.shards[shard_index].lock() {
            Ok(mut shard) => {
                self.orders_processed.fetch_add(1, Ordering::Relaxed);
                shard.engine.cancel(order_id)
            }
            Err(_) => {
                warn!(shard_index, "shard poisoned; cancel rejected");
                ExecutionResult::rejection(order_id, RejectReason::InternalError)
            }
        }
    }

    /// Submits a batch: orders are grouped by shard and the groups run in
    /// parallel, one scoped thread per non-empty shard. Results come back
    /// in input order. Within a shard, submission order is preserved.
    pub fn submit_batch(&self, orders: Vec<Order>) -> Vec<ExecutionResult> {
        let order_count = orders.len();
        let mut groups: Vec<Vec<(usize, Order)>> =
            (0..self.shards.len()).map(|_| Vec::new()).collect();
        for (position, order) in orders.into_iter().enumerate() {
            let shard_index = self.route(&order);
            groups[shard_index].push((position, order));
        }

        let mut results: Vec<Option<ExecutionResult>> = Vec::new();
        results.resize_with(order_count, || None);

        std::thread::scope(|scope| {
            let mut handles = Vec::new();
            for (shard_index, group) in groups.into_iter().enumerate() {
                if group.is_empty() {
                    continue;
                }
                handles.push(scope.spawn(move || {
                    let mut outcomes = Vec::with_capacity(group.len());
                    for (position, order) in group {
                        outcomes.push((position, self.submit_on_shard(shard_index, order)));
                    }
                    outcomes
                }));
            }
            for handle in handles {
                match handle.join() {
                    Ok(outcomes) => {
                        for (position, result) in outcomes {
                            results[position] = Some(result);
                        }
                    }
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
        });

        results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|| {
                    // Every position was grouped exactly once.
                    unreachable!("batch slot left unfilled")
                })
            })
            .collect()
    }

    /// Blocks until all queued post-trade batches are handled. No-op
    /// outside async-callback mode.
    pub fn wait_all(&self) {
        if let Some(fanout) = &self.fanout {
            fanout.wait_all();
        }
    }

    /// Terminal shutdown: drains pending fan-out work. Callers must ensure
    /// no new submissions race with shutdown.
    pub fn shutdown(&mut self) {
        if let Some(fanout) = &mut self.fanout {
            fanout.shutdown();
        }
        debug!("concurrent engine shut down");
    }

    fn submit_on_shard(&self, shard_index: usize, order: Order) -> ExecutionResult {
        let order_id = order.id;
        let result = match self.shards[shard_index].lock() {
            Ok(mut shard) => shard.process(order),
            Err(_) => {
                warn!(shard_index, "shard poisoned; submission rejected");
                return ExecutionResult::rejection(order_id, RejectReason::InternalError);
            }
        };

        self.orders_processed.fetch_add(1, Ordering::Relaxed);
        if !result.trades.is_empty() {
            self.trade_count
                .fetch_add(result.trades.len() as u64, Ordering::Relaxed);
            let volume: u64 = result.trades.iter().map(|trade| trade.quantity).sum();
            self.total_volume.fetch_add(volume, Ordering::Relaxed);

            if let Some(fanout) = &self.fanout {
                // Owned copies cross the thread boundary, never borrows.
                fanout.dispatch(result.trades.clone());
            }
        }
        result
    }
}
