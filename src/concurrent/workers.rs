//! Post-trade worker pool: off-critical-path fan-out for trade batches.
//!
//! Trades are moved (owned, never borrowed) into a crossbeam channel and
//! handled by a small fixed pool of worker threads. `wait_all` blocks until
//! every queued batch has been handled; dropping the pool drains pending
//! work before joining the workers.

use crate::types::Trade;
use crossbeam::channel::{Receiver, Sender, unbounded};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tracing::debug;

/// Handler invoked on a worker thread with an owned trade batch.
pub type TradeBatchHandler = Arc<dyn Fn(Vec<Trade>) + Send + Sync>;

#[derive(Default)]
struct Pending {
    count: Mutex<u64>,
    drained: Condvar,
}

/// Fixed-size worker pool consuming trade batches.
pub struct PostTradeWorkers {
    sender: Option<Sender<Vec<Trade>>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<Pending>,
    batches_processed: Arc<AtomicU64>,
}

impl PostTradeWorkers {
    /// Spawns `worker_count` threads (at least one) running `handler`.
    #[must_use]
    pub fn new(worker_count: usize, handler: TradeBatchHandler) -> Self {
        let worker_count = worker_count.max(1);
        let (sender, receiver): (Sender<Vec<Trade>>, Receiver<Vec<Trade>>) = unbounded();
        let pending = Arc::new(Pending::default());
        let batches_processed = Arc::new(AtomicU64::new(0));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let receiver = receiver.clone();
            let handler = Arc::clone(&handler);
            let pending = Arc::clone(&pending);
            let batches_processed = Arc::clone(&batches_processed);
            workers.push(
                std::thread::Builder::new()
                    .name(format!("post-trade-{worker_id}"))
                    .spawn(move || {
                        while let Ok(batch) = receiver.recv() {
                            handler(batch);
                            batches_processed.fetch_add(1, Ordering::Relaxed);
                            let mut count = pending.count.lock().unwrap();
                            *count -= 1;
                            if *count == 0 {
                                pending.drained.notify_all();
                            }
                        }
                    })
                    .expect("spawn post-trade worker"),
            );
        }

        Self {
            sender: Some(sender),
            workers,
            pending,
            batches_processed,
        }
    }

    /// Queues an owned trade batch; returns immediately.
    pub fn dispatch(&self, trades: Vec<Trade>) {
        if trades.is_empty() {
            return;
        }
        if let Some(sender) = &self.sender {
            {
                let mut count = self.pending.count.lock().unwrap();
                *count += 1;
            }
            // Receivers outlive the sender; send only fails after shutdown.
            if sender.send(trades).is_err() {
                let mut count = self.pending.count.lock().unwrap();
                *count -= 1;
            }
        }
    }

    /// Blocks until every queued batch has been handled.
    pub fn wait_all(&self) {
        let mut count = self.pending.count.lock().unwrap();
        while *count > 0 {
            count = self.pending.drained.wait(count).unwrap();
        }
    }

    /// Batches handled so far.
    #[must_use]
    pub fn batches_processed(&self) -> u64 {
        self.batches_processed.load(Ordering::Relaxed)
    }

    /// Drains pending work and joins the workers. Callers must ensure no
    /// new dispatches race with shutdown.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_some() {
            self.wait_all();
            for worker in self.workers.drain(..) {
                let _ = worker.join();
            }
            debug!("post-trade workers shut down");
        }
    }
}

impl Drop for PostTradeWorkers {
    fn drop(&mut self) {
        self.shutdown();
    }
}
