//! Order book error types.
//!
//! These are system-level failures, fatal to the owning shard. Order-level
//! rejects (bad price, duplicate ID seen by the engine, etc.) are not errors
//! at this layer; they travel as data in
//! [`ExecutionResult`](crate::types::ExecutionResult).

use thiserror::Error;

/// Errors surfaced by the book's own data structures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BookError {
    /// The slot arena hit its hard cap and refused to grow.
    #[error("order arena exhausted at {capacity} slots")]
    ArenaExhausted {
        /// Number of slots allocated when growth was refused.
        capacity: usize,
    },

    /// An order ID already present in the index was inserted again.
    #[error("duplicate order id {order_id}")]
    DuplicateOrderId {
        /// The offending order ID.
        order_id: u64,
    },

    /// Aggregate level quantity saturated; book state is suspect.
    #[error("price level quantity saturated at price {price}")]
    QuantitySaturated {
        /// Price of the saturated level.
        price: i64,
    },
}
