//! Slot arena backing every resting order in the book.
//!
//! Resting orders live in a pre-allocated pool of [`OrderSlot`]s addressed by
//! index. Each slot carries the `prev`/`next` indices of the FIFO queue it is
//! linked into, so a price level can unlink any order in O(1) by handle
//! without owning heap nodes. [`NIL`] is the reserved "not linked" sentinel.
//!
//! Released slots are cleared and chained into a free list through their
//! `next` field; the ID index must drop its entry before a slot is released
//! so no stale handle can observe recycled contents.

use crate::orderbook::error::BookError;
use crate::types::Side;

/// Reserved index meaning "no slot".
pub(crate) const NIL: u32 = u32::MAX;

/// Default number of slots pre-allocated by [`Arena::new`].
pub(crate) const DEFAULT_POOL_CAPACITY: usize = 10_000;

/// One resting order, stored inline in the arena.
#[derive(Debug, Clone)]
pub(crate) struct OrderSlot {
    pub id: u64,
    pub client_id: u64,
    pub price: i64,
    pub quantity: u64,
    pub timestamp: u64,
    pub side: Side,
    /// FIFO linkage within the owning price level.
    pub prev: u32,
    pub next: u32,
    /// False while the slot sits on the free list.
    pub live: bool,
}

impl OrderSlot {
    fn vacant() -> Self {
        Self {
            id: 0,
            client_id: 0,
            price: 0,
            quantity: 0,
            timestamp: 0,
            side: Side::Buy,
            prev: NIL,
            next: NIL,
            live: false,
        }
    }

    /// Clears order data and linkage, leaving the slot safe to recycle.
    fn reset(&mut self) {
        *self = Self::vacant();
    }
}

/// Growable pool of [`OrderSlot`]s with an intrusive free list.
///
/// The pool doubles when exhausted and never shrinks within a session. A
/// hard cap can be set to surface exhaustion as [`BookError::ArenaExhausted`]
/// instead of unbounded growth.
#[derive(Debug)]
pub(crate) struct Arena {
    slots: Vec<OrderSlot>,
    free_head: u32,
    live_count: usize,
    max_slots: usize,
}

impl Arena {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut arena = Self {
            slots: Vec::new(),
            free_head: NIL,
            live_count: 0,
            max_slots: u32::MAX as usize - 1,
        };
        arena.grow(capacity.max(1));
        arena
    }

    /// Caps the total number of slots the arena will ever hold.
    pub fn set_max_slots(&mut self, max: usize) {
        self.max_slots = max.min(u32::MAX as usize - 1);
    }

    /// Takes a cleared slot off the free list, growing the pool if needed.
    pub fn acquire(&mut self) -> Result<u32, BookError> {
        if self.free_head == NIL {
            if self.slots.len() >= self.max_slots {
                return Err(BookError::ArenaExhausted {
                    capacity: self.slots.len(),
                });
            }
            let target = (self.slots.len() * 2).clamp(1, self.max_slots);
            self.grow(target - self.slots.len());
        }
        let idx = self.free_head;
        let slot = &mut self.slots[idx as usize];
        self.free_head = slot.next;
        slot.next = NIL;
        slot.live = true;
        self.live_count += 1;
        Ok(idx)
    }

    /// Returns a slot to the free list. The caller must already have
    /// unlinked it from its level and dropped the ID index entry.
    pub fn release(&mut self, idx: u32) {
        debug_assert!(self.slots[idx as usize].live, "double release of slot {idx}");
        let slot = &mut self.slots[idx as usize];
        slot.reset();
        slot.next = self.free_head;
        self.free_head = idx;
        self.live_count -= 1;
    }

    #[inline]
    pub fn get(&self, idx: u32) -> &OrderSlot {
        &self.slots[idx as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, idx: u32) -> &mut OrderSlot {
        &mut self.slots[idx as usize]
    }

    /// Number of slots currently holding a resting order.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Total slots ever allocated (live + free).
    #[inline]
    pub fn allocated_count(&self) -> usize {
        self.slots.len()
    }

    fn grow(&mut self, additional: usize) {
        let start = self.slots.len();
        self.slots.reserve_exact(additional);
        for i in 0..additional {
            let mut slot = OrderSlot::vacant();
            slot.next = self.free_head;
            self.free_head = (start + i) as u32;
            self.slots.push(slot);
        }
    }
}
