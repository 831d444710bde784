//! Slot arena with a free list.
//!
//! Released slots are reused before the arena grows. A presence bitmap over
//! the slots translates a slot into its index among the live slots, which is
//! the index a downstream observer sees.

use crate::bitmap::PresenceBitmap;
use alloc::vec::Vec;

/// An arena of reusable slots.
#[derive(Clone, Debug)]
pub struct BucketArena<B> {
    /// Slot storage, `None` for released slots
    slots: Vec<Option<B>>,
    /// Released slots, reused last-in first-out
    free: Vec<usize>,
    /// One bit per slot, set while the slot is live
    live: PresenceBitmap,
}

impl<B> Default for BucketArena<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> BucketArena<B> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: PresenceBitmap::new(),
        }
    }

    /// Returns the number of live slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Returns true if no slot is live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of slots ever allocated, live or released.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Stores `bucket` in a released slot if one exists, else in a new slot.
    pub fn allocate(&mut self, bucket: B) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(bucket);
                self.live.set(slot, true);
                slot
            }
            None => {
                self.slots.push(Some(bucket));
                self.live.push(true);
                self.slots.len() - 1
            }
        }
    }

    /// Releases a live slot and returns its bucket.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not live.
    pub fn release(&mut self, slot: usize) -> B {
        let bucket = match self.slots[slot].take() {
            Some(bucket) => bucket,
            None => panic!("slot {} is not live", slot),
        };
        self.live.set(slot, false);
        self.free.push(slot);
        bucket
    }

    /// Returns the bucket in a live slot.
    #[inline]
    pub fn get(&self, slot: usize) -> Option<&B> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    /// Returns the bucket in a live slot, mutably.
    #[inline]
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut B> {
        self.slots.get_mut(slot).and_then(|s| s.as_mut())
    }

    /// Returns true if `slot` is live.
    #[inline]
    pub fn is_live(&self, slot: usize) -> bool {
        slot < self.live.len() && self.live.get(slot)
    }

    /// Returns the index of `slot` among the live slots.
    #[inline]
    pub fn visible_index(&self, slot: usize) -> usize {
        self.live.count_before(slot)
    }

    /// Returns `(slot, bucket)` pairs for live slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &B)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, b)| b.as_ref().map(|b| (slot, b)))
    }

    /// Empties the arena and returns the live buckets in slot order.
    pub fn drain(&mut self) -> Vec<B> {
        let buckets = self.slots.drain(..).flatten().collect();
        self.free.clear();
        self.live.clear();
        buckets
    }
}
