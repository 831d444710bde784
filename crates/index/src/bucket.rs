//! Bucket table: keyed buckets stored in a slot arena.
//!
//! Lookups pre-check the key hash, then confirm with the table's
//! `KeyEquality` over the live slots sharing that hash.

use crate::arena::BucketArena;
use crate::equality::{DefaultEquality, KeyEquality};
use alloc::vec::Vec;
use hashbrown::HashMap;

#[derive(Debug)]
struct Entry<K, B> {
    key: K,
    hash: u64,
    bucket: B,
}

/// Keyed buckets with slot reuse.
pub struct BucketTable<K, B, E = DefaultEquality> {
    /// Bucket slots
    arena: BucketArena<Entry<K, B>>,
    /// Key hash -> live slots with that hash
    by_hash: HashMap<u64, Vec<usize>>,
    equality: E,
}

impl<K, B> Default for BucketTable<K, B, DefaultEquality> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, B> BucketTable<K, B, DefaultEquality> {
    /// Creates an empty table using `Eq` and `Hash` on keys.
    pub fn new() -> Self {
        Self::with_equality(DefaultEquality::new())
    }
}

impl<K, B, E> BucketTable<K, B, E> {
    /// Creates an empty table with a custom key equality.
    pub fn with_equality(equality: E) -> Self {
        Self {
            arena: BucketArena::new(),
            by_hash: HashMap::new(),
            equality,
        }
    }

    /// Returns the number of live buckets.
    #[inline]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns true if there are no live buckets.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Returns the number of slots ever allocated.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Returns the bucket in `slot`.
    #[inline]
    pub fn get(&self, slot: usize) -> Option<&B> {
        self.arena.get(slot).map(|e| &e.bucket)
    }

    /// Returns the bucket in `slot`, mutably.
    #[inline]
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut B> {
        self.arena.get_mut(slot).map(|e| &mut e.bucket)
    }

    /// Returns the key of the bucket in `slot`.
    #[inline]
    pub fn key(&self, slot: usize) -> Option<&K> {
        self.arena.get(slot).map(|e| &e.key)
    }

    /// Returns the index of `slot` among the live buckets.
    #[inline]
    pub fn visible_index(&self, slot: usize) -> usize {
        self.arena.visible_index(slot)
    }

    /// Returns `(slot, key, bucket)` for live buckets in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &K, &B)> + '_ {
        self.arena.iter().map(|(slot, e)| (slot, &e.key, &e.bucket))
    }

    /// Removes every bucket and returns them in slot order.
    pub fn drain(&mut self) -> Vec<(K, B)> {
        self.by_hash.clear();
        self.arena
            .drain()
            .into_iter()
            .map(|e| (e.key, e.bucket))
            .collect()
    }

    /// Removes the bucket in `slot` and frees the slot for reuse.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not live.
    pub fn remove(&mut self, slot: usize) -> (K, B) {
        let entry = self.arena.release(slot);
        if let Some(slots) = self.by_hash.get_mut(&entry.hash) {
            slots.retain(|&s| s != slot);
            if slots.is_empty() {
                self.by_hash.remove(&entry.hash);
            }
        }
        (entry.key, entry.bucket)
    }
}

impl<K, B, E: KeyEquality<K>> BucketTable<K, B, E> {
    /// Returns the slot of the bucket whose key equals `key`.
    pub fn find(&self, key: &K) -> Option<usize> {
        let hash = self.equality.hash(key);
        self.by_hash.get(&hash)?.iter().copied().find(|&slot| {
            self.arena
                .get(slot)
                .is_some_and(|e| self.equality.equals(&e.key, key))
        })
    }

    /// Stores a new bucket under `key` and returns its slot.
    ///
    /// The caller is responsible for not inserting a key that already has a
    /// bucket.
    pub fn insert(&mut self, key: K, bucket: B) -> usize {
        let hash = self.equality.hash(&key);
        debug_assert!(self.find(&key).is_none(), "duplicate bucket key");
        let slot = self.arena.allocate(Entry { key, hash, bucket });
        self.by_hash.entry(hash).or_default().push(slot);
        slot
    }

    /// Returns true if `a` and `b` belong in the same bucket.
    #[inline]
    pub fn same_key(&self, a: &K, b: &K) -> bool {
        self.equality.equals(a, b)
    }
}
