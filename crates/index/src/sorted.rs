//! Sorted projection with an original-index to sorted-position map.
//!
//! The projection keeps one entry per keyed source item, sorted by key under a
//! caller-supplied comparator, plus a map from each source slot to the
//! position of its entry. Source slots whose key is not known yet occupy a
//! slot but no position.

use crate::comparator::Comparator;
use alloc::vec::Vec;
use core::cmp::Ordering;

#[derive(Clone, Debug)]
struct SortedEntry<K> {
    origin: usize,
    key: K,
}

/// An always-sorted sequence of keyed source slots.
#[derive(Clone, Debug)]
pub struct SortedProjection<K> {
    /// Entries in sorted order
    entries: Vec<SortedEntry<K>>,
    /// Source slot -> sorted position (`None` while the key is pending)
    positions: Vec<Option<usize>>,
}

impl<K> Default for SortedProjection<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> SortedProjection<K> {
    /// Creates an empty projection.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            positions: Vec::new(),
        }
    }

    /// Returns the number of source slots, placed or not.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.positions.len()
    }

    /// Returns the number of placed entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no placed entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the sorted position of source slot `origin`.
    #[inline]
    pub fn position(&self, origin: usize) -> Option<usize> {
        self.positions[origin]
    }

    /// Returns the key of source slot `origin`, if placed.
    pub fn key(&self, origin: usize) -> Option<&K> {
        self.positions[origin].map(|p| &self.entries[p].key)
    }

    /// Returns the source slot at sorted position `pos`.
    #[inline]
    pub fn origin_at(&self, pos: usize) -> usize {
        self.entries[pos].origin
    }

    /// Returns `(origin, key)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &K)> + '_ {
        self.entries.iter().map(|e| (e.origin, &e.key))
    }

    /// Opens an unplaced source slot at `origin`, shifting later slots up.
    ///
    /// # Panics
    ///
    /// Panics if `origin > slot_count()`.
    pub fn insert_slot(&mut self, origin: usize) {
        assert!(origin <= self.positions.len(), "slot {} out of range", origin);
        for entry in &mut self.entries {
            if entry.origin >= origin {
                entry.origin += 1;
            }
        }
        self.positions.insert(origin, None);
    }

    /// Removes source slot `origin` and its entry, if any.
    ///
    /// Returns the sorted position the entry occupied.
    pub fn remove_slot(&mut self, origin: usize) -> Option<usize> {
        let removed = self.take(origin).map(|(pos, _)| pos);
        self.positions.remove(origin);
        for entry in &mut self.entries {
            if entry.origin > origin {
                entry.origin -= 1;
            }
        }
        removed
    }

    /// Removes the entry of source slot `origin` but keeps the slot open.
    ///
    /// Returns the vacated position and the entry's key.
    pub fn take(&mut self, origin: usize) -> Option<(usize, K)> {
        let pos = self.positions[origin].take()?;
        let entry = self.entries.remove(pos);
        for p in self.positions.iter_mut().flatten() {
            if *p > pos {
                *p -= 1;
            }
        }
        Some((pos, entry.key))
    }

    /// Relocates source slot `from` to `to`. Sorted positions are unaffected.
    pub fn move_slot(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let pos = self.positions.remove(from);
        self.positions.insert(to, pos);
        for (origin, pos) in self.positions.iter().enumerate() {
            if let Some(p) = *pos {
                self.entries[p].origin = origin;
            }
        }
    }

    /// Removes every slot and entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
    }

    fn insert_entry(&mut self, pos: usize, origin: usize, key: K) {
        for p in self.positions.iter_mut().flatten() {
            if *p >= pos {
                *p += 1;
            }
        }
        self.entries.insert(pos, SortedEntry { origin, key });
        self.positions[origin] = Some(pos);
    }

    /// First position whose key is not less than `key`.
    fn lower_bound<C: Comparator<K>>(&self, key: &K, cmp: &C) -> usize {
        self.entries
            .partition_point(|e| cmp.compare(&e.key, key) == Ordering::Less)
    }

    /// First position whose key is greater than `key`.
    fn upper_bound<C: Comparator<K>>(&self, key: &K, cmp: &C) -> usize {
        self.entries
            .partition_point(|e| cmp.compare(&e.key, key) != Ordering::Greater)
    }

    /// Places the unplaced slot `origin` under `key`, after any equal keys.
    ///
    /// Returns the new sorted position.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already placed.
    pub fn place<C: Comparator<K>>(&mut self, origin: usize, key: K, cmp: &C) -> usize {
        assert!(self.positions[origin].is_none(), "slot {} is already placed", origin);
        let pos = self.upper_bound(&key, cmp);
        self.insert_entry(pos, origin, key);
        pos
    }

    /// Opens slot `origin` and places it under `key`.
    pub fn insert<C: Comparator<K>>(&mut self, origin: usize, key: K, cmp: &C) -> usize {
        self.insert_slot(origin);
        self.place(origin, key, cmp)
    }

    /// Gives the placed slot `origin` a new key and re-searches its position.
    ///
    /// The entry is taken out before the search so its stale key is never
    /// compared. Among equal keys the position nearest the old one wins, so a
    /// key change that keeps the relative order leaves the position unchanged.
    ///
    /// Returns `(old_position, new_position)`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not placed.
    pub fn reposition<C: Comparator<K>>(&mut self, origin: usize, key: K, cmp: &C) -> (usize, usize) {
        let (old, _) = match self.take(origin) {
            Some(taken) => taken,
            None => panic!("slot {} is not placed", origin),
        };
        let lower = self.lower_bound(&key, cmp);
        let upper = self.upper_bound(&key, cmp);
        let new = old.clamp(lower, upper);
        self.insert_entry(new, origin, key);
        (old, new)
    }

    /// Re-sorts every entry under a new comparator (stable).
    ///
    /// Returns the moves, as `(from, to)` pairs applied one after another, that
    /// turn the previous order into the new one. Entries that keep their place
    /// relative to the others produce no move.
    pub fn resort<C: Comparator<K>>(&mut self, cmp: &C) -> Vec<(usize, usize)> {
        let mut current: Vec<usize> = self.entries.iter().map(|e| e.origin).collect();
        self.entries.sort_by(|a, b| cmp.compare(&a.key, &b.key));
        for (pos, entry) in self.entries.iter().enumerate() {
            self.positions[entry.origin] = Some(pos);
        }

        let mut moves = Vec::new();
        for (target, entry) in self.entries.iter().enumerate() {
            if current[target] == entry.origin {
                continue;
            }
            let from = target
                + current[target..]
                    .iter()
                    .position(|&origin| origin == entry.origin)
                    .unwrap_or_default();
            let origin = current.remove(from);
            current.insert(target, origin);
            moves.push((from, target));
        }
        moves
    }

    /// Returns true if the entries are sorted under `cmp`.
    pub fn is_sorted_by<C: Comparator<K>>(&self, cmp: &C) -> bool {
        self.entries
            .windows(2)
            .all(|w| cmp.compare(&w[0].key, &w[1].key) != Ordering::Greater)
    }
}
