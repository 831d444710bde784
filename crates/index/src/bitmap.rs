//! Presence bitmap with positional insert/remove.
//!
//! One bit per source position records whether that source item is present
//! in a derived (filtered) list. The derived index of a present item is the
//! number of set bits before its source position.

use alloc::vec::Vec;

const WORD_BITS: usize = 64;

/// A growable bit vector that keeps positions dense under insert and remove.
///
/// Bits beyond `len` are always zero, so whole-word popcounts stay exact.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PresenceBitmap {
    words: Vec<u64>,
    len: usize,
}

#[inline]
fn low_mask(bits: usize) -> u64 {
    if bits >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

impl PresenceBitmap {
    /// Creates an empty bitmap.
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of positions.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if there are no positions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the bit at `pos`.
    ///
    /// # Panics
    ///
    /// Panics if `pos >= len`.
    #[inline]
    pub fn get(&self, pos: usize) -> bool {
        assert!(pos < self.len, "bit {} out of range for length {}", pos, self.len);
        self.words[pos / WORD_BITS] >> (pos % WORD_BITS) & 1 == 1
    }

    /// Sets the bit at `pos` and returns its previous value.
    pub fn set(&mut self, pos: usize, value: bool) -> bool {
        let previous = self.get(pos);
        let mask = 1u64 << (pos % WORD_BITS);
        if value {
            self.words[pos / WORD_BITS] |= mask;
        } else {
            self.words[pos / WORD_BITS] &= !mask;
        }
        previous
    }

    /// Appends a bit at the end.
    pub fn push(&mut self, value: bool) {
        self.insert(self.len, value);
    }

    /// Inserts a bit at `pos`, shifting every later bit up by one.
    ///
    /// # Panics
    ///
    /// Panics if `pos > len`.
    pub fn insert(&mut self, pos: usize, value: bool) {
        assert!(pos <= self.len, "insert position {} out of range for length {}", pos, self.len);
        if self.len % WORD_BITS == 0 {
            self.words.push(0);
        }

        let word = pos / WORD_BITS;
        let bit = pos % WORD_BITS;

        // Carry the top bit of each word into the next, highest word first.
        for i in (word + 1..self.words.len()).rev() {
            self.words[i] = (self.words[i] << 1) | (self.words[i - 1] >> (WORD_BITS - 1));
        }

        let current = self.words[word];
        let low = current & low_mask(bit);
        let high = current & !low_mask(bit);
        self.words[word] = low | (high << 1) | ((value as u64) << bit);
        self.len += 1;
    }

    /// Removes the bit at `pos`, shifting every later bit down by one.
    ///
    /// Returns the removed bit.
    ///
    /// # Panics
    ///
    /// Panics if `pos >= len`.
    pub fn remove(&mut self, pos: usize) -> bool {
        let removed = self.get(pos);
        let word = pos / WORD_BITS;
        let bit = pos % WORD_BITS;

        let current = self.words[word];
        let low = current & low_mask(bit);
        let high = (current & !low_mask(bit + 1)) >> 1;
        self.words[word] = low | high;

        for i in word..self.words.len() {
            if i > word {
                self.words[i] >>= 1;
            }
            if let Some(&next) = self.words.get(i + 1) {
                self.words[i] |= (next & 1) << (WORD_BITS - 1);
            }
        }

        self.len -= 1;
        if self.len % WORD_BITS == 0 {
            self.words.pop();
        }
        removed
    }

    /// Moves the bit at `from` to `to`, as if removed and then reinserted.
    pub fn move_bit(&mut self, from: usize, to: usize) {
        let value = self.remove(from);
        self.insert(to, value);
    }

    /// Returns the number of set bits at positions strictly before `pos`.
    ///
    /// # Panics
    ///
    /// Panics if `pos > len`.
    pub fn count_before(&self, pos: usize) -> usize {
        assert!(pos <= self.len, "position {} out of range for length {}", pos, self.len);
        let full = pos / WORD_BITS;
        let mut count: usize = self.words[..full]
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum();
        let rest = pos % WORD_BITS;
        if rest > 0 {
            count += (self.words[full] & low_mask(rest)).count_ones() as usize;
        }
        count
    }

    /// Returns the total number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Removes every bit.
    pub fn clear(&mut self) {
        self.words.clear();
        self.len = 0;
    }

    /// Returns an iterator over the bits in position order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |pos| self.get(pos))
    }
}

impl FromIterator<bool> for PresenceBitmap {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut bitmap = PresenceBitmap::new();
        for value in iter {
            bitmap.push(value);
        }
        bitmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn bits(bitmap: &PresenceBitmap) -> Vec<bool> {
        bitmap.iter().collect()
    }

    #[test]
    fn test_bitmap_new() {
        let bitmap = PresenceBitmap::new();
        assert!(bitmap.is_empty());
        assert_eq!(bitmap.count_before(0), 0);
        assert_eq!(bitmap.count_ones(), 0);
    }

    #[test]
    fn test_bitmap_insert_shifts() {
        let mut bitmap = PresenceBitmap::new();
        bitmap.insert(0, true);
        bitmap.insert(0, false);
        bitmap.insert(1, true);
        assert_eq!(bits(&bitmap), vec![false, true, true]);
        assert_eq!(bitmap.count_before(0), 0);
        assert_eq!(bitmap.count_before(1), 0);
        assert_eq!(bitmap.count_before(2), 1);
        assert_eq!(bitmap.count_before(3), 2);
    }

    #[test]
    fn test_bitmap_remove_returns_bit() {
        let mut bitmap: PresenceBitmap = vec![true, false, true, true].into_iter().collect();
        assert!(!bitmap.remove(1));
        assert_eq!(bits(&bitmap), vec![true, true, true]);
        assert!(bitmap.remove(0));
        assert_eq!(bits(&bitmap), vec![true, true]);
        assert_eq!(bitmap.count_ones(), 2);
    }

    #[test]
    fn test_bitmap_set() {
        let mut bitmap: PresenceBitmap = vec![false, false].into_iter().collect();
        assert!(!bitmap.set(1, true));
        assert!(bitmap.set(1, false));
        assert!(!bitmap.get(1));
    }

    #[test]
    fn test_bitmap_move_bit() {
        let mut bitmap: PresenceBitmap = vec![true, false, false, false].into_iter().collect();
        bitmap.move_bit(0, 3);
        assert_eq!(bits(&bitmap), vec![false, false, false, true]);
        bitmap.move_bit(3, 1);
        assert_eq!(bits(&bitmap), vec![false, true, false, false]);
    }

    #[test]
    fn test_bitmap_across_word_boundary() {
        let mut expected = Vec::new();
        let mut bitmap = PresenceBitmap::new();
        for i in 0..200 {
            let value = i % 3 == 0;
            bitmap.push(value);
            expected.push(value);
        }

        bitmap.insert(63, true);
        expected.insert(63, true);
        bitmap.insert(64, false);
        expected.insert(64, false);
        assert_eq!(bits(&bitmap), expected);

        assert_eq!(bitmap.remove(127), expected.remove(127));
        assert_eq!(bitmap.remove(0), expected.remove(0));
        assert_eq!(bits(&bitmap), expected);

        for pos in [0, 1, 63, 64, 65, 128, expected.len()] {
            let naive = expected[..pos].iter().filter(|&&b| b).count();
            assert_eq!(bitmap.count_before(pos), naive, "count_before({})", pos);
        }
    }

    #[test]
    fn test_bitmap_shrinks_to_empty() {
        let mut bitmap: PresenceBitmap = (0..65).map(|_| true).collect();
        while !bitmap.is_empty() {
            assert!(bitmap.remove(bitmap.len() / 2));
        }
        assert_eq!(bitmap.count_ones(), 0);
        assert_eq!(bitmap, PresenceBitmap::new());
    }

    #[test]
    #[should_panic]
    fn test_bitmap_get_out_of_range() {
        let bitmap: PresenceBitmap = vec![true].into_iter().collect();
        bitmap.get(1);
    }
}
