//! Change event type for observed ordered collections.
//!
//! A `ListChange` describes one atomic mutation of a list. A stream of changes
//! is a replay log: every index refers to the list as it exists after all
//! earlier changes in the stream have been applied.

use alloc::vec::Vec;

/// Discriminant of a `ListChange`, without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListChangeKind {
    Insert,
    Remove,
    Replace,
    Move,
    RemoveAll,
}

/// One atomic mutation of an ordered collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListChange<T> {
    /// `item` now occupies `index`; items at and after `index` shift right.
    Insert { index: usize, item: T },
    /// The item previously at `index` is gone; later items shift left.
    Remove { index: usize },
    /// The item at `index` is swapped for `item` in place.
    Replace { index: usize, item: T },
    /// The item at `from` is removed and reinserted at `to` of the shortened list.
    Move { from: usize, to: usize },
    /// The list is cleared.
    RemoveAll,
}

impl<T> ListChange<T> {
    /// Creates an insertion.
    #[inline]
    pub fn insert(index: usize, item: T) -> Self {
        ListChange::Insert { index, item }
    }

    /// Creates a removal.
    #[inline]
    pub fn remove(index: usize) -> Self {
        ListChange::Remove { index }
    }

    /// Creates an in-place replacement.
    #[inline]
    pub fn replace(index: usize, item: T) -> Self {
        ListChange::Replace { index, item }
    }

    /// Creates a move.
    #[inline]
    pub fn relocate(from: usize, to: usize) -> Self {
        ListChange::Move { from, to }
    }

    /// Returns the kind of this change.
    pub fn kind(&self) -> ListChangeKind {
        match self {
            ListChange::Insert { .. } => ListChangeKind::Insert,
            ListChange::Remove { .. } => ListChangeKind::Remove,
            ListChange::Replace { .. } => ListChangeKind::Replace,
            ListChange::Move { .. } => ListChangeKind::Move,
            ListChange::RemoveAll => ListChangeKind::RemoveAll,
        }
    }

    /// Returns the primary index of this change (`from` for moves).
    pub fn index(&self) -> Option<usize> {
        match self {
            ListChange::Insert { index, .. }
            | ListChange::Remove { index }
            | ListChange::Replace { index, .. } => Some(*index),
            ListChange::Move { from, .. } => Some(*from),
            ListChange::RemoveAll => None,
        }
    }

    /// Returns the carried item, if any.
    pub fn item(&self) -> Option<&T> {
        match self {
            ListChange::Insert { item, .. } | ListChange::Replace { item, .. } => Some(item),
            _ => None,
        }
    }

    /// Returns true if this is an insertion.
    #[inline]
    pub fn is_insert(&self) -> bool {
        matches!(self, ListChange::Insert { .. })
    }

    /// Returns true if this is a removal.
    #[inline]
    pub fn is_remove(&self) -> bool {
        matches!(self, ListChange::Remove { .. })
    }

    /// Returns true if this is a move.
    #[inline]
    pub fn is_move(&self) -> bool {
        matches!(self, ListChange::Move { .. })
    }

    /// Maps the carried item to a new type.
    pub fn map<U, F>(self, f: F) -> ListChange<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            ListChange::Insert { index, item } => ListChange::Insert {
                index,
                item: f(item),
            },
            ListChange::Replace { index, item } => ListChange::Replace {
                index,
                item: f(item),
            },
            ListChange::Remove { index } => ListChange::Remove { index },
            ListChange::Move { from, to } => ListChange::Move { from, to },
            ListChange::RemoveAll => ListChange::RemoveAll,
        }
    }

    /// Applies this change to a vector.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of range for `list`; a well-formed change
    /// stream never produces one.
    pub fn apply_to(self, list: &mut Vec<T>) {
        match self {
            ListChange::Insert { index, item } => list.insert(index, item),
            ListChange::Remove { index } => {
                list.remove(index);
            }
            ListChange::Replace { index, item } => list[index] = item,
            ListChange::Move { from, to } => {
                let item = list.remove(from);
                list.insert(to, item);
            }
            ListChange::RemoveAll => list.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_apply_insert_remove() {
        let mut list = vec![1, 2, 3];
        ListChange::insert(1, 10).apply_to(&mut list);
        assert_eq!(list, vec![1, 10, 2, 3]);

        ListChange::remove(0).apply_to(&mut list);
        assert_eq!(list, vec![10, 2, 3]);
    }

    #[test]
    fn test_apply_move_forward_and_back() {
        let mut list = vec!['a', 'b', 'c', 'd'];
        ListChange::relocate(0, 2).apply_to(&mut list);
        assert_eq!(list, vec!['b', 'c', 'a', 'd']);

        ListChange::relocate(3, 0).apply_to(&mut list);
        assert_eq!(list, vec!['d', 'b', 'c', 'a']);
    }

    #[test]
    fn test_apply_replace_and_clear() {
        let mut list = vec![1, 2];
        ListChange::replace(1, 20).apply_to(&mut list);
        assert_eq!(list, vec![1, 20]);

        ListChange::RemoveAll.apply_to(&mut list);
        assert!(list.is_empty());
    }

    #[test]
    fn test_map_keeps_indices() {
        let change = ListChange::insert(3, 21).map(|x| x * 2);
        assert_eq!(change, ListChange::insert(3, 42));

        let change: ListChange<i32> = ListChange::<i32>::relocate(1, 4).map(|x| x + 1);
        assert_eq!(change, ListChange::relocate(1, 4));
    }

    #[test]
    fn test_accessors() {
        let change = ListChange::replace(2, "x");
        assert_eq!(change.kind(), ListChangeKind::Replace);
        assert_eq!(change.index(), Some(2));
        assert_eq!(change.item(), Some(&"x"));

        let change: ListChange<&str> = ListChange::RemoveAll;
        assert_eq!(change.index(), None);
        assert!(change.item().is_none());
        assert!(ListChange::<()>::remove(0).is_remove());
        assert!(ListChange::<()>::relocate(0, 1).is_move());
    }
}
