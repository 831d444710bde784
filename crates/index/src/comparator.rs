//! Comparator implementations for sort keys.
//!
//! This module provides comparators for ordering keys in a sorted projection.

use core::cmp::Ordering;

/// Sort order for keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Order {
    /// Ascending order (smallest first)
    #[default]
    Asc,
    /// Descending order (largest first)
    Desc,
}

impl Order {
    /// Applies this order to a comparison result.
    #[inline]
    pub fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            Order::Asc => ord,
            Order::Desc => ord.reverse(),
        }
    }
}

/// Trait for comparing sort keys.
pub trait Comparator<K> {
    /// Compares two keys according to the comparator's ordering.
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

impl<K, F> Comparator<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self(a, b)
    }
}

/// Comparator for keys that implement `Ord`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyComparator {
    order: Order,
}

impl KeyComparator {
    /// Creates a new key comparator with the given order.
    pub fn new(order: Order) -> Self {
        Self { order }
    }

    /// Creates an ascending comparator.
    pub fn asc() -> Self {
        Self::new(Order::Asc)
    }

    /// Creates a descending comparator.
    pub fn desc() -> Self {
        Self::new(Order::Desc)
    }

    /// Returns the order of this comparator.
    pub fn order(&self) -> Order {
        self.order
    }
}

impl<K: Ord> Comparator<K> for KeyComparator {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self.order.apply(a.cmp(b))
    }
}

/// Inverts another comparator.
#[derive(Clone, Copy, Debug, Default)]
pub struct Reversed<C>(pub C);

impl<K, C: Comparator<K>> Comparator<K> for Reversed<C> {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self.0.compare(a, b).reverse()
    }
}
