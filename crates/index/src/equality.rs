//! Pluggable key equality for bucket lookups.

use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;

/// Hashes and compares bucket keys.
///
/// Keys that are `equals` must produce the same `hash`.
pub trait KeyEquality<K> {
    /// Returns the hash of `key`.
    fn hash(&self, key: &K) -> u64;

    /// Returns true if `a` and `b` name the same bucket.
    fn equals(&self, a: &K, b: &K) -> bool;
}

/// Equality through `Eq` and `Hash`, hashed with hashbrown's default hasher.
#[derive(Clone, Default)]
pub struct DefaultEquality {
    hasher: DefaultHashBuilder,
}

impl DefaultEquality {
    /// Creates a default equality.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: Hash + Eq> KeyEquality<K> for DefaultEquality {
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// Equality from a pair of closures.
#[derive(Clone)]
pub struct FnEquality<H, E> {
    hash: H,
    equals: E,
}

impl<H, E> FnEquality<H, E> {
    /// Creates an equality from a hash function and an equality predicate.
    pub fn new(hash: H, equals: E) -> Self {
        Self { hash, equals }
    }
}

impl<K, H, E> KeyEquality<K> for FnEquality<H, E>
where
    H: Fn(&K) -> u64,
    E: Fn(&K, &K) -> bool,
{
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        (self.hash)(key)
    }

    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        (self.equals)(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_equality() {
        let eq = DefaultEquality::new();
        assert!(eq.equals(&"a", &"a"));
        assert!(!eq.equals(&"a", &"b"));
        assert_eq!(KeyEquality::<&str>::hash(&eq, &"a"), KeyEquality::<&str>::hash(&eq, &"a"));
    }

    #[test]
    fn test_fn_equality_case_insensitive() {
        let eq = FnEquality::new(
            |k: &char| k.to_ascii_lowercase() as u64,
            |a: &char, b: &char| a.eq_ignore_ascii_case(b),
        );
        assert!(eq.equals(&'A', &'a'));
        assert_eq!(eq.hash(&'A'), eq.hash(&'a'));
    }
}
