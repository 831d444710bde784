//! Ripple Index - Index-translation structures for Ripple list operators.
//!
//! Every derived-list operator translates positions in its source list into
//! positions in its derived list. This crate provides the structures that
//! make that translation incremental:
//!
//! - `PresenceBitmap`: one bit per source position with popcount-before
//! - `count_before`: linear count-before scan over a shadow list
//! - `SortedProjection`: sorted entries plus an original-index to position map
//! - `BucketArena` / `BucketTable`: keyed buckets in reusable slots
//! - `Comparator` / `KeyEquality`: pluggable ordering and key equality
//!
//! # Example
//!
//! ```rust
//! use ripple_index::{KeyComparator, PresenceBitmap, SortedProjection};
//!
//! // Filtered positions
//! let mut bitmap = PresenceBitmap::new();
//! bitmap.insert(0, false);
//! bitmap.insert(1, true);
//! bitmap.insert(2, true);
//! assert_eq!(bitmap.count_before(2), 1);
//!
//! // Sorted positions
//! let cmp = KeyComparator::asc();
//! let mut sorted = SortedProjection::new();
//! assert_eq!(sorted.insert(0, "b", &cmp), 0);
//! assert_eq!(sorted.insert(1, "a", &cmp), 0);
//! assert_eq!(sorted.position(0), Some(1));
//! ```

#![no_std]

extern crate alloc;

pub mod arena;
pub mod bitmap;
pub mod bucket;
pub mod comparator;
pub mod count;
pub mod equality;
pub mod sorted;

pub use arena::BucketArena;
pub use bitmap::PresenceBitmap;
pub use bucket::BucketTable;
pub use comparator::{Comparator, KeyComparator, Order, Reversed};
pub use count::count_before;
pub use equality::{DefaultEquality, FnEquality, KeyEquality};
pub use sorted::SortedProjection;
