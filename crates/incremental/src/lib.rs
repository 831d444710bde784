//! Ripple Incremental - Incremental list operators over change streams.
//!
//! A stage consumes the `ListChange<T>` stream of a source list and emits the
//! equivalent stream for a derived list, translating every change with the
//! index structures of `ripple-index` instead of rescanning the source.
//!
//! # Operators
//!
//! - `Where` / `WhereDynamic`: filter by a predicate or a predicate stream per item
//! - `Select` / `SelectDynamic`: project by a selector or a result stream per item
//! - `OrderBy` / `OrderByDynamic`: sort by a key or a key stream per item,
//!   with a replaceable comparer
//! - `GroupBy` / `GroupByDynamic`: group by a key or a key stream per item,
//!   emitting `Group` handles
//!
//! Stages are generic over their downstream observer, so a chain is built
//! from the sink outwards and subscribed to the source at the end.
//! `OrderBy` and the dynamic stages are shared handles; attached with
//! `subscribe_to`, they also detach from the source on `dispose`.
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{Observable, Result};
//! use ripple_incremental::{OrderBy, Where};
//! use ripple_index::KeyComparator;
//! use ripple_reactive::{ListView, ObservableList};
//!
//! let source = ObservableList::from_vec(vec!["pear", "fig", "apple"]);
//! let view = ListView::new();
//!
//! // source -> where(len > 3) -> order_by(itself) -> view
//! let sorted = OrderBy::new(|s: &&'static str| Ok(*s), KeyComparator::asc(), view.clone());
//! let long = Where::new(|s: &&str| -> Result<bool> { Ok(s.len() > 3) }, sorted);
//! let _subscription = source.subscribe(long);
//!
//! assert_eq!(view.items(), vec!["apple", "pear"]);
//! source.push("banana");
//! assert_eq!(view.items(), vec!["apple", "banana", "pear"]);
//! ```

#![no_std]

extern crate alloc;

mod outlet;
pub mod operators;
pub mod shadow;
mod slot;

pub use operators::{
    Group, GroupBy, GroupByDynamic, OrderBy, OrderByDynamic, Select, SelectDynamic, Where,
    WhereDynamic,
};
pub use shadow::{Lifecycle, Shadow};
