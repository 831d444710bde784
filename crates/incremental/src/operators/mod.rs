//! Incremental list operators.
//!
//! Every operator consumes `ListChange<T>` from its source and emits the
//! equivalent changes for its derived list:
//! - Filter: keeps the items whose predicate holds
//! - Select: projects every item
//! - OrderBy: keeps the items sorted by a key
//! - GroupBy: splits the items into one `Group` per key
//!
//! Each comes in a static variant, whose selector is a plain function, and a
//! dynamic variant, whose selector yields a stream per item.

mod filter;
mod group;
mod group_by;
mod order_by;
mod select;

pub use filter::{Where, WhereDynamic};
pub use group::Group;
pub use group_by::{GroupBy, GroupByDynamic};
pub use order_by::{OrderBy, OrderByDynamic};
pub use select::{Select, SelectDynamic};
