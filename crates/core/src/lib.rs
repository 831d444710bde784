//! Ripple Core - Change events and push-channel contracts for Ripple.
//!
//! This crate provides the foundational types shared by every Ripple crate:
//!
//! - `ListChange<T>`: One atomic mutation of an observed ordered collection
//! - `Observer` / `Observable` / `Disposable`: The three-callback push protocol
//!   that carries change events between stages
//! - `Error`: Error types for selector failures and terminated sources
//!
//! # Example
//!
//! ```rust
//! use ripple_core::ListChange;
//!
//! let mut list = Vec::new();
//! ListChange::Insert { index: 0, item: "b" }.apply_to(&mut list);
//! ListChange::Insert { index: 0, item: "a" }.apply_to(&mut list);
//! ListChange::<&str>::Move { from: 0, to: 1 }.apply_to(&mut list);
//!
//! assert_eq!(list, vec!["b", "a"]);
//! ```

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod change;
mod error;
mod observer;

pub use change::{ListChange, ListChangeKind};
pub use error::{Error, Result};
pub use observer::{Disposable, FnObserver, Observable, Observer};
