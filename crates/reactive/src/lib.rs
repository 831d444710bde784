//! Ripple Reactive - Single-threaded push channel for Ripple change streams.
//!
//! The operators in `ripple-incremental` consume and produce streams through
//! the `Observer`/`Observable` contracts of `ripple-core`. This crate provides
//! the channel that drives them:
//!
//! - `Subject`: multicast channel with serialized, non-reentrant delivery
//! - `BehaviorSubject`: subject that hands its latest value to new subscribers
//! - `ObservableList`: mutable list publishing `ListChange` events
//! - `ListView` / `Recorder`: materializing observers
//! - `SubscriptionManager`: observer bookkeeping behind every subject
//!
//! # Example
//!
//! ```rust
//! use ripple_core::Observable;
//! use ripple_reactive::{ListView, ObservableList};
//!
//! let list = ObservableList::new();
//! let view = ListView::new();
//! list.subscribe(view.clone());
//!
//! list.push("a");
//! list.insert(0, "b");
//! assert_eq!(view.items(), vec!["b", "a"]);
//! ```

#![no_std]

extern crate alloc;

pub mod list;
pub mod subject;
pub mod subscription;
pub mod view;

pub use list::ObservableList;
pub use subject::{BehaviorSubject, Notification, Subject};
pub use subscription::{
    BoxedObserver, SubjectSubscription, SubscriptionId, SubscriptionManager, Terminal,
};
pub use view::{ListView, Recorder};

// Re-export the contracts so that one import covers a pipeline.
pub use ripple_core::{Disposable, Error, FnObserver, ListChange, Observable, Observer, Result};
