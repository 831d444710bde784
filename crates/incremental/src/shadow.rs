//! Per-item bookkeeping for stages with per-item sub-streams.
//!
//! A dynamic stage subscribes to one observable per live source item (its
//! predicate, key or projection stream). The `Shadow` of an item owns that
//! subscription and the latest value it produced. Its `Lifecycle` tells the
//! item's observer what to do with a value:
//!
//! - `Pending`: the shadow is still being built, typically because the
//!   observable emits synchronously from inside `subscribe`. The value is
//!   buffered on the shadow and read by the stage once it registers the item.
//! - `Active`: the item is registered; the value is handed to the stage.
//! - `Disposed`: the item is gone; the value is dropped.

use alloc::rc::{Rc, Weak};
use core::cell::{Cell, RefCell};
use ripple_core::{Disposable, Error, Observable, Observer};

/// Registration state of a shadow item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Pending,
    Active,
    Disposed,
}

/// Stage-side record of one live source item.
pub struct Shadow<T, V, D, M = ()> {
    item: T,
    value: RefCell<Option<V>>,
    lifecycle: Cell<Lifecycle>,
    subscription: RefCell<Option<D>>,
    mark: M,
}

impl<T, V, D> Shadow<T, V, D, ()> {
    /// Creates a pending shadow for `item`.
    pub fn new(item: T) -> Rc<Self> {
        Self::with_mark(item, ())
    }
}

impl<T, V, D, M> Shadow<T, V, D, M> {
    /// Creates a pending shadow carrying a stage-specific mark.
    pub fn with_mark(item: T, mark: M) -> Rc<Self> {
        Rc::new(Self {
            item,
            value: RefCell::new(None),
            lifecycle: Cell::new(Lifecycle::Pending),
            subscription: RefCell::new(None),
            mark,
        })
    }

    #[inline]
    pub fn item(&self) -> &T {
        &self.item
    }

    #[inline]
    pub fn mark(&self) -> &M {
        &self.mark
    }

    #[inline]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.lifecycle.get() == Lifecycle::Active
    }

    /// Returns true if a value has been stored.
    pub fn has_value(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// Returns true if the stored value satisfies `f`.
    pub fn value_matches(&self, f: impl FnOnce(&V) -> bool) -> bool {
        self.value.borrow().as_ref().is_some_and(f)
    }

    /// Returns a copy of the stored value.
    pub fn value(&self) -> Option<V>
    where
        V: Clone,
    {
        self.value.borrow().clone()
    }

    /// Stores a value, returning the previous one.
    pub fn set_value(&self, value: V) -> Option<V> {
        self.value.borrow_mut().replace(value)
    }

    /// Removes the stored value.
    pub fn take_value(&self) -> Option<V> {
        self.value.borrow_mut().take()
    }

    /// Marks the shadow registered and stores its subscription.
    pub fn activate(&self, subscription: D) {
        debug_assert_eq!(self.lifecycle.get(), Lifecycle::Pending);
        *self.subscription.borrow_mut() = Some(subscription);
        self.lifecycle.set(Lifecycle::Active);
    }
}

impl<T, V, D: Disposable, M> Shadow<T, V, D, M> {
    /// Marks the shadow disposed and releases its subscription.
    pub fn dispose(&self) {
        if self.lifecycle.replace(Lifecycle::Disposed) == Lifecycle::Disposed {
            return;
        }
        let subscription = self.subscription.borrow_mut().take();
        if let Some(mut subscription) = subscription {
            subscription.dispose();
        }
    }
}

/// Returns the position of `shadow` in `items`, comparing by identity.
pub(crate) fn position_of<S>(items: &[Rc<S>], shadow: &Rc<S>) -> Option<usize> {
    items.iter().position(|s| Rc::ptr_eq(s, shadow))
}

/// The stage side of an item observer.
pub(crate) trait ItemSink<T, V, D, M> {
    /// A registered item produced a new value.
    fn item_next(&self, shadow: &Rc<Shadow<T, V, D, M>>, value: V);

    /// An item stream failed.
    fn item_error(&self, error: Error);
}

/// Forwards one item's sub-stream to its stage.
pub(crate) struct ItemObserver<T, V, D, M, K> {
    stage: Weak<K>,
    shadow: Rc<Shadow<T, V, D, M>>,
}

impl<T, V, D, M, K> Observer<V> for ItemObserver<T, V, D, M, K>
where
    K: ItemSink<T, V, D, M>,
{
    fn on_next(&mut self, value: V) {
        match self.shadow.lifecycle() {
            Lifecycle::Pending => {
                self.shadow.set_value(value);
            }
            Lifecycle::Active => {
                if let Some(stage) = self.stage.upgrade() {
                    stage.item_next(&self.shadow, value);
                }
            }
            Lifecycle::Disposed => {}
        }
    }

    fn on_error(&mut self, error: Error) {
        if self.shadow.lifecycle() == Lifecycle::Disposed {
            return;
        }
        if let Some(stage) = self.stage.upgrade() {
            stage.item_error(error);
        }
    }

    fn on_completed(&mut self) {
        // The last value stays in effect.
        log::trace!("item stream completed");
    }
}

/// Subscribes `shadow` to its sub-stream and activates it.
///
/// Values the stream emits during `subscribe` are buffered on the shadow.
pub(crate) fn attach<T, V, S, M, K>(
    stage: &Rc<K>,
    shadow: Rc<Shadow<T, V, S::Subscription, M>>,
    source: S,
) -> Rc<Shadow<T, V, S::Subscription, M>>
where
    S: Observable<V>,
    K: ItemSink<T, V, S::Subscription, M> + 'static,
    T: 'static,
    V: 'static,
    M: 'static,
    S::Subscription: 'static,
{
    let observer = ItemObserver {
        stage: Rc::downgrade(stage),
        shadow: Rc::clone(&shadow),
    };
    let subscription = source.subscribe(observer);
    shadow.activate(subscription);
    shadow
}
