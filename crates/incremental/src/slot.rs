//! Owned subscription handles.

use alloc::boxed::Box;
use core::cell::{Cell, RefCell};
use ripple_core::{Disposable, Observable, Observer};

/// Holds at most one subscription of a stage: its upstream, or the
/// comparator stream of a sort.
pub(crate) struct SubscriptionSlot {
    current: RefCell<Option<Box<dyn Disposable>>>,
}

impl SubscriptionSlot {
    pub(crate) fn new() -> Self {
        Self {
            current: RefCell::new(None),
        }
    }

    /// Stores `subscription`, disposing the one held before.
    pub(crate) fn set<D: Disposable + 'static>(&self, subscription: D) {
        self.release();
        *self.current.borrow_mut() = Some(Box::new(subscription));
    }

    /// Disposes the held subscription, if any.
    pub(crate) fn release(&self) {
        // Taken first: disposing may call back into the stage.
        let subscription = self.current.borrow_mut().take();
        if let Some(mut subscription) = subscription {
            subscription.dispose();
        }
    }
}

/// Subscribes `stage` to `source` and keeps the subscription in `slot`.
///
/// A stage disposed while the source replays into it is detached at once.
pub(crate) fn connect<T, S, O>(slot: &SubscriptionSlot, disposed: &Cell<bool>, source: &S, stage: O)
where
    S: Observable<T>,
    S::Subscription: 'static,
    O: Observer<T> + 'static,
{
    let mut subscription = source.subscribe(stage);
    if disposed.get() {
        subscription.dispose();
    } else {
        slot.set(subscription);
    }
}
