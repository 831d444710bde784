//! Downstream delivery for stages shared with per-item observers.
//!
//! A dynamic stage can be entered from its upstream and from any of its item
//! streams. If one of those calls arrives while the stage is already
//! delivering to its downstream (the downstream pushed into an item stream,
//! say), the new changes are queued and delivered after the current ones, so
//! the downstream is never re-entered and sees changes in order.

use alloc::collections::VecDeque;
use core::cell::{Cell, RefCell};
use ripple_core::{Error, ListChange, Observer};
use ripple_reactive::Notification;

pub(crate) struct Outlet<R, O> {
    downstream: RefCell<O>,
    queue: RefCell<VecDeque<Notification<ListChange<R>>>>,
    draining: Cell<bool>,
    /// Set once a terminal notification is queued or the stage is disposed
    stopped: Cell<bool>,
}

impl<R, O> Outlet<R, O> {
    pub(crate) fn new(downstream: O) -> Self {
        Self {
            downstream: RefCell::new(downstream),
            queue: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
            stopped: Cell::new(false),
        }
    }

    #[inline]
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    /// Stops delivery without notifying the downstream.
    pub(crate) fn stop(&self) {
        self.stopped.set(true);
        self.queue.borrow_mut().clear();
    }
}

impl<R, O: Observer<ListChange<R>>> Outlet<R, O> {
    pub(crate) fn emit<I>(&self, changes: I)
    where
        I: IntoIterator<Item = ListChange<R>>,
    {
        if self.stopped.get() {
            return;
        }
        self.queue
            .borrow_mut()
            .extend(changes.into_iter().map(Notification::Next));
        self.drain();
    }

    pub(crate) fn fail(&self, error: Error) {
        if self.stopped.replace(true) {
            return;
        }
        self.queue.borrow_mut().push_back(Notification::Error(error));
        self.drain();
    }

    pub(crate) fn complete(&self) {
        if self.stopped.replace(true) {
            return;
        }
        self.queue.borrow_mut().push_back(Notification::Completed);
        self.drain();
    }

    fn drain(&self) {
        if self.draining.replace(true) {
            return;
        }
        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(notification) => notification.deliver(&mut *self.downstream.borrow_mut()),
                None => break,
            }
        }
        self.draining.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use ripple_reactive::ListView;

    #[test]
    fn test_outlet_delivers_in_order() {
        let view = ListView::new();
        let outlet = Outlet::new(view.clone());
        outlet.emit([ListChange::insert(0, 'a'), ListChange::insert(0, 'b')]);
        outlet.complete();
        outlet.emit([ListChange::insert(0, 'c')]);

        assert_eq!(view.items(), vec!['b', 'a']);
        assert!(view.is_completed());
    }

    #[test]
    fn test_outlet_stop_is_silent() {
        let view: ListView<i32> = ListView::new();
        let outlet = Outlet::new(view.clone());
        outlet.stop();
        outlet.emit([ListChange::insert(0, 1)]);
        outlet.fail(Error::source("ignored"));

        assert!(view.is_empty());
        assert_eq!(view.error(), None);
    }

    #[test]
    fn test_outlet_stop_drops_queued_terminal() {
        let view = ListView::new();
        let outlet = Outlet::new(view.clone());

        // As if the downstream were still handling an earlier change.
        outlet.draining.set(true);
        outlet.emit([ListChange::insert(0, 1)]);
        outlet.complete();
        assert_eq!(outlet.queue.borrow().len(), 2);

        outlet.stop();
        outlet.draining.set(false);
        outlet.drain();

        assert!(view.is_empty());
        assert!(!view.is_completed());
    }
}
