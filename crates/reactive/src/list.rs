//! Observable source list.
//!
//! `ObservableList` owns a vector and publishes every mutation as a
//! `ListChange`. A new subscriber first receives the current contents as
//! inserts, then the live changes, so the stream it sees is always a valid
//! replay log starting from an empty list.

use crate::subject::Subject;
use crate::subscription::SubjectSubscription;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use ripple_core::{Error, ListChange, Observable, Observer};

/// A mutable list that publishes its changes.
///
/// Cloning yields another handle to the same list.
pub struct ObservableList<T> {
    items: Rc<RefCell<Vec<T>>>,
    changes: Subject<ListChange<T>>,
}

impl<T> Clone for ObservableList<T> {
    fn clone(&self) -> Self {
        Self {
            items: Rc::clone(&self.items),
            changes: self.changes.clone(),
        }
    }
}

impl<T: Clone + 'static> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> ObservableList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            items: Rc::new(RefCell::new(Vec::new())),
            changes: Subject::new(),
        }
    }

    /// Creates a list holding `items`.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            items: Rc::new(RefCell::new(items)),
            changes: Subject::new(),
        }
    }

    /// Returns a copy of the current items.
    pub fn items(&self) -> Vec<T> {
        self.items.borrow().clone()
    }

    /// Returns a copy of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.borrow().get(index).cloned()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Returns true once the list completed or failed.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.changes.is_stopped()
    }

    /// Returns the number of live subscribers.
    pub fn observer_count(&self) -> usize {
        self.changes.observer_count()
    }

    /// Appends an item.
    pub fn push(&self, item: T) {
        let index = self.len();
        self.insert(index, item);
    }

    /// Inserts an item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn insert(&self, index: usize, item: T) {
        self.apply(ListChange::insert(index, item));
    }

    /// Removes the item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn remove(&self, index: usize) {
        self.apply(ListChange::remove(index));
    }

    /// Replaces the item at `index`.
    pub fn replace(&self, index: usize, item: T) {
        self.apply(ListChange::replace(index, item));
    }

    /// Moves the item at `from` so that it ends up at `to`.
    pub fn move_item(&self, from: usize, to: usize) {
        self.apply(ListChange::relocate(from, to));
    }

    /// Removes every item.
    pub fn clear(&self) {
        self.apply(ListChange::RemoveAll);
    }

    /// Applies a change to the items and publishes it.
    pub fn apply(&self, change: ListChange<T>) {
        if self.changes.is_stopped() {
            log::warn!("change applied to a stopped list was dropped");
            return;
        }
        change.clone().apply_to(&mut self.items.borrow_mut());
        self.changes.next(change);
    }

    /// Completes the change stream. The items are kept.
    pub fn complete(&self) {
        self.changes.complete();
    }

    /// Fails the change stream.
    pub fn error(&self, error: Error) {
        self.changes.error(error);
    }
}

impl<T: Clone + 'static> Observable<ListChange<T>> for ObservableList<T> {
    type Subscription = SubjectSubscription<ListChange<T>>;

    fn subscribe<O>(&self, mut observer: O) -> Self::Subscription
    where
        O: Observer<ListChange<T>> + 'static,
    {
        // Snapshot first so the observer may touch the list while replaying.
        // Changes still queued in the subject are already in the snapshot.
        let snapshot = self.items();
        let skip = self.changes.queued();
        for (index, item) in snapshot.into_iter().enumerate() {
            observer.on_next(ListChange::insert(index, item));
        }
        self.changes.subscribe(SkipQueued {
            skip,
            inner: observer,
        })
    }
}

/// Drops the first `skip` values before forwarding.
struct SkipQueued<O> {
    skip: usize,
    inner: O,
}

impl<T, O: Observer<T>> Observer<T> for SkipQueued<O> {
    fn on_next(&mut self, value: T) {
        if self.skip > 0 {
            self.skip -= 1;
            return;
        }
        self.inner.on_next(value);
    }

    fn on_error(&mut self, error: Error) {
        self.inner.on_error(error);
    }

    fn on_completed(&mut self) {
        self.inner.on_completed();
    }
}

impl<T: Clone + 'static> Observer<ListChange<T>> for ObservableList<T> {
    fn on_next(&mut self, change: ListChange<T>) {
        self.apply(change);
    }

    fn on_error(&mut self, error: Error) {
        ObservableList::error(self, error);
    }

    fn on_completed(&mut self) {
        self.complete();
    }
}
