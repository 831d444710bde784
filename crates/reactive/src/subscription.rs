//! Subscription management for subjects.
//!
//! This module provides subscription IDs, the manager that owns a subject's
//! observers, and the handle returned to subscribers.

use alloc::boxed::Box;
use alloc::rc::Weak;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::mem;
use ripple_core::{Disposable, Error, Observer};

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Boxed observer stored by a subject.
pub type BoxedObserver<T> = Box<dyn Observer<T>>;

/// How a subject terminated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Terminal {
    Completed,
    Failed(Error),
}

/// Manages the observers of one subject.
///
/// During dispatch the observers are checked out of the manager so that
/// callbacks can subscribe and unsubscribe freely; `check_in` merges the
/// changes made in the meantime.
pub struct SubscriptionManager<T> {
    /// Registered observers in subscription order
    observers: Vec<(SubscriptionId, BoxedObserver<T>)>,
    /// Unsubscribed while their observer was checked out
    detached: Vec<SubscriptionId>,
    /// Next subscription ID to assign
    next_id: SubscriptionId,
    /// True while observers are checked out
    dispatching: bool,
    /// Set once the subject completed or failed
    terminal: Option<Terminal>,
}

impl<T> Default for SubscriptionManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SubscriptionManager<T> {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            detached: Vec::new(),
            next_id: 1,
            dispatching: false,
            terminal: None,
        }
    }

    /// Registers an observer.
    ///
    /// Returns the subscription ID that can be used to unsubscribe.
    pub fn subscribe(&mut self, observer: BoxedObserver<T>) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the observer was registered or checked out.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        if let Some(pos) = self.observers.iter().position(|(oid, _)| *oid == id) {
            self.observers.remove(pos);
            true
        } else if self.dispatching {
            self.detached.push(id);
            true
        } else {
            false
        }
    }

    /// Returns true if `id` was unsubscribed during the current dispatch.
    #[inline]
    pub fn is_detached(&self, id: SubscriptionId) -> bool {
        self.detached.contains(&id)
    }

    /// Takes every observer out for dispatch.
    pub fn check_out(&mut self) -> Vec<(SubscriptionId, BoxedObserver<T>)> {
        self.dispatching = true;
        mem::take(&mut self.observers)
    }

    /// Returns checked-out observers, keeping those added during dispatch
    /// and dropping those unsubscribed during it.
    pub fn check_in(&mut self, mut observers: Vec<(SubscriptionId, BoxedObserver<T>)>) {
        self.dispatching = false;
        let detached = mem::take(&mut self.detached);
        observers.retain(|(id, _)| !detached.contains(id));
        observers.append(&mut self.observers);
        self.observers = observers;
    }

    /// Returns the number of registered observers.
    #[inline]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns true if there are no registered observers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Returns the terminal state, if any.
    #[inline]
    pub fn terminal(&self) -> Option<&Terminal> {
        self.terminal.as_ref()
    }

    /// Records the terminal state and drops every observer.
    pub fn terminate(&mut self, terminal: Terminal) {
        self.terminal = Some(terminal);
        self.observers.clear();
        self.detached.clear();
        self.dispatching = false;
    }
}

/// Handle to a subject subscription.
///
/// Dropping the handle does not unsubscribe; call `dispose`.
pub struct SubjectSubscription<T> {
    manager: Weak<RefCell<SubscriptionManager<T>>>,
    id: SubscriptionId,
    disposed: bool,
}

impl<T> SubjectSubscription<T> {
    pub(crate) fn new(manager: Weak<RefCell<SubscriptionManager<T>>>, id: SubscriptionId) -> Self {
        Self {
            manager,
            id,
            disposed: false,
        }
    }

    pub(crate) fn closed() -> Self {
        Self {
            manager: Weak::new(),
            id: 0,
            disposed: true,
        }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl<T> Disposable for SubjectSubscription<T> {
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(manager) = self.manager.upgrade() {
            // Dispatch holds no borrow while observers run, so this only
            // fails if dispose is called from inside the manager itself.
            if let Ok(mut manager) = manager.try_borrow_mut() {
                manager.unsubscribe(self.id);
            }
        }
    }

    #[inline]
    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use ripple_core::FnObserver;

    fn noop() -> BoxedObserver<i32> {
        Box::new(FnObserver::new(|_: i32| {}))
    }

    #[test]
    fn test_subscription_manager_subscribe() {
        let mut manager = SubscriptionManager::new();
        let id1 = manager.subscribe(noop());
        let id2 = manager.subscribe(noop());

        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_subscription_manager_unsubscribe() {
        let mut manager = SubscriptionManager::new();
        let id = manager.subscribe(noop());

        assert!(manager.unsubscribe(id));
        assert!(manager.is_empty());
        assert!(!manager.unsubscribe(id));
    }

    #[test]
    fn test_check_in_merges_changes() {
        let mut manager = SubscriptionManager::new();
        let id1 = manager.subscribe(noop());
        let id2 = manager.subscribe(noop());

        let out = manager.check_out();
        assert!(manager.is_empty());

        // While checked out: one unsubscribes, one joins.
        assert!(manager.unsubscribe(id1));
        assert!(manager.is_detached(id1));
        let id3 = manager.subscribe(noop());

        manager.check_in(out);
        let ids: Vec<_> = manager.observers.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, [id2, id3]);
        assert!(!manager.is_detached(id1));
    }

    #[test]
    fn test_terminate_clears() {
        let mut manager = SubscriptionManager::new();
        manager.subscribe(noop());
        manager.terminate(Terminal::Completed);
        assert!(manager.is_empty());
        assert_eq!(manager.terminal(), Some(&Terminal::Completed));
    }

    #[test]
    fn test_subscription_handle_dispose() {
        let manager = Rc::new(RefCell::new(SubscriptionManager::new()));
        let id = manager.borrow_mut().subscribe(noop());
        let mut handle = SubjectSubscription::new(Rc::downgrade(&manager), id);

        assert!(!handle.is_disposed());
        handle.dispose();
        assert!(handle.is_disposed());
        assert!(manager.borrow().is_empty());

        // Second dispose is a no-op.
        handle.dispose();
    }
}
