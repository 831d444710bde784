//! Multicast subjects.
//!
//! A `Subject` is both an observer and an observable: values pushed into it
//! are forwarded to every subscriber. Delivery is serialized: a value pushed
//! from inside a subscriber callback is queued and delivered after the
//! current value has reached every subscriber, so no subscriber is ever
//! re-entered.

use crate::subscription::{SubjectSubscription, SubscriptionManager, Terminal};
use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use ripple_core::{Error, Observable, Observer};

/// One queued call on a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification<T> {
    Next(T),
    Error(Error),
    Completed,
}

impl<T> Notification<T> {
    /// Returns true for `Error` and `Completed`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }

    /// Delivers this notification to `observer`.
    pub fn deliver<O: Observer<T> + ?Sized>(self, observer: &mut O) {
        match self {
            Notification::Next(value) => observer.on_next(value),
            Notification::Error(error) => observer.on_error(error),
            Notification::Completed => observer.on_completed(),
        }
    }
}

struct Dispatch<T> {
    queue: RefCell<VecDeque<Notification<T>>>,
    draining: Cell<bool>,
    /// Set as soon as a terminal call is queued
    stopped: Cell<bool>,
}

/// A multicast push channel.
///
/// Cloning a `Subject` yields another handle to the same channel.
pub struct Subject<T> {
    manager: Rc<RefCell<SubscriptionManager<T>>>,
    dispatch: Rc<Dispatch<T>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            manager: Rc::clone(&self.manager),
            dispatch: Rc::clone(&self.dispatch),
        }
    }
}

impl<T: Clone + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Subject<T> {
    /// Creates a subject with no subscribers.
    pub fn new() -> Self {
        Self {
            manager: Rc::new(RefCell::new(SubscriptionManager::new())),
            dispatch: Rc::new(Dispatch {
                queue: RefCell::new(VecDeque::new()),
                draining: Cell::new(false),
                stopped: Cell::new(false),
            }),
        }
    }

    /// Pushes a value to every subscriber.
    pub fn next(&self, value: T) {
        self.push(Notification::Next(value));
    }

    /// Terminates the subject with an error.
    pub fn error(&self, error: Error) {
        self.push(Notification::Error(error));
    }

    /// Terminates the subject.
    pub fn complete(&self) {
        self.push(Notification::Completed);
    }

    /// Returns the number of live subscribers.
    pub fn observer_count(&self) -> usize {
        self.manager.borrow().len()
    }

    /// Returns the number of values queued behind the one being delivered.
    pub(crate) fn queued(&self) -> usize {
        self.dispatch
            .queue
            .borrow()
            .iter()
            .filter(|n| !n.is_terminal())
            .count()
    }

    /// Returns true once `error` or `complete` has been called.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.dispatch.stopped.get()
    }

    /// Queues a notification and drains the queue unless a drain is already
    /// running further up the stack.
    pub fn push(&self, notification: Notification<T>) {
        if self.dispatch.stopped.get() {
            return;
        }
        if notification.is_terminal() {
            self.dispatch.stopped.set(true);
        }
        self.dispatch.queue.borrow_mut().push_back(notification);
        if self.dispatch.draining.replace(true) {
            return;
        }

        loop {
            let next = self.dispatch.queue.borrow_mut().pop_front();
            match next {
                Some(notification) => self.dispatch_one(notification),
                None => break,
            }
        }
        self.dispatch.draining.set(false);
    }

    fn dispatch_one(&self, notification: Notification<T>) {
        let mut observers = self.manager.borrow_mut().check_out();
        match notification {
            Notification::Next(value) => {
                for (id, observer) in observers.iter_mut() {
                    if self.manager.borrow().is_detached(*id) {
                        continue;
                    }
                    observer.on_next(value.clone());
                }
                self.manager.borrow_mut().check_in(observers);
            }
            Notification::Error(error) => {
                log::trace!("subject failed with {} observers", observers.len());
                for (id, observer) in observers.iter_mut() {
                    if self.manager.borrow().is_detached(*id) {
                        continue;
                    }
                    observer.on_error(error.clone());
                }
                // Observers that joined during this dispatch are still in
                // the manager.
                let late = self.manager.borrow_mut().check_out();
                self.manager.borrow_mut().terminate(Terminal::Failed(error.clone()));
                for (_, mut observer) in late {
                    observer.on_error(error.clone());
                }
            }
            Notification::Completed => {
                log::trace!("subject completed with {} observers", observers.len());
                for (id, observer) in observers.iter_mut() {
                    if self.manager.borrow().is_detached(*id) {
                        continue;
                    }
                    observer.on_completed();
                }
                // Observers that joined during this dispatch are still in
                // the manager.
                let late = self.manager.borrow_mut().check_out();
                self.manager.borrow_mut().terminate(Terminal::Completed);
                for (_, mut observer) in late {
                    observer.on_completed();
                }
            }
        }
    }
}

impl<T: Clone + 'static> Observable<T> for Subject<T> {
    type Subscription = SubjectSubscription<T>;

    fn subscribe<O>(&self, mut observer: O) -> SubjectSubscription<T>
    where
        O: Observer<T> + 'static,
    {
        let terminal = self.manager.borrow().terminal().cloned();
        match terminal {
            Some(Terminal::Completed) => {
                observer.on_completed();
                SubjectSubscription::closed()
            }
            Some(Terminal::Failed(error)) => {
                observer.on_error(error);
                SubjectSubscription::closed()
            }
            None => {
                let id = self.manager.borrow_mut().subscribe(Box::new(observer));
                SubjectSubscription::new(Rc::downgrade(&self.manager), id)
            }
        }
    }
}

impl<T: Clone + 'static> Observer<T> for Subject<T> {
    #[inline]
    fn on_next(&mut self, value: T) {
        self.next(value);
    }

    #[inline]
    fn on_error(&mut self, error: Error) {
        self.error(error);
    }

    #[inline]
    fn on_completed(&mut self) {
        self.complete();
    }
}

/// A subject that remembers its latest value.
///
/// New subscribers receive the current value synchronously from inside
/// `subscribe`, then every later value.
pub struct BehaviorSubject<T> {
    subject: Subject<T>,
    value: Rc<RefCell<T>>,
}

impl<T> Clone for BehaviorSubject<T> {
    fn clone(&self) -> Self {
        Self {
            subject: self.subject.clone(),
            value: Rc::clone(&self.value),
        }
    }
}

impl<T: Clone + 'static> BehaviorSubject<T> {
    /// Creates a subject holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            subject: Subject::new(),
            value: Rc::new(RefCell::new(initial)),
        }
    }

    /// Returns a copy of the current value.
    pub fn value(&self) -> T {
        self.value.borrow().clone()
    }

    /// Stores and pushes a new value.
    pub fn next(&self, value: T) {
        if self.subject.is_stopped() {
            return;
        }
        *self.value.borrow_mut() = value.clone();
        self.subject.next(value);
    }

    /// Terminates with an error.
    pub fn error(&self, error: Error) {
        self.subject.error(error);
    }

    /// Terminates the subject; the current value is kept.
    pub fn complete(&self) {
        self.subject.complete();
    }

    /// Returns the number of live subscribers.
    pub fn observer_count(&self) -> usize {
        self.subject.observer_count()
    }
}

impl<T: Clone + 'static> Observable<T> for BehaviorSubject<T> {
    type Subscription = SubjectSubscription<T>;

    fn subscribe<O>(&self, mut observer: O) -> SubjectSubscription<T>
    where
        O: Observer<T> + 'static,
    {
        if !self.subject.is_stopped() {
            let current = self.value();
            observer.on_next(current);
        }
        self.subject.subscribe(observer)
    }
}

impl<T: Clone + 'static> Observer<T> for BehaviorSubject<T> {
    #[inline]
    fn on_next(&mut self, value: T) {
        self.next(value);
    }

    #[inline]
    fn on_error(&mut self, error: Error) {
        self.error(error);
    }

    #[inline]
    fn on_completed(&mut self) {
        self.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Recorder;
    use alloc::vec;
    use alloc::vec::Vec;
    use ripple_core::{Disposable, FnObserver};

    #[test]
    fn test_subject_multicast() {
        let subject = Subject::new();
        let a = Recorder::new();
        let b = Recorder::new();
        subject.subscribe(a.clone());
        subject.subscribe(b.clone());

        subject.next(1);
        subject.next(2);

        assert_eq!(a.values(), vec![1, 2]);
        assert_eq!(b.values(), vec![1, 2]);
        assert_eq!(subject.observer_count(), 2);
    }

    #[test]
    fn test_subject_dispose_stops_delivery() {
        let subject = Subject::new();
        let recorder = Recorder::new();
        let mut sub = subject.subscribe(recorder.clone());

        subject.next(1);
        sub.dispose();
        subject.next(2);

        assert_eq!(recorder.values(), vec![1]);
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn test_subject_complete_is_terminal() {
        let subject = Subject::new();
        let recorder = Recorder::new();
        subject.subscribe(recorder.clone());

        subject.complete();
        subject.next(1);
        subject.error(Error::source("late"));

        assert!(recorder.is_completed());
        assert!(recorder.values().is_empty());
        assert_eq!(recorder.error(), None);
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn test_subscribe_after_terminal() {
        let subject: Subject<i32> = Subject::new();
        subject.error(Error::source("boom"));

        let recorder = Recorder::new();
        let sub = subject.subscribe(recorder.clone());
        assert!(sub.is_disposed());
        assert_eq!(recorder.error(), Some(Error::source("boom")));
    }

    #[test]
    fn test_reentrant_next_is_queued() {
        let subject = Subject::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let inner = subject.clone();
        let log = order.clone();
        subject.subscribe(FnObserver::new(move |v: i32| {
            log.borrow_mut().push(("first", v));
            if v == 1 {
                inner.next(2);
            }
        }));
        let log = order.clone();
        subject.subscribe(FnObserver::new(move |v: i32| {
            log.borrow_mut().push(("second", v));
        }));

        subject.next(1);

        // 1 reaches every observer before 2 is delivered.
        assert_eq!(
            *order.borrow(),
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[test]
    fn test_dispose_during_dispatch() {
        let subject = Subject::new();
        let recorder = Recorder::new();
        let victim: Rc<RefCell<Option<SubjectSubscription<i32>>>> = Rc::new(RefCell::new(None));

        let slot = victim.clone();
        subject.subscribe(FnObserver::new(move |_: i32| {
            if let Some(sub) = slot.borrow_mut().as_mut() {
                sub.dispose();
            }
        }));
        *victim.borrow_mut() = Some(subject.subscribe(recorder.clone()));

        subject.next(1);
        subject.next(2);

        assert!(recorder.values().is_empty());
        assert_eq!(subject.observer_count(), 1);
    }

    #[test]
    fn test_behavior_subject_replays_current() {
        let subject = BehaviorSubject::new(10);
        subject.next(11);

        let recorder = Recorder::new();
        subject.subscribe(recorder.clone());
        subject.next(12);

        assert_eq!(recorder.values(), vec![11, 12]);
        assert_eq!(subject.value(), 12);
    }

    #[test]
    fn test_behavior_subject_after_complete() {
        let subject = BehaviorSubject::new(1);
        subject.complete();
        subject.next(2);

        let recorder = Recorder::new();
        subject.subscribe(recorder.clone());
        assert!(recorder.values().is_empty());
        assert!(recorder.is_completed());
        assert_eq!(subject.value(), 1);
    }
}
