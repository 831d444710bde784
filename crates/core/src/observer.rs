//! Push-channel contracts.
//!
//! Every stage consumes an upstream through `Observer` and produces a
//! downstream by calling another `Observer`. Stages are generic over their
//! downstream, so a chain of stages is monomorphized into one call tree.
//!
//! The channel delivering the calls guarantees that all calls into one
//! observer are serialized. Stages rely on that and do no locking.

use crate::error::Error;
use alloc::boxed::Box;
use core::marker::PhantomData;

/// Receives the values of a stream.
///
/// A stream terminates with at most one `on_error` or `on_completed`; no
/// calls follow a terminal call.
pub trait Observer<T> {
    /// Receives the next value.
    fn on_next(&mut self, value: T);

    /// Receives the terminal failure.
    fn on_error(&mut self, error: Error);

    /// Receives the terminal completion.
    fn on_completed(&mut self);
}

impl<T, O: Observer<T> + ?Sized> Observer<T> for Box<O> {
    #[inline]
    fn on_next(&mut self, value: T) {
        (**self).on_next(value)
    }

    #[inline]
    fn on_error(&mut self, error: Error) {
        (**self).on_error(error)
    }

    #[inline]
    fn on_completed(&mut self) {
        (**self).on_completed()
    }
}

/// A handle whose release stops a subscription.
pub trait Disposable {
    /// Releases the subscription. Calling this twice is a no-op.
    fn dispose(&mut self);

    /// Returns true once `dispose` has run.
    fn is_disposed(&self) -> bool;
}

/// A stream that observers can subscribe to.
pub trait Observable<T> {
    /// Handle returned by `subscribe`.
    type Subscription: Disposable;

    /// Subscribes an observer.
    ///
    /// An observable may deliver values synchronously from inside this call,
    /// before the returned handle exists.
    fn subscribe<O>(&self, observer: O) -> Self::Subscription
    where
        O: Observer<T> + 'static;
}

/// An observer built from an `on_next` closure.
///
/// Errors and completion are ignored.
pub struct FnObserver<T, F> {
    on_next: F,
    _marker: PhantomData<fn(T)>,
}

impl<T, F> FnObserver<T, F>
where
    F: FnMut(T),
{
    /// Creates an observer calling `on_next` for every value.
    pub fn new(on_next: F) -> Self {
        Self {
            on_next,
            _marker: PhantomData,
        }
    }
}

impl<T, F> Observer<T> for FnObserver<T, F>
where
    F: FnMut(T),
{
    #[inline]
    fn on_next(&mut self, value: T) {
        (self.on_next)(value)
    }

    fn on_error(&mut self, _error: Error) {}

    fn on_completed(&mut self) {}
}
