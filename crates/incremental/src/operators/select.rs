//! Incremental projection operators.

use crate::outlet::Outlet;
use crate::shadow::{attach, position_of, ItemSink, Shadow};
use crate::slot::{connect, SubscriptionSlot};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::marker::PhantomData;
use ripple_core::{Disposable, Error, ListChange, Observable, Observer, Result};
use ripple_index::count_before;

/// Projection with a synchronous selector.
///
/// Index preserving: only inserted and replacing items go through the
/// selector, everything else passes through unchanged.
pub struct Select<T, R, F, O> {
    selector: F,
    downstream: O,
    stopped: bool,
    _marker: PhantomData<fn(T) -> R>,
}

impl<T, R, F, O> Select<T, R, F, O>
where
    F: Fn(&T) -> Result<R>,
    O: Observer<ListChange<R>>,
{
    pub fn new(selector: F, downstream: O) -> Self {
        Self {
            selector,
            downstream,
            stopped: false,
            _marker: PhantomData,
        }
    }
}

impl<T, R, F, O> Observer<ListChange<T>> for Select<T, R, F, O>
where
    F: Fn(&T) -> Result<R>,
    O: Observer<ListChange<R>>,
{
    fn on_next(&mut self, change: ListChange<T>) {
        if self.stopped {
            return;
        }
        let out = match change {
            ListChange::Insert { index, item } => (self.selector)(&item).map(|r| ListChange::insert(index, r)),
            ListChange::Replace { index, item } => (self.selector)(&item).map(|r| ListChange::replace(index, r)),
            ListChange::Remove { index } => Ok(ListChange::remove(index)),
            ListChange::Move { from, to } => Ok(ListChange::relocate(from, to)),
            ListChange::RemoveAll => Ok(ListChange::RemoveAll),
        };
        match out {
            Ok(out) => self.downstream.on_next(out),
            Err(error) => {
                log::warn!("select stopped: {}", error);
                self.stopped = true;
                self.downstream.on_error(error);
            }
        }
    }

    fn on_error(&mut self, error: Error) {
        if !self.stopped {
            self.stopped = true;
            self.downstream.on_error(error);
        }
    }

    fn on_completed(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.downstream.on_completed();
        }
    }
}

// The source item is not needed once its stream is subscribed.
type SelectShadow<R, D> = Shadow<(), R, D>;

fn has_result<R, D>(shadow: &Rc<SelectShadow<R, D>>) -> bool {
    shadow.has_value()
}

struct SelectDynamicInner<T, R, F, S, O>
where
    S: Observable<R>,
{
    selector: F,
    items: RefCell<Vec<Rc<SelectShadow<R, S::Subscription>>>>,
    outlet: Outlet<R, O>,
    disposed: Cell<bool>,
    upstream: SubscriptionSlot,
    _marker: PhantomData<fn(T)>,
}

/// Projection whose result is a stream per item.
///
/// An item is visible downstream once its stream has produced a result;
/// every later result replaces it in place.
pub struct SelectDynamic<T, R, F, S, O>
where
    S: Observable<R>,
{
    inner: Rc<SelectDynamicInner<T, R, F, S, O>>,
}

impl<T, R, F, S, O> Clone for SelectDynamic<T, R, F, S, O>
where
    S: Observable<R>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, R, F, S, O> SelectDynamic<T, R, F, S, O>
where
    T: 'static,
    R: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<R> + 'static,
    S::Subscription: 'static,
    O: Observer<ListChange<R>> + 'static,
{
    pub fn new(selector: F, downstream: O) -> Self {
        Self {
            inner: Rc::new(SelectDynamicInner {
                selector,
                items: RefCell::new(Vec::new()),
                outlet: Outlet::new(downstream),
                disposed: Cell::new(false),
                upstream: SubscriptionSlot::new(),
                _marker: PhantomData,
            }),
        }
    }

    /// Subscribes the stage to `source`; `dispose` detaches it again.
    pub fn subscribe_to<Src>(&self, source: &Src)
    where
        Src: Observable<ListChange<T>>,
        Src::Subscription: 'static,
    {
        connect(&self.inner.upstream, &self.inner.disposed, source, self.clone());
    }

    /// Returns the number of items with a result.
    pub fn len(&self) -> usize {
        self.inner.items.borrow().iter().filter(|s| has_result(s)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, R, F, S, O> SelectDynamicInner<T, R, F, S, O>
where
    T: 'static,
    R: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<R> + 'static,
    S::Subscription: 'static,
    O: Observer<ListChange<R>> + 'static,
{
    fn shadow_for(self: &Rc<Self>, item: &T) -> Option<Rc<SelectShadow<R, S::Subscription>>> {
        let source = match (self.selector)(item) {
            Ok(source) => source,
            Err(error) => {
                self.fail(error);
                return None;
            }
        };
        let shadow = attach(self, Shadow::new(()), source);
        if self.outlet.is_stopped() {
            shadow.dispose();
            return None;
        }
        Some(shadow)
    }

    fn on_source(self: &Rc<Self>, change: ListChange<T>) {
        if self.outlet.is_stopped() {
            return;
        }
        let out = match change {
            ListChange::Insert { index, item } => {
                let Some(shadow) = self.shadow_for(&item) else {
                    return;
                };
                let mut items = self.items.borrow_mut();
                items.insert(index, Rc::clone(&shadow));
                shadow
                    .value()
                    .map(|r| ListChange::insert(count_before(&items[..], index, has_result), r))
            }
            ListChange::Remove { index } => {
                let mut items = self.items.borrow_mut();
                let shadow = items.remove(index);
                shadow.dispose();
                has_result(&shadow).then(|| ListChange::remove(count_before(&items[..], index, has_result)))
            }
            ListChange::Replace { index, item } => {
                let Some(shadow) = self.shadow_for(&item) else {
                    return;
                };
                let mut items = self.items.borrow_mut();
                let old = core::mem::replace(&mut items[index], Rc::clone(&shadow));
                old.dispose();
                let at = count_before(&items[..], index, has_result);
                match (has_result(&old), shadow.value()) {
                    (false, None) => None,
                    (false, Some(r)) => Some(ListChange::insert(at, r)),
                    (true, None) => Some(ListChange::remove(at)),
                    (true, Some(r)) => Some(ListChange::replace(at, r)),
                }
            }
            ListChange::Move { from, to } => {
                let mut items = self.items.borrow_mut();
                let source = count_before(&items[..], from, has_result);
                let shadow = items.remove(from);
                items.insert(to, Rc::clone(&shadow));
                let dest = count_before(&items[..], to, has_result);
                (has_result(&shadow) && source != dest).then(|| ListChange::relocate(source, dest))
            }
            ListChange::RemoveAll => {
                let mut items = self.items.borrow_mut();
                for shadow in items.drain(..) {
                    shadow.dispose();
                }
                Some(ListChange::RemoveAll)
            }
        };
        if let Some(out) = out {
            log::trace!("dynamic select emits {:?}", out.kind());
            self.outlet.emit([out]);
        }
    }

    fn release_items(&self) {
        let items = core::mem::take(&mut *self.items.borrow_mut());
        for shadow in items {
            shadow.dispose();
        }
    }

    fn fail(&self, error: Error) {
        if self.outlet.is_stopped() {
            return;
        }
        log::warn!("dynamic select stopped: {}", error);
        self.outlet.fail(error);
        self.release_items();
    }
}

impl<T, R, F, S, O> ItemSink<(), R, S::Subscription, ()> for SelectDynamicInner<T, R, F, S, O>
where
    T: 'static,
    R: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<R> + 'static,
    S::Subscription: 'static,
    O: Observer<ListChange<R>> + 'static,
{
    fn item_next(&self, shadow: &Rc<SelectShadow<R, S::Subscription>>, result: R) {
        if self.outlet.is_stopped() {
            return;
        }
        let out = {
            let items = self.items.borrow();
            let Some(pos) = position_of(&items[..], shadow) else {
                return;
            };
            let index = count_before(&items[..], pos, has_result);
            match shadow.set_value(result.clone()) {
                Some(_) => ListChange::replace(index, result),
                None => ListChange::insert(index, result),
            }
        };
        self.outlet.emit([out]);
    }

    fn item_error(&self, error: Error) {
        self.fail(error);
    }
}

impl<T, R, F, S, O> Drop for SelectDynamicInner<T, R, F, S, O>
where
    S: Observable<R>,
{
    fn drop(&mut self) {
        for shadow in self.items.get_mut().drain(..) {
            shadow.dispose();
        }
        self.upstream.release();
    }
}

impl<T, R, F, S, O> Observer<ListChange<T>> for SelectDynamic<T, R, F, S, O>
where
    T: 'static,
    R: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<R> + 'static,
    S::Subscription: 'static,
    O: Observer<ListChange<R>> + 'static,
{
    fn on_next(&mut self, change: ListChange<T>) {
        self.inner.on_source(change);
    }

    fn on_error(&mut self, error: Error) {
        self.inner.fail(error);
    }

    fn on_completed(&mut self) {
        if self.inner.outlet.is_stopped() {
            return;
        }
        self.inner.outlet.complete();
        self.inner.release_items();
    }
}

impl<T, R, F, S, O> Disposable for SelectDynamic<T, R, F, S, O>
where
    T: 'static,
    R: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<R> + 'static,
    S::Subscription: 'static,
    O: Observer<ListChange<R>> + 'static,
{
    fn dispose(&mut self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.outlet.stop();
        self.inner.release_items();
        self.inner.upstream.release();
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}
