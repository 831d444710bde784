//! Incremental sort operators.
//!
//! Both variants keep a `SortedProjection` of the keyed source items under
//! the active comparator. Source moves only update bookkeeping, since an
//! item's sorted position depends on its key alone. The comparator can be
//! swapped at any time; the projection is re-sorted and the downstream
//! receives the moves that turn the old order into the new one.

use crate::outlet::Outlet;
use crate::shadow::{attach, position_of, ItemSink, Shadow};
use crate::slot::{connect, SubscriptionSlot};
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use ripple_core::{Disposable, Error, ListChange, Observable, Observer, Result};
use ripple_index::{Comparator, SortedProjection};

/// Sorted projection plus the comparator it is sorted under.
struct SortState<K, C> {
    projection: SortedProjection<K>,
    comparer: C,
}

impl<K, C: Comparator<K>> SortState<K, C> {
    fn new(comparer: C) -> Self {
        Self {
            projection: SortedProjection::new(),
            comparer,
        }
    }

    fn insert<T>(&mut self, origin: usize, key: Option<K>, item: T) -> Option<ListChange<T>> {
        match key {
            Some(key) => {
                let pos = self.projection.insert(origin, key, &self.comparer);
                Some(ListChange::insert(pos, item))
            }
            None => {
                self.projection.insert_slot(origin);
                None
            }
        }
    }

    fn remove<T>(&mut self, origin: usize) -> Option<ListChange<T>> {
        self.projection.remove_slot(origin).map(ListChange::remove)
    }

    /// Gives source slot `origin` a new item with `key`, which is `None`
    /// while the key is pending.
    fn replace<T>(&mut self, origin: usize, key: Option<K>, item: T, out: &mut Vec<ListChange<T>>) {
        let placed = self.projection.position(origin).is_some();
        match (placed, key) {
            (true, Some(key)) => {
                let (old, new) = self.projection.reposition(origin, key, &self.comparer);
                if old == new {
                    out.push(ListChange::replace(new, item));
                } else {
                    out.push(ListChange::remove(old));
                    out.push(ListChange::insert(new, item));
                }
            }
            (true, None) => {
                if let Some((pos, _)) = self.projection.take(origin) {
                    out.push(ListChange::remove(pos));
                }
            }
            (false, Some(key)) => {
                let pos = self.projection.place(origin, key, &self.comparer);
                out.push(ListChange::insert(pos, item));
            }
            (false, None) => {}
        }
    }

    /// Applies a new key for the unchanged item in slot `origin`.
    fn rekey<T>(&mut self, origin: usize, key: K, item: impl FnOnce() -> T) -> Option<ListChange<T>> {
        if self.projection.position(origin).is_none() {
            let pos = self.projection.place(origin, key, &self.comparer);
            return Some(ListChange::insert(pos, item()));
        }
        let (old, new) = self.projection.reposition(origin, key, &self.comparer);
        (old != new).then(|| ListChange::relocate(old, new))
    }

    fn resort<T>(&mut self, comparer: C) -> Vec<ListChange<T>> {
        self.comparer = comparer;
        let moves = self.projection.resort(&self.comparer);
        log::debug!(
            "re-sorted {} entries with {} moves",
            self.projection.len(),
            moves.len()
        );
        moves
            .into_iter()
            .map(|(from, to)| ListChange::relocate(from, to))
            .collect()
    }

    fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.projection.iter().map(|(_, k)| k.clone()).collect()
    }
}

/// The stage side of a comparator stream.
trait ComparerSink<C> {
    fn comparer_next(&self, comparer: C);
    fn comparer_error(&self, error: Error);
}

struct ComparerObserver<W> {
    stage: Weak<W>,
}

impl<C, W: ComparerSink<C>> Observer<C> for ComparerObserver<W> {
    fn on_next(&mut self, comparer: C) {
        if let Some(stage) = self.stage.upgrade() {
            stage.comparer_next(comparer);
        }
    }

    fn on_error(&mut self, error: Error) {
        if let Some(stage) = self.stage.upgrade() {
            stage.comparer_error(error);
        }
    }

    fn on_completed(&mut self) {
        // The last comparator stays in effect.
        log::trace!("comparer stream completed");
    }
}

fn bind<W, C, S>(stage: &Rc<W>, slot: &SubscriptionSlot, comparers: S)
where
    W: ComparerSink<C> + 'static,
    S: Observable<C>,
    S::Subscription: 'static,
{
    slot.release();
    let subscription = comparers.subscribe(ComparerObserver {
        stage: Rc::downgrade(stage),
    });
    slot.set(subscription);
}

struct OrderByInner<T, K, F, C, O> {
    key: F,
    state: RefCell<SortState<K, C>>,
    outlet: Outlet<T, O>,
    comparer_subscription: SubscriptionSlot,
    upstream: SubscriptionSlot,
    disposed: Cell<bool>,
}

/// Sort by a synchronous key selector.
pub struct OrderBy<T, K, F, C, O> {
    inner: Rc<OrderByInner<T, K, F, C, O>>,
}

impl<T, K, F, C, O> Clone for OrderBy<T, K, F, C, O> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, K, F, C, O> OrderBy<T, K, F, C, O>
where
    T: 'static,
    K: 'static,
    F: Fn(&T) -> Result<K> + 'static,
    C: Comparator<K> + 'static,
    O: Observer<ListChange<T>> + 'static,
{
    /// Creates a sort stage ordering by `key` under `comparer`.
    pub fn new(key: F, comparer: C, downstream: O) -> Self {
        Self {
            inner: Rc::new(OrderByInner {
                key,
                state: RefCell::new(SortState::new(comparer)),
                outlet: Outlet::new(downstream),
                comparer_subscription: SubscriptionSlot::new(),
                upstream: SubscriptionSlot::new(),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Re-sorts under a new comparator.
    pub fn set_comparer(&self, comparer: C) {
        self.inner.comparer_next(comparer);
    }

    /// Follows a comparator stream, replacing any earlier binding.
    ///
    /// Completion of the stream keeps the last comparator; an error
    /// terminates the stage.
    pub fn bind_comparer<S>(&self, comparers: S)
    where
        S: Observable<C>,
        S::Subscription: 'static,
    {
        bind(&self.inner, &self.inner.comparer_subscription, comparers);
    }

    /// Subscribes the stage to `source`; `dispose` detaches it again.
    pub fn subscribe_to<Src>(&self, source: &Src)
    where
        Src: Observable<ListChange<T>>,
        Src::Subscription: 'static,
    {
        connect(&self.inner.upstream, &self.inner.disposed, source, self.clone());
    }

    /// Returns the number of sorted items.
    pub fn len(&self) -> usize {
        self.inner.state.borrow().projection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the keys in sorted order.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.inner.state.borrow().keys()
    }
}

impl<T, K, F, C, O> OrderByInner<T, K, F, C, O>
where
    F: Fn(&T) -> Result<K>,
    C: Comparator<K>,
    O: Observer<ListChange<T>>,
{
    fn on_source(&self, change: ListChange<T>) {
        if self.outlet.is_stopped() {
            return;
        }
        let mut out = Vec::new();
        match change {
            ListChange::Insert { index, item } => {
                let key = match (self.key)(&item) {
                    Ok(key) => key,
                    Err(error) => return self.fail(error),
                };
                out.extend(self.state.borrow_mut().insert(index, Some(key), item));
            }
            ListChange::Remove { index } => {
                out.extend(self.state.borrow_mut().remove(index));
            }
            ListChange::Replace { index, item } => {
                let key = match (self.key)(&item) {
                    Ok(key) => key,
                    Err(error) => return self.fail(error),
                };
                self.state
                    .borrow_mut()
                    .replace(index, Some(key), item, &mut out);
            }
            ListChange::Move { from, to } => {
                self.state.borrow_mut().projection.move_slot(from, to);
            }
            ListChange::RemoveAll => {
                self.state.borrow_mut().projection.clear();
                out.push(ListChange::RemoveAll);
            }
        }
        if !out.is_empty() {
            log::trace!("order by emits {} changes", out.len());
            self.outlet.emit(out);
        }
    }

    fn fail(&self, error: Error) {
        if self.outlet.is_stopped() {
            return;
        }
        log::warn!("order by stopped: {}", error);
        self.outlet.fail(error);
        self.comparer_subscription.release();
    }
}

impl<T, K, F, C, O> ComparerSink<C> for OrderByInner<T, K, F, C, O>
where
    F: Fn(&T) -> Result<K>,
    C: Comparator<K>,
    O: Observer<ListChange<T>>,
{
    fn comparer_next(&self, comparer: C) {
        if self.outlet.is_stopped() {
            return;
        }
        let moves = self.state.borrow_mut().resort(comparer);
        self.outlet.emit(moves);
    }

    fn comparer_error(&self, error: Error) {
        self.fail(error);
    }
}

impl<T, K, F, C, O> Drop for OrderByInner<T, K, F, C, O> {
    fn drop(&mut self) {
        self.comparer_subscription.release();
        self.upstream.release();
    }
}

impl<T, K, F, C, O> Observer<ListChange<T>> for OrderBy<T, K, F, C, O>
where
    F: Fn(&T) -> Result<K>,
    C: Comparator<K>,
    O: Observer<ListChange<T>>,
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
        self.inner.comparer_subscription.release();
    }
}

impl<T, K, F, C, O> Disposable for OrderBy<T, K, F, C, O> {
    fn dispose(&mut self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.outlet.stop();
        self.inner.comparer_subscription.release();
        self.inner.upstream.release();
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

type SortShadow<T, K, D> = Shadow<T, K, D>;

struct DynamicSort<T, K, D, C> {
    /// Shadow items in source order
    items: Vec<Rc<SortShadow<T, K, D>>>,
    sort: SortState<K, C>,
}

impl<T, K, D: Disposable, C> DynamicSort<T, K, D, C> {
    fn release(&mut self) {
        for shadow in self.items.drain(..) {
            shadow.dispose();
        }
    }
}

struct OrderByDynamicInner<T, K, F, S, C, O>
where
    S: Observable<K>,
{
    key: F,
    state: RefCell<DynamicSort<T, K, S::Subscription, C>>,
    outlet: Outlet<T, O>,
    comparer_subscription: SubscriptionSlot,
    upstream: SubscriptionSlot,
    disposed: Cell<bool>,
}

/// Sort by a key stream per item.
///
/// An item enters the sorted output when its key stream produces its first
/// key. Every later key re-positions it, emitting a move only when its
/// position actually changes.
pub struct OrderByDynamic<T, K, F, S, C, O>
where
    S: Observable<K>,
{
    inner: Rc<OrderByDynamicInner<T, K, F, S, C, O>>,
}

impl<T, K, F, S, C, O> Clone for OrderByDynamic<T, K, F, S, C, O>
where
    S: Observable<K>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, K, F, S, C, O> OrderByDynamic<T, K, F, S, C, O>
where
    T: Clone + 'static,
    K: 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<K> + 'static,
    S::Subscription: 'static,
    C: Comparator<K> + 'static,
    O: Observer<ListChange<T>> + 'static,
{
    /// Creates a sort stage ordering by per-item key streams.
    pub fn new(key: F, comparer: C, downstream: O) -> Self {
        Self {
            inner: Rc::new(OrderByDynamicInner {
                key,
                state: RefCell::new(DynamicSort {
                    items: Vec::new(),
                    sort: SortState::new(comparer),
                }),
                outlet: Outlet::new(downstream),
                comparer_subscription: SubscriptionSlot::new(),
                upstream: SubscriptionSlot::new(),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Re-sorts under a new comparator.
    pub fn set_comparer(&self, comparer: C) {
        self.inner.comparer_next(comparer);
    }

    /// Follows a comparator stream, replacing any earlier binding.
    pub fn bind_comparer<Q>(&self, comparers: Q)
    where
        Q: Observable<C>,
        Q::Subscription: 'static,
    {
        bind(&self.inner, &self.inner.comparer_subscription, comparers);
    }

    /// Subscribes the stage to `source`; `dispose` detaches it again.
    pub fn subscribe_to<Src>(&self, source: &Src)
    where
        Src: Observable<ListChange<T>>,
        Src::Subscription: 'static,
    {
        connect(&self.inner.upstream, &self.inner.disposed, source, self.clone());
    }

    /// Returns the number of items with a key.
    pub fn len(&self) -> usize {
        self.inner.state.borrow().sort.projection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of source items tracked, keyed or not.
    pub fn source_len(&self) -> usize {
        self.inner.state.borrow().items.len()
    }

    /// Returns the keys in sorted order.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.inner.state.borrow().sort.keys()
    }
}

impl<T, K, F, S, C, O> OrderByDynamicInner<T, K, F, S, C, O>
where
    T: Clone + 'static,
    K: 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<K> + 'static,
    S::Subscription: 'static,
    C: Comparator<K> + 'static,
    O: Observer<ListChange<T>> + 'static,
{
    fn shadow_for(self: &Rc<Self>, item: T) -> Option<Rc<SortShadow<T, K, S::Subscription>>> {
        let source = match (self.key)(&item) {
            Ok(source) => source,
            Err(error) => {
                self.fail(error);
                return None;
            }
        };
        let shadow = attach(self, Shadow::new(item), source);
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
        let mut out = Vec::new();
        match change {
            ListChange::Insert { index, item } => {
                let Some(shadow) = self.shadow_for(item) else {
                    return;
                };
                let mut state = self.state.borrow_mut();
                state.items.insert(index, Rc::clone(&shadow));
                let key = shadow.take_value();
                out.extend(state.sort.insert(index, key, shadow.item().clone()));
            }
            ListChange::Remove { index } => {
                let mut state = self.state.borrow_mut();
                state.items.remove(index).dispose();
                out.extend(state.sort.remove(index));
            }
            ListChange::Replace { index, item } => {
                let Some(shadow) = self.shadow_for(item) else {
                    return;
                };
                let mut state = self.state.borrow_mut();
                let old = core::mem::replace(&mut state.items[index], Rc::clone(&shadow));
                old.dispose();
                let key = shadow.take_value();
                state
                    .sort
                    .replace(index, key, shadow.item().clone(), &mut out);
            }
            ListChange::Move { from, to } => {
                let mut state = self.state.borrow_mut();
                let shadow = state.items.remove(from);
                state.items.insert(to, shadow);
                state.sort.projection.move_slot(from, to);
            }
            ListChange::RemoveAll => {
                let mut state = self.state.borrow_mut();
                state.release();
                state.sort.projection.clear();
                out.push(ListChange::RemoveAll);
            }
        }
        if !out.is_empty() {
            log::trace!("dynamic order by emits {} changes", out.len());
            self.outlet.emit(out);
        }
    }

    fn release_items(&self) {
        let mut items = core::mem::take(&mut self.state.borrow_mut().items);
        for shadow in items.drain(..) {
            shadow.dispose();
        }
    }

    fn fail(&self, error: Error) {
        if self.outlet.is_stopped() {
            return;
        }
        log::warn!("dynamic order by stopped: {}", error);
        self.outlet.fail(error);
        self.release_items();
        self.comparer_subscription.release();
    }
}

impl<T, K, F, S, C, O> ItemSink<T, K, S::Subscription, ()> for OrderByDynamicInner<T, K, F, S, C, O>
where
    T: Clone + 'static,
    K: 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<K> + 'static,
    S::Subscription: 'static,
    C: Comparator<K> + 'static,
    O: Observer<ListChange<T>> + 'static,
{
    fn item_next(&self, shadow: &Rc<SortShadow<T, K, S::Subscription>>, key: K) {
        if self.outlet.is_stopped() {
            return;
        }
        let out = {
            let mut state = self.state.borrow_mut();
            let Some(origin) = position_of(&state.items[..], shadow) else {
                return;
            };
            state.sort.rekey(origin, key, || shadow.item().clone())
        };
        if let Some(out) = out {
            log::trace!("dynamic order by re-keyed: {:?}", out.kind());
            self.outlet.emit([out]);
        }
    }

    fn item_error(&self, error: Error) {
        self.fail(error);
    }
}

impl<T, K, F, S, C, O> ComparerSink<C> for OrderByDynamicInner<T, K, F, S, C, O>
where
    T: Clone + 'static,
    K: 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<K> + 'static,
    S::Subscription: 'static,
    C: Comparator<K> + 'static,
    O: Observer<ListChange<T>> + 'static,
{
    fn comparer_next(&self, comparer: C) {
        if self.outlet.is_stopped() {
            return;
        }
        let moves = self.state.borrow_mut().sort.resort(comparer);
        self.outlet.emit(moves);
    }

    fn comparer_error(&self, error: Error) {
        self.fail(error);
    }
}

impl<T, K, F, S, C, O> Drop for OrderByDynamicInner<T, K, F, S, C, O>
where
    S: Observable<K>,
{
    fn drop(&mut self) {
        self.state.get_mut().release();
        self.comparer_subscription.release();
        self.upstream.release();
    }
}

impl<T, K, F, S, C, O> Observer<ListChange<T>> for OrderByDynamic<T, K, F, S, C, O>
where
    T: Clone + 'static,
    K: 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<K> + 'static,
    S::Subscription: 'static,
    C: Comparator<K> + 'static,
    O: Observer<ListChange<T>> + 'static,
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
        self.inner.comparer_subscription.release();
    }
}

impl<T, K, F, S, C, O> Disposable for OrderByDynamic<T, K, F, S, C, O>
where
    T: Clone + 'static,
    K: 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<K> + 'static,
    S::Subscription: 'static,
    C: Comparator<K> + 'static,
    O: Observer<ListChange<T>> + 'static,
{
    fn dispose(&mut self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.outlet.stop();
        self.inner.release_items();
        self.inner.comparer_subscription.release();
        self.inner.upstream.release();
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}
