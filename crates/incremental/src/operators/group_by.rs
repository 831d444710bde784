//! Incremental group-by operators.
//!
//! The output is a list of `Group`s, one per distinct key, in the order the
//! buckets were allocated (freed slots are reused). Each group is itself a
//! stream of list changes over its members in arrival order.

use super::group::{new_mark, run_steps, Group, GroupStep, GroupTable, Mark};
use crate::outlet::Outlet;
use crate::shadow::{attach, position_of, ItemSink, Shadow};
use crate::slot::{connect, SubscriptionSlot};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use ripple_core::{Disposable, Error, ListChange, Observable, Observer, Result};
use ripple_index::{DefaultEquality, KeyEquality};

/// Group-by with a synchronous key selector.
pub struct GroupBy<T, K, F, E, O> {
    key: F,
    /// Placement of every source item, in source order
    marks: Vec<Mark>,
    table: GroupTable<K, T, E>,
    downstream: O,
    stopped: bool,
}

impl<T, K, F, O> GroupBy<T, K, F, DefaultEquality, O>
where
    T: Clone + 'static,
    K: Clone + core::hash::Hash + Eq,
    F: Fn(&T) -> Result<K>,
    O: Observer<ListChange<Group<K, T>>>,
{
    /// Creates a group-by comparing keys with `Eq` and `Hash`.
    pub fn new(key: F, downstream: O) -> Self {
        Self::with_equality(key, DefaultEquality::new(), downstream)
    }
}

impl<T, K, F, E, O> GroupBy<T, K, F, E, O>
where
    T: Clone + 'static,
    K: Clone,
    F: Fn(&T) -> Result<K>,
    E: KeyEquality<K>,
    O: Observer<ListChange<Group<K, T>>>,
{
    /// Creates a group-by comparing keys with `equality`.
    pub fn with_equality(key: F, equality: E, downstream: O) -> Self {
        Self {
            key,
            marks: Vec::new(),
            table: GroupTable::new(equality),
            downstream,
            stopped: false,
        }
    }

    /// Returns the number of groups.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the groups in output order.
    pub fn groups(&self) -> Vec<Group<K, T>> {
        self.table.groups()
    }

    fn translate(&mut self, change: ListChange<T>, steps: &mut Vec<GroupStep<K, T>>) -> Result<()> {
        match change {
            ListChange::Insert { index, item } => {
                let key = (self.key)(&item)?;
                let mark = new_mark();
                self.marks.insert(index, Rc::clone(&mark));
                self.table.assign(&mark, key, item, steps);
            }
            ListChange::Remove { index } => {
                let mark = self.marks.remove(index);
                self.table.unassign(&mark, steps);
            }
            ListChange::Replace { index, item } => {
                let key = (self.key)(&item)?;
                let mark = Rc::clone(&self.marks[index]);
                self.table.replace(&mark, &mark, key, item, steps);
            }
            ListChange::Move { from, to } => {
                let mark = self.marks.remove(from);
                self.marks.insert(to, mark);
            }
            ListChange::RemoveAll => {
                self.marks.clear();
                self.table.clear(steps);
            }
        }
        Ok(())
    }

    fn terminate(&mut self, error: Option<Error>) {
        self.stopped = true;
        self.marks.clear();
        let groups = self.table.take_groups();
        match error {
            Some(error) => {
                for group in &groups {
                    group.fail(error.clone());
                }
                self.downstream.on_error(error);
            }
            None => {
                for group in &groups {
                    group.close();
                }
                self.downstream.on_completed();
            }
        }
    }
}

impl<T, K, F, E, O> Observer<ListChange<T>> for GroupBy<T, K, F, E, O>
where
    T: Clone + 'static,
    K: Clone,
    F: Fn(&T) -> Result<K>,
    E: KeyEquality<K>,
    O: Observer<ListChange<Group<K, T>>>,
{
    fn on_next(&mut self, change: ListChange<T>) {
        if self.stopped {
            return;
        }
        let mut steps = Vec::new();
        let result = self.translate(change, &mut steps);
        let downstream = &mut self.downstream;
        run_steps(steps, |change| downstream.on_next(change));
        if let Err(error) = result {
            log::warn!("group-by stopped: {}", error);
            self.terminate(Some(error));
        }
    }

    fn on_error(&mut self, error: Error) {
        if self.stopped {
            return;
        }
        self.terminate(Some(error));
    }

    fn on_completed(&mut self) {
        if self.stopped {
            return;
        }
        self.terminate(None);
    }
}

type GroupShadow<T, K, D> = Shadow<T, K, D, Mark>;

struct DynamicGroups<T, K, E, D> {
    items: Vec<Rc<GroupShadow<T, K, D>>>,
    table: GroupTable<K, T, E>,
}

struct GroupByDynamicInner<T, K, F, S, E, O>
where
    S: Observable<K>,
{
    key: F,
    state: RefCell<DynamicGroups<T, K, E, S::Subscription>>,
    outlet: Outlet<Group<K, T>, O>,
    disposed: Cell<bool>,
    upstream: SubscriptionSlot,
}

/// Group-by whose key is a stream per item.
///
/// An item belongs to no group until its key stream produces a value; a new
/// key value moves it to the end of its new group.
pub struct GroupByDynamic<T, K, F, S, E, O>
where
    S: Observable<K>,
{
    inner: Rc<GroupByDynamicInner<T, K, F, S, E, O>>,
}

impl<T, K, F, S, E, O> Clone for GroupByDynamic<T, K, F, S, E, O>
where
    S: Observable<K>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, K, F, S, O> GroupByDynamic<T, K, F, S, DefaultEquality, O>
where
    T: Clone + 'static,
    K: Clone + core::hash::Hash + Eq + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<K> + 'static,
    S::Subscription: 'static,
    O: Observer<ListChange<Group<K, T>>> + 'static,
{
    /// Creates a group-by comparing keys with `Eq` and `Hash`.
    pub fn new(key: F, downstream: O) -> Self {
        Self::with_equality(key, DefaultEquality::new(), downstream)
    }
}

impl<T, K, F, S, E, O> GroupByDynamic<T, K, F, S, E, O>
where
    T: Clone + 'static,
    K: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<K> + 'static,
    S::Subscription: 'static,
    E: KeyEquality<K> + 'static,
    O: Observer<ListChange<Group<K, T>>> + 'static,
{
    /// Creates a group-by comparing keys with `equality`.
    pub fn with_equality(key: F, equality: E, downstream: O) -> Self {
        Self {
            inner: Rc::new(GroupByDynamicInner {
                key,
                state: RefCell::new(DynamicGroups {
                    items: Vec::new(),
                    table: GroupTable::new(equality),
                }),
                outlet: Outlet::new(downstream),
                disposed: Cell::new(false),
                upstream: SubscriptionSlot::new(),
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

    /// Returns the number of groups.
    pub fn len(&self) -> usize {
        self.inner.state.borrow().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the groups in output order.
    pub fn groups(&self) -> Vec<Group<K, T>> {
        self.inner.state.borrow().table.groups()
    }

    /// Returns the number of source items tracked.
    pub fn source_len(&self) -> usize {
        self.inner.state.borrow().items.len()
    }
}

impl<T, K, F, S, E, O> GroupByDynamicInner<T, K, F, S, E, O>
where
    T: Clone + 'static,
    K: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<K> + 'static,
    S::Subscription: 'static,
    E: KeyEquality<K> + 'static,
    O: Observer<ListChange<Group<K, T>>> + 'static,
{
    fn shadow_for(self: &Rc<Self>, item: T) -> Option<Rc<GroupShadow<T, K, S::Subscription>>> {
        let source = match (self.key)(&item) {
            Ok(source) => source,
            Err(error) => {
                self.fail(error);
                return None;
            }
        };
        let shadow = attach(self, Shadow::with_mark(item, new_mark()), source);
        if self.outlet.is_stopped() {
            shadow.dispose();
            return None;
        }
        Some(shadow)
    }

    fn run(&self, steps: Vec<GroupStep<K, T>>) {
        run_steps(steps, |change| {
            log::trace!("dynamic group-by emits {:?}", change.kind());
            self.outlet.emit([change]);
        });
    }

    fn on_source(self: &Rc<Self>, change: ListChange<T>) {
        if self.outlet.is_stopped() {
            return;
        }
        let mut steps = Vec::new();
        match change {
            ListChange::Insert { index, item } => {
                let Some(shadow) = self.shadow_for(item) else {
                    return;
                };
                let mut state = self.state.borrow_mut();
                state.items.insert(index, Rc::clone(&shadow));
                if let Some(key) = shadow.value() {
                    state.table.assign(shadow.mark(), key, shadow.item().clone(), &mut steps);
                }
            }
            ListChange::Remove { index } => {
                let mut state = self.state.borrow_mut();
                let shadow = state.items.remove(index);
                shadow.dispose();
                state.table.unassign(shadow.mark(), &mut steps);
            }
            ListChange::Replace { index, item } => {
                let Some(shadow) = self.shadow_for(item) else {
                    return;
                };
                let mut state = self.state.borrow_mut();
                let old = core::mem::replace(&mut state.items[index], Rc::clone(&shadow));
                old.dispose();
                match shadow.value() {
                    Some(key) => state.table.replace(
                        old.mark(),
                        shadow.mark(),
                        key,
                        shadow.item().clone(),
                        &mut steps,
                    ),
                    None => state.table.unassign(old.mark(), &mut steps),
                }
            }
            ListChange::Move { from, to } => {
                let mut state = self.state.borrow_mut();
                let shadow = state.items.remove(from);
                state.items.insert(to, shadow);
            }
            ListChange::RemoveAll => {
                let mut state = self.state.borrow_mut();
                for shadow in state.items.drain(..) {
                    shadow.dispose();
                }
                state.table.clear(&mut steps);
            }
        }
        self.run(steps);
    }

    fn release_items(&self) -> Vec<Group<K, T>> {
        let mut state = self.state.borrow_mut();
        for shadow in state.items.drain(..) {
            shadow.dispose();
        }
        state.table.take_groups()
    }

    fn fail(&self, error: Error) {
        if self.outlet.is_stopped() {
            return;
        }
        log::warn!("dynamic group-by stopped: {}", error);
        let groups = self.release_items();
        for group in &groups {
            group.fail(error.clone());
        }
        self.outlet.fail(error);
    }

    fn complete(&self) {
        if self.outlet.is_stopped() {
            return;
        }
        let groups = self.release_items();
        for group in &groups {
            group.close();
        }
        self.outlet.complete();
    }
}

impl<T, K, F, S, E, O> ItemSink<T, K, S::Subscription, Mark> for GroupByDynamicInner<T, K, F, S, E, O>
where
    T: Clone + 'static,
    K: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<K> + 'static,
    S::Subscription: 'static,
    E: KeyEquality<K> + 'static,
    O: Observer<ListChange<Group<K, T>>> + 'static,
{
    fn item_next(&self, shadow: &Rc<GroupShadow<T, K, S::Subscription>>, key: K) {
        if self.outlet.is_stopped() {
            return;
        }
        let mut steps = Vec::new();
        {
            let mut state = self.state.borrow_mut();
            if position_of(&state.items[..], shadow).is_none() {
                return;
            }
            shadow.set_value(key.clone());
            state
                .table
                .rekey(shadow.mark(), key, || shadow.item().clone(), &mut steps);
        }
        self.run(steps);
    }

    fn item_error(&self, error: Error) {
        self.fail(error);
    }
}

impl<T, K, F, S, E, O> Drop for GroupByDynamicInner<T, K, F, S, E, O>
where
    S: Observable<K>,
{
    fn drop(&mut self) {
        for shadow in self.state.get_mut().items.drain(..) {
            shadow.dispose();
        }
        self.upstream.release();
    }
}

impl<T, K, F, S, E, O> Observer<ListChange<T>> for GroupByDynamic<T, K, F, S, E, O>
where
    T: Clone + 'static,
    K: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<K> + 'static,
    S::Subscription: 'static,
    E: KeyEquality<K> + 'static,
    O: Observer<ListChange<Group<K, T>>> + 'static,
{
    fn on_next(&mut self, change: ListChange<T>) {
        self.inner.on_source(change);
    }

    fn on_error(&mut self, error: Error) {
        self.inner.fail(error);
    }

    fn on_completed(&mut self) {
        self.inner.complete();
    }
}

impl<T, K, F, S, E, O> Disposable for GroupByDynamic<T, K, F, S, E, O>
where
    T: Clone + 'static,
    K: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<K> + 'static,
    S::Subscription: 'static,
    E: KeyEquality<K> + 'static,
    O: Observer<ListChange<Group<K, T>>> + 'static,
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
