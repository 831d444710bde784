//! Incremental filter operators.
//!
//! `Where` keeps one presence bit per source item and translates source
//! positions with popcount-before. `WhereDynamic` subscribes to one predicate
//! stream per item and translates with a count-before scan over its shadow
//! items.

use crate::outlet::Outlet;
use crate::shadow::{attach, position_of, ItemSink, Shadow};
use crate::slot::{connect, SubscriptionSlot};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::marker::PhantomData;
use ripple_core::{Disposable, Error, ListChange, Observable, Observer, Result};
use ripple_index::{count_before, PresenceBitmap};

/// Events for a slot whose presence went from `was` to `now`.
fn presence_change<T>(was: bool, now: bool, index: usize, item: T) -> Option<ListChange<T>> {
    match (was, now) {
        (false, false) => None,
        (false, true) => Some(ListChange::insert(index, item)),
        (true, false) => Some(ListChange::remove(index)),
        (true, true) => Some(ListChange::replace(index, item)),
    }
}

/// Filter with a synchronous predicate.
///
/// The predicate runs only for inserted and replacing items; removals and
/// moves are pure re-indexing.
pub struct Where<T, P, O> {
    predicate: P,
    bitmap: PresenceBitmap,
    downstream: O,
    stopped: bool,
    _marker: PhantomData<fn(T)>,
}

impl<T, P, O> Where<T, P, O>
where
    P: Fn(&T) -> Result<bool>,
    O: Observer<ListChange<T>>,
{
    /// Creates a filter feeding `downstream`.
    pub fn new(predicate: P, downstream: O) -> Self {
        Self {
            predicate,
            bitmap: PresenceBitmap::new(),
            downstream,
            stopped: false,
            _marker: PhantomData,
        }
    }

    /// Returns the number of items that pass the filter.
    #[inline]
    pub fn len(&self) -> usize {
        self.bitmap.count_ones()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of source items tracked.
    #[inline]
    pub fn source_len(&self) -> usize {
        self.bitmap.len()
    }

    fn fail(&mut self, error: Error) {
        log::warn!("filter stopped: {}", error);
        self.stopped = true;
        self.downstream.on_error(error);
    }

    fn translate(&mut self, change: ListChange<T>) -> Result<Option<ListChange<T>>> {
        let out = match change {
            ListChange::Insert { index, item } => {
                let present = (self.predicate)(&item)?;
                self.bitmap.insert(index, present);
                present.then(|| ListChange::insert(self.bitmap.count_before(index), item))
            }
            ListChange::Remove { index } => {
                let was = self.bitmap.remove(index);
                was.then(|| ListChange::remove(self.bitmap.count_before(index)))
            }
            ListChange::Replace { index, item } => {
                let now = (self.predicate)(&item)?;
                let was = self.bitmap.set(index, now);
                presence_change(was, now, self.bitmap.count_before(index), item)
            }
            ListChange::Move { from, to } => {
                let source = self.bitmap.count_before(from);
                self.bitmap.move_bit(from, to);
                if self.bitmap.get(to) {
                    let dest = self.bitmap.count_before(to);
                    (source != dest).then(|| ListChange::relocate(source, dest))
                } else {
                    None
                }
            }
            ListChange::RemoveAll => {
                self.bitmap.clear();
                Some(ListChange::RemoveAll)
            }
        };
        Ok(out)
    }
}

impl<T, P, O> Observer<ListChange<T>> for Where<T, P, O>
where
    P: Fn(&T) -> Result<bool>,
    O: Observer<ListChange<T>>,
{
    fn on_next(&mut self, change: ListChange<T>) {
        if self.stopped {
            return;
        }
        match self.translate(change) {
            Ok(Some(out)) => {
                log::trace!("filter emits {:?}", out.kind());
                self.downstream.on_next(out);
            }
            Ok(None) => {}
            Err(error) => self.fail(error),
        }
    }

    fn on_error(&mut self, error: Error) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.downstream.on_error(error);
    }

    fn on_completed(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.downstream.on_completed();
    }
}

type FilterShadow<T, D> = Shadow<T, bool, D>;

fn is_present<T, D>(shadow: &Rc<FilterShadow<T, D>>) -> bool {
    shadow.value_matches(|present| *present)
}

struct WhereDynamicInner<T, F, S, O>
where
    S: Observable<bool>,
{
    predicate: F,
    items: RefCell<Vec<Rc<FilterShadow<T, S::Subscription>>>>,
    outlet: Outlet<T, O>,
    disposed: Cell<bool>,
    upstream: SubscriptionSlot,
}

/// Filter whose predicate is a stream per item.
///
/// An item is present while the latest value of its predicate stream is
/// `true`. Items whose stream has not produced a value yet are absent.
pub struct WhereDynamic<T, F, S, O>
where
    S: Observable<bool>,
{
    inner: Rc<WhereDynamicInner<T, F, S, O>>,
}

impl<T, F, S, O> Clone for WhereDynamic<T, F, S, O>
where
    S: Observable<bool>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, F, S, O> WhereDynamic<T, F, S, O>
where
    T: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<bool> + 'static,
    S::Subscription: 'static,
    O: Observer<ListChange<T>> + 'static,
{
    /// Creates a filter feeding `downstream`.
    pub fn new(predicate: F, downstream: O) -> Self {
        Self {
            inner: Rc::new(WhereDynamicInner {
                predicate,
                items: RefCell::new(Vec::new()),
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

    /// Returns the number of items currently present.
    pub fn len(&self) -> usize {
        self.inner.items.borrow().iter().filter(|s| is_present(s)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of source items tracked.
    pub fn source_len(&self) -> usize {
        self.inner.items.borrow().len()
    }
}

impl<T, F, S, O> WhereDynamicInner<T, F, S, O>
where
    T: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<bool> + 'static,
    S::Subscription: 'static,
    O: Observer<ListChange<T>> + 'static,
{
    fn shadow_for(self: &Rc<Self>, item: T) -> Option<Rc<FilterShadow<T, S::Subscription>>> {
        let source = match (self.predicate)(&item) {
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
        let out = match change {
            ListChange::Insert { index, item } => {
                let Some(shadow) = self.shadow_for(item) else {
                    return;
                };
                let mut items = self.items.borrow_mut();
                items.insert(index, Rc::clone(&shadow));
                is_present(&shadow).then(|| {
                    ListChange::insert(count_before(&items[..], index, is_present), shadow.item().clone())
                })
            }
            ListChange::Remove { index } => {
                let mut items = self.items.borrow_mut();
                let shadow = items.remove(index);
                shadow.dispose();
                is_present(&shadow).then(|| ListChange::remove(count_before(&items[..], index, is_present)))
            }
            ListChange::Replace { index, item } => {
                let Some(shadow) = self.shadow_for(item) else {
                    return;
                };
                let mut items = self.items.borrow_mut();
                let old = core::mem::replace(&mut items[index], Rc::clone(&shadow));
                old.dispose();
                presence_change(
                    is_present(&old),
                    is_present(&shadow),
                    count_before(&items[..], index, is_present),
                    shadow.item().clone(),
                )
            }
            ListChange::Move { from, to } => {
                let mut items = self.items.borrow_mut();
                let source = count_before(&items[..], from, is_present);
                let shadow = items.remove(from);
                items.insert(to, Rc::clone(&shadow));
                let dest = count_before(&items[..], to, is_present);
                (is_present(&shadow) && source != dest).then(|| ListChange::relocate(source, dest))
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
            log::trace!("dynamic filter emits {:?}", out.kind());
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
        log::warn!("dynamic filter stopped: {}", error);
        self.outlet.fail(error);
        self.release_items();
    }
}

impl<T, F, S, O> ItemSink<T, bool, S::Subscription, ()> for WhereDynamicInner<T, F, S, O>
where
    T: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<bool> + 'static,
    S::Subscription: 'static,
    O: Observer<ListChange<T>> + 'static,
{
    fn item_next(&self, shadow: &Rc<FilterShadow<T, S::Subscription>>, present: bool) {
        if self.outlet.is_stopped() {
            return;
        }
        let out = {
            let items = self.items.borrow();
            let Some(pos) = position_of(&items[..], shadow) else {
                return;
            };
            let was = shadow.set_value(present).unwrap_or(false);
            let index = count_before(&items[..], pos, is_present);
            match (was, present) {
                (false, true) => Some(ListChange::insert(index, shadow.item().clone())),
                (true, false) => Some(ListChange::remove(index)),
                _ => None,
            }
        };
        if let Some(out) = out {
            log::trace!("dynamic filter item flips: {:?}", out.kind());
            self.outlet.emit([out]);
        }
    }

    fn item_error(&self, error: Error) {
        self.fail(error);
    }
}

impl<T, F, S, O> Drop for WhereDynamicInner<T, F, S, O>
where
    S: Observable<bool>,
{
    fn drop(&mut self) {
        for shadow in self.items.get_mut().drain(..) {
            shadow.dispose();
        }
        self.upstream.release();
    }
}

impl<T, F, S, O> Observer<ListChange<T>> for WhereDynamic<T, F, S, O>
where
    T: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<bool> + 'static,
    S::Subscription: 'static,
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
    }
}

impl<T, F, S, O> Disposable for WhereDynamic<T, F, S, O>
where
    T: Clone + 'static,
    F: Fn(&T) -> Result<S> + 'static,
    S: Observable<bool> + 'static,
    S::Subscription: 'static,
    O: Observer<ListChange<T>> + 'static,
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

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::vec;
    use ripple_reactive::{BehaviorSubject, ListView, ObservableList, Subject};

    fn longer_than_one(s: &&str) -> Result<bool> {
        Ok(s.len() > 1)
    }

    #[test]
    fn test_where_length_example() {
        let view = ListView::new();
        let mut filter = Where::new(longer_than_one, view.clone());

        filter.on_next(ListChange::insert(0, "a"));
        filter.on_next(ListChange::insert(1, "bb"));
        filter.on_next(ListChange::insert(2, "c"));
        assert_eq!(view.take_changes(), vec![ListChange::insert(0, "bb")]);

        filter.on_next(ListChange::remove(0));
        assert!(view.take_changes().is_empty());

        filter.on_next(ListChange::remove(0));
        assert_eq!(view.take_changes(), vec![ListChange::remove(0)]);
        assert!(view.is_empty());
    }

    #[test]
    fn test_where_replace_transitions() {
        let view = ListView::new();
        let mut filter = Where::new(longer_than_one, view.clone());
        filter.on_next(ListChange::insert(0, "aa"));
        filter.on_next(ListChange::insert(1, "b"));
        view.take_changes();

        filter.on_next(ListChange::replace(1, "bb"));
        filter.on_next(ListChange::replace(0, "a"));
        filter.on_next(ListChange::replace(1, "cc"));
        filter.on_next(ListChange::replace(0, "d"));

        assert_eq!(
            view.take_changes(),
            vec![
                ListChange::insert(1, "bb"),
                ListChange::remove(0),
                ListChange::replace(0, "cc"),
            ]
        );
        assert_eq!(view.items(), vec!["cc"]);
    }

    #[test]
    fn test_where_move_translation() {
        let view = ListView::new();
        let mut filter = Where::new(longer_than_one, view.clone());
        for (i, s) in ["aa", "b", "cc", "dd"].into_iter().enumerate() {
            filter.on_next(ListChange::insert(i, s));
        }
        view.take_changes();

        // aa b cc dd -> b cc dd aa
        filter.on_next(ListChange::relocate(0, 3));
        assert_eq!(view.take_changes(), vec![ListChange::relocate(0, 2)]);
        assert_eq!(view.items(), vec!["cc", "dd", "aa"]);

        // Moving an absent item emits nothing.
        filter.on_next(ListChange::relocate(0, 2));
        assert!(view.take_changes().is_empty());

        // cc dd b aa: moving dd past b keeps its filtered index.
        filter.on_next(ListChange::relocate(1, 2));
        assert!(view.take_changes().is_empty());
        assert_eq!(view.items(), vec!["cc", "dd", "aa"]);
    }

    #[test]
    fn test_where_predicate_error_terminates() {
        let view = ListView::new();
        let mut filter = Where::new(
            |s: &String| {
                if s.is_empty() {
                    Err(Error::selector("empty"))
                } else {
                    Ok(true)
                }
            },
            view.clone(),
        );
        filter.on_next(ListChange::insert(0, String::from("x")));
        filter.on_next(ListChange::insert(1, String::new()));
        filter.on_next(ListChange::insert(1, String::from("y")));

        assert_eq!(view.items(), vec![String::from("x")]);
        assert_eq!(view.error(), Some(Error::selector("empty")));
    }

    #[test]
    fn test_where_remove_all() {
        let view = ListView::new();
        let mut filter = Where::new(|_: &i32| Ok(true), view.clone());
        filter.on_next(ListChange::insert(0, 1));
        filter.on_next(ListChange::RemoveAll);
        filter.on_next(ListChange::insert(0, 2));
        filter.on_completed();

        assert_eq!(view.items(), vec![2]);
        assert!(view.is_completed());
        assert_eq!(filter.source_len(), 1);
    }

    #[test]
    fn test_where_dynamic_flips() {
        let flags = [BehaviorSubject::new(true), BehaviorSubject::new(false)];
        let lookup = flags.clone();
        let view = ListView::new();
        let mut filter = WhereDynamic::new(move |i: &usize| Ok(lookup[*i].clone()), view.clone());

        filter.on_next(ListChange::insert(0, 0));
        filter.on_next(ListChange::insert(1, 1));
        assert_eq!(view.items(), vec![0]);

        flags[1].next(true);
        assert_eq!(view.items(), vec![0, 1]);

        flags[0].next(false);
        assert_eq!(view.items(), vec![1]);
        assert_eq!(
            view.changes(),
            vec![
                ListChange::insert(0, 0),
                ListChange::insert(1, 1),
                ListChange::remove(0),
            ]
        );

        // Same presence again: nothing.
        flags[0].next(false);
        assert_eq!(view.changes().len(), 3);
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_where_dynamic_late_first_value() {
        let pending = Subject::new();
        let source = pending.clone();
        let view = ListView::new();
        let mut filter = WhereDynamic::new(move |_: &char| Ok(source.clone()), view.clone());

        filter.on_next(ListChange::insert(0, 'a'));
        assert!(view.is_empty());

        pending.next(true);
        assert_eq!(view.items(), vec!['a']);
    }

    #[test]
    fn test_where_dynamic_removed_item_is_ignored() {
        let flag = BehaviorSubject::new(true);
        let source = flag.clone();
        let view = ListView::new();
        let mut filter = WhereDynamic::new(move |_: &u8| Ok(source.clone()), view.clone());

        filter.on_next(ListChange::insert(0, 1));
        filter.on_next(ListChange::remove(0));
        assert_eq!(flag.observer_count(), 0);

        flag.next(false);
        flag.next(true);
        assert_eq!(
            view.changes(),
            vec![ListChange::insert(0, 1), ListChange::remove(0)]
        );
    }

    #[test]
    fn test_where_dynamic_predicate_stream_error() {
        let flag = BehaviorSubject::new(true);
        let source = flag.clone();
        let view = ListView::new();
        let mut filter = WhereDynamic::new(move |_: &u8| Ok(source.clone()), view.clone());

        filter.on_next(ListChange::insert(0, 1));
        flag.error(Error::source("gone"));
        filter.on_next(ListChange::insert(1, 2));

        assert_eq!(view.items(), vec![1]);
        assert_eq!(view.error(), Some(Error::source("gone")));
    }

    #[test]
    fn test_where_dynamic_dispose_releases_items() {
        let flag = BehaviorSubject::new(true);
        let source = flag.clone();
        let view = ListView::new();
        let mut filter = WhereDynamic::new(move |_: &u8| Ok(source.clone()), view.clone());

        filter.on_next(ListChange::insert(0, 1));
        filter.on_next(ListChange::insert(0, 2));
        assert_eq!(flag.observer_count(), 2);

        filter.dispose();
        assert!(filter.is_disposed());
        assert_eq!(flag.observer_count(), 0);

        filter.on_next(ListChange::insert(0, 3));
        assert_eq!(view.items(), vec![2, 1]);
    }

    #[test]
    fn test_where_dynamic_dispose_detaches_source() {
        let flag = BehaviorSubject::new(true);
        let stream = flag.clone();
        let source = ObservableList::from_vec(vec![1, 2]);
        let view = ListView::new();
        let mut filter = WhereDynamic::new(move |_: &u8| Ok(stream.clone()), view.clone());

        filter.subscribe_to(&source);
        assert_eq!(source.observer_count(), 1);
        assert_eq!(view.items(), vec![1, 2]);

        filter.dispose();
        assert_eq!(source.observer_count(), 0);
        assert_eq!(flag.observer_count(), 0);

        source.push(3);
        assert_eq!(view.items(), vec![1, 2]);
    }
}
