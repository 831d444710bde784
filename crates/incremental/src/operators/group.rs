//! Groups and the bucket table behind the group-by operators.
//!
//! Buckets live in the slot arena of a `BucketTable`; the downstream index of
//! a bucket is the number of live slots before its slot. Every member of a
//! bucket carries a `Mark` holding its slot and its position within the
//! bucket, so removing a member only shifts the marks after it.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt;
use ripple_core::{Error, ListChange, Observable, Observer};
use ripple_index::{BucketTable, KeyEquality};
use ripple_reactive::{ObservableList, SubjectSubscription};

/// One group of a group-by stage.
///
/// A cheap-to-clone handle. Subscribing replays the current members as
/// inserts, then forwards every change to the group. The stream completes
/// when the group disappears from its stage.
pub struct Group<K, T> {
    key: Rc<K>,
    items: ObservableList<T>,
}

impl<K, T> Clone for Group<K, T> {
    fn clone(&self) -> Self {
        Self {
            key: Rc::clone(&self.key),
            items: self.items.clone(),
        }
    }
}

impl<K, T: Clone + 'static> Group<K, T> {
    fn new(key: K) -> Self {
        Self {
            key: Rc::new(key),
            items: ObservableList::new(),
        }
    }

    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns a copy of the members in group order.
    pub fn items(&self) -> Vec<T> {
        self.items.items()
    }

    /// Returns true once the group left its stage or the stage terminated.
    pub fn is_closed(&self) -> bool {
        self.items.is_stopped()
    }

    /// Returns true if both handles refer to the same group.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.key, &other.key)
    }

    pub(crate) fn apply(&self, change: ListChange<T>) {
        self.items.apply(change);
    }

    pub(crate) fn close(&self) {
        self.items.complete();
    }

    pub(crate) fn fail(&self, error: Error) {
        self.items.error(error);
    }
}

impl<K, T: Clone + 'static> Observable<ListChange<T>> for Group<K, T> {
    type Subscription = SubjectSubscription<ListChange<T>>;

    fn subscribe<O>(&self, observer: O) -> Self::Subscription
    where
        O: Observer<ListChange<T>> + 'static,
    {
        self.items.subscribe(observer)
    }
}

impl<K: fmt::Debug, T: Clone + 'static> fmt::Debug for Group<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("key", &self.key)
            .field("len", &self.len())
            .finish()
    }
}

/// Where a member sits: bucket slot and position within the bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Placement {
    pub(crate) slot: usize,
    pub(crate) pos: usize,
}

/// Shared placement of one source item; `None` while it has no bucket.
pub(crate) type Mark = Rc<Cell<Option<Placement>>>;

pub(crate) fn new_mark() -> Mark {
    Rc::new(Cell::new(None))
}

struct Bucket<K, T> {
    group: Group<K, T>,
    /// Members in group order
    members: Vec<Mark>,
}

/// A change produced by the table, run in order once the caller releases
/// its own state.
pub(crate) enum GroupStep<K, T> {
    Downstream(ListChange<Group<K, T>>),
    Member(Group<K, T>, ListChange<T>),
    Close(Group<K, T>),
}

/// Runs table steps, handing bucket changes to `downstream`.
pub(crate) fn run_steps<K, T, D>(steps: Vec<GroupStep<K, T>>, mut downstream: D)
where
    T: Clone + 'static,
    D: FnMut(ListChange<Group<K, T>>),
{
    for step in steps {
        match step {
            GroupStep::Downstream(change) => downstream(change),
            GroupStep::Member(group, change) => group.apply(change),
            GroupStep::Close(group) => group.close(),
        }
    }
}

pub(crate) struct GroupTable<K, T, E> {
    buckets: BucketTable<K, Bucket<K, T>, E>,
}

impl<K, T, E> GroupTable<K, T, E>
where
    K: Clone,
    T: Clone + 'static,
    E: KeyEquality<K>,
{
    pub(crate) fn new(equality: E) -> Self {
        Self {
            buckets: BucketTable::with_equality(equality),
        }
    }

    /// Returns the number of visible groups.
    pub(crate) fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the visible groups in downstream order.
    pub(crate) fn groups(&self) -> Vec<Group<K, T>> {
        self.buckets.iter().map(|(_, _, b)| b.group.clone()).collect()
    }

    fn bucket_mut(&mut self, slot: usize) -> &mut Bucket<K, T> {
        match self.buckets.get_mut(slot) {
            Some(bucket) => bucket,
            None => panic!("bucket slot {} is not live", slot),
        }
    }

    /// Adds `item` under `key`, creating the bucket first if needed.
    pub(crate) fn assign(&mut self, mark: &Mark, key: K, item: T, steps: &mut Vec<GroupStep<K, T>>) {
        debug_assert!(mark.get().is_none(), "item already has a bucket");
        let slot = match self.buckets.find(&key) {
            Some(slot) => slot,
            None => {
                let group = Group::new(key.clone());
                let slot = self.buckets.insert(
                    key,
                    Bucket {
                        group: group.clone(),
                        members: Vec::new(),
                    },
                );
                let index = self.buckets.visible_index(slot);
                log::debug!("bucket opened in slot {} at index {}", slot, index);
                steps.push(GroupStep::Downstream(ListChange::insert(index, group)));
                slot
            }
        };
        let bucket = self.bucket_mut(slot);
        let pos = bucket.members.len();
        bucket.members.push(Rc::clone(mark));
        mark.set(Some(Placement { slot, pos }));
        steps.push(GroupStep::Member(bucket.group.clone(), ListChange::insert(pos, item)));
    }

    /// Takes the item out of its bucket, closing the bucket when it empties.
    pub(crate) fn unassign(&mut self, mark: &Mark, steps: &mut Vec<GroupStep<K, T>>) {
        let Some(Placement { slot, pos }) = mark.take() else {
            return;
        };
        let bucket = self.bucket_mut(slot);
        bucket.members.remove(pos);
        for later in &bucket.members[pos..] {
            if let Some(mut placement) = later.get() {
                placement.pos -= 1;
                later.set(Some(placement));
            }
        }
        steps.push(GroupStep::Member(bucket.group.clone(), ListChange::remove(pos)));

        if bucket.members.is_empty() {
            let index = self.buckets.visible_index(slot);
            let (_, bucket) = self.buckets.remove(slot);
            log::debug!("bucket closed in slot {} at index {}", slot, index);
            steps.push(GroupStep::Downstream(ListChange::remove(index)));
            steps.push(GroupStep::Close(bucket.group));
        }
    }

    fn same_bucket(&self, mark: &Mark, key: &K) -> Option<Placement> {
        let placement = mark.get()?;
        let current = self.buckets.key(placement.slot)?;
        self.buckets.same_key(current, key).then_some(placement)
    }

    /// Swaps the item behind `old` for `item` under `key`, tracked by `new`.
    ///
    /// Stays in place when the key maps to the same bucket.
    pub(crate) fn replace(&mut self, old: &Mark, new: &Mark, key: K, item: T, steps: &mut Vec<GroupStep<K, T>>) {
        match self.same_bucket(old, &key) {
            Some(placement) => {
                let bucket = self.bucket_mut(placement.slot);
                if !Rc::ptr_eq(old, new) {
                    old.set(None);
                    bucket.members[placement.pos] = Rc::clone(new);
                }
                new.set(Some(placement));
                steps.push(GroupStep::Member(
                    bucket.group.clone(),
                    ListChange::replace(placement.pos, item),
                ));
            }
            None => {
                self.unassign(old, steps);
                self.assign(new, key, item, steps);
            }
        }
    }

    /// Gives the unchanged item behind `mark` a new key.
    pub(crate) fn rekey(&mut self, mark: &Mark, key: K, item: impl FnOnce() -> T, steps: &mut Vec<GroupStep<K, T>>) {
        if self.same_bucket(mark, &key).is_some() {
            return;
        }
        self.unassign(mark, steps);
        self.assign(mark, key, item(), steps);
    }

    /// Removes every bucket.
    pub(crate) fn clear(&mut self, steps: &mut Vec<GroupStep<K, T>>) {
        let buckets = self.buckets.drain();
        for (_, bucket) in &buckets {
            for mark in &bucket.members {
                mark.set(None);
            }
            steps.push(GroupStep::Member(bucket.group.clone(), ListChange::RemoveAll));
        }
        steps.push(GroupStep::Downstream(ListChange::RemoveAll));
        for (_, bucket) in buckets {
            steps.push(GroupStep::Close(bucket.group));
        }
    }

    /// Empties the table without any downstream change, returning the groups.
    pub(crate) fn take_groups(&mut self) -> Vec<Group<K, T>> {
        self.buckets
            .drain()
            .into_iter()
            .map(|(_, bucket)| {
                for mark in &bucket.members {
                    mark.set(None);
                }
                bucket.group
            })
            .collect()
    }
}
