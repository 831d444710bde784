//! Property-based tests for ripple-incremental using proptest.
//!
//! Every test drives an `ObservableList` through a random walk and compares
//! the materialized output of a stage with a naive recomputation over the
//! source after every step.

use proptest::prelude::*;
use ripple_core::{ListChange, Observable, Result};
use ripple_incremental::{
    Group, GroupBy, GroupByDynamic, OrderBy, OrderByDynamic, Select, SelectDynamic, Where,
    WhereDynamic,
};
use ripple_index::KeyComparator;
use ripple_reactive::{BehaviorSubject, ListView, ObservableList, Subject};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Remove(usize),
    Replace(usize, i32),
    Move(usize, usize),
    Clear,
    /// New key for the item at a position (dynamic stages only)
    Rekey(usize, i32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (any::<usize>(), -8i32..8).prop_map(|(p, v)| Op::Insert(p, v)),
        2 => any::<usize>().prop_map(Op::Remove),
        2 => (any::<usize>(), -8i32..8).prop_map(|(p, v)| Op::Replace(p, v)),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Move(a, b)),
        1 => Just(Op::Clear),
        4 => (any::<usize>(), -8i32..8).prop_map(|(p, v)| Op::Rekey(p, v)),
    ]
}

/// Applies a structural op to `source`; `make` produces the item for a value.
fn apply<T: Clone + 'static>(source: &ObservableList<T>, op: &Op, mut make: impl FnMut(i32) -> T) {
    let len = source.len();
    match *op {
        Op::Insert(p, v) => source.insert(p % (len + 1), make(v)),
        Op::Remove(p) if len > 0 => source.remove(p % len),
        Op::Replace(p, v) if len > 0 => source.replace(p % len, make(v)),
        Op::Move(a, b) if len > 0 => source.move_item(a % len, b % len),
        Op::Clear if len > 0 => source.clear(),
        _ => {}
    }
}

/// Per-item value streams for the dynamic stages, addressed by item id.
struct Streams<V> {
    streams: Rc<RefCell<Vec<BehaviorSubject<V>>>>,
}

impl<V> Clone for Streams<V> {
    fn clone(&self) -> Self {
        Self {
            streams: Rc::clone(&self.streams),
        }
    }
}

impl<V: Clone + 'static> Streams<V> {
    fn new() -> Self {
        Self {
            streams: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn add(&self, value: V) -> usize {
        let mut streams = self.streams.borrow_mut();
        streams.push(BehaviorSubject::new(value));
        streams.len() - 1
    }

    fn get(&self, id: usize) -> V {
        self.streams.borrow()[id].value()
    }

    fn stream(&self, id: usize) -> BehaviorSubject<V> {
        self.streams.borrow()[id].clone()
    }

    fn set(&self, id: usize, value: V) {
        let stream = self.stream(id);
        stream.next(value);
    }
}

/// Per-item streams with no value until the walk first sets one.
struct LateStreams<V> {
    streams: Rc<RefCell<Vec<(Subject<V>, Option<V>)>>>,
}

impl<V> Clone for LateStreams<V> {
    fn clone(&self) -> Self {
        Self {
            streams: Rc::clone(&self.streams),
        }
    }
}

impl<V: Clone + 'static> LateStreams<V> {
    fn new() -> Self {
        Self {
            streams: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn add(&self) -> usize {
        let mut streams = self.streams.borrow_mut();
        streams.push((Subject::new(), None));
        streams.len() - 1
    }

    fn get(&self, id: usize) -> Option<V> {
        self.streams.borrow()[id].1.clone()
    }

    fn stream(&self, id: usize) -> Subject<V> {
        self.streams.borrow()[id].0.clone()
    }

    fn set(&self, id: usize, value: V) {
        self.streams.borrow_mut()[id].1 = Some(value.clone());
        let stream = self.stream(id);
        stream.next(value);
    }
}

fn sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
    items.sort();
    items
}

/// Key -> sorted members, from the visible groups.
fn group_map<K: Ord + Clone, T: Clone + Ord + 'static>(groups: &[Group<K, T>]) -> BTreeMap<K, Vec<T>> {
    groups
        .iter()
        .map(|g| (g.key().clone(), sorted(g.items())))
        .collect()
}

/// Key -> sorted members, recomputed from the source.
fn expected_groups<T: Clone + Ord>(items: &[T], key: impl Fn(&T) -> i32) -> BTreeMap<i32, Vec<T>> {
    let mut map: BTreeMap<i32, Vec<T>> = BTreeMap::new();
    for item in items {
        map.entry(key(item)).or_default().push(item.clone());
    }
    map.into_iter().map(|(k, v)| (k, sorted(v))).collect()
}

proptest! {
    #[test]
    fn where_matches_refilter(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let source = ObservableList::new();
        let view = ListView::new();
        let _subscription = source.subscribe(Where::new(|v: &i32| -> Result<bool> { Ok(v % 2 == 0) }, view.clone()));

        for op in &ops {
            apply(&source, op, |v| v);
            let expected: Vec<i32> = source.items().into_iter().filter(|v| v % 2 == 0).collect();
            prop_assert_eq!(view.items(), expected);
        }
    }

    #[test]
    fn select_matches_remap(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let source = ObservableList::new();
        let view = ListView::new();
        let _subscription = source.subscribe(Select::new(|v: &i32| Ok(v * 10), view.clone()));

        for op in &ops {
            apply(&source, op, |v| v);
            let expected: Vec<i32> = source.items().into_iter().map(|v| v * 10).collect();
            prop_assert_eq!(view.items(), expected);
        }
    }

    #[test]
    fn order_by_matches_resort(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let source = ObservableList::new();
        let view = ListView::new();
        let _subscription = source.subscribe(OrderBy::new(|v: &(i32, u8)| Ok(v.0), KeyComparator::asc(), view.clone()));

        let mut tag = 0u8;
        for op in &ops {
            apply(&source, op, |v| {
                tag = tag.wrapping_add(1);
                (v, tag)
            });
            let out = view.items();
            prop_assert!(out.windows(2).all(|w| w[0].0 <= w[1].0));
            prop_assert_eq!(sorted(out), sorted(source.items()));
        }
    }

    #[test]
    fn group_by_matches_regroup(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let source = ObservableList::new();
        let view = ListView::new();
        let _subscription = source.subscribe(GroupBy::new(|v: &i32| Ok(v.rem_euclid(3)), view.clone()));

        for op in &ops {
            apply(&source, op, |v| v);
            let groups = view.items();
            prop_assert!(groups.iter().all(|g| !g.is_empty() && !g.is_closed()));
            prop_assert_eq!(group_map(&groups), expected_groups(&source.items(), |v| v.rem_euclid(3)));
        }
    }

    #[test]
    fn where_dynamic_matches_refilter(ops in prop::collection::vec(op_strategy(), 1..150)) {
        let flags: Streams<bool> = Streams::new();
        let lookup = flags.clone();
        let source: ObservableList<usize> = ObservableList::new();
        let view = ListView::new();
        let _subscription = source.subscribe(WhereDynamic::new(
            move |id: &usize| Ok(lookup.stream(*id)),
            view.clone(),
        ));

        for op in &ops {
            match *op {
                Op::Rekey(p, v) if !source.is_empty() => {
                    let id = source.items()[p % source.len()];
                    flags.set(id, v > 0);
                }
                _ => apply(&source, op, |v| flags.add(v > 0)),
            }
            let expected: Vec<usize> = source.items().into_iter().filter(|id| flags.get(*id)).collect();
            prop_assert_eq!(view.items(), expected);
        }
    }

    #[test]
    fn order_by_dynamic_is_sorted_and_minimal(ops in prop::collection::vec(op_strategy(), 1..150)) {
        let keys: Streams<i32> = Streams::new();
        let lookup = keys.clone();
        let source: ObservableList<usize> = ObservableList::new();
        let view = ListView::new();
        let _subscription = source.subscribe(OrderByDynamic::new(
            move |id: &usize| Ok(lookup.stream(*id)),
            KeyComparator::asc(),
            view.clone(),
        ));

        for op in &ops {
            match *op {
                Op::Rekey(p, v) if !source.is_empty() => {
                    let id = source.items()[p % source.len()];
                    let out = view.items();
                    let pos = out.iter().position(|x| *x == id).unwrap();
                    let fits = (pos == 0 || keys.get(out[pos - 1]) <= v)
                        && (pos + 1 == out.len() || v <= keys.get(out[pos + 1]));
                    let before = view.changes().len();
                    keys.set(id, v);
                    if fits {
                        prop_assert_eq!(view.changes().len(), before);
                    }
                }
                _ => apply(&source, op, |v| keys.add(v)),
            }
            let out = view.items();
            prop_assert!(out.windows(2).all(|w| keys.get(w[0]) <= keys.get(w[1])));
            prop_assert_eq!(sorted(out), sorted(source.items()));
        }
    }

    #[test]
    fn group_by_dynamic_matches_regroup(ops in prop::collection::vec(op_strategy(), 1..150)) {
        let keys: Streams<i32> = Streams::new();
        let lookup = keys.clone();
        let source: ObservableList<usize> = ObservableList::new();
        let view = ListView::new();
        let _subscription = source.subscribe(GroupByDynamic::new(
            move |id: &usize| Ok(lookup.stream(*id)),
            view.clone(),
        ));

        for op in &ops {
            match *op {
                Op::Rekey(p, v) if !source.is_empty() => {
                    let id = source.items()[p % source.len()];
                    keys.set(id, v.rem_euclid(4));
                }
                _ => apply(&source, op, |v| keys.add(v.rem_euclid(4))),
            }
            let groups = view.items();
            prop_assert!(groups.iter().all(|g| !g.is_empty()));
            prop_assert_eq!(group_map(&groups), expected_groups(&source.items(), |id| keys.get(*id)));
        }
    }

    #[test]
    fn where_dynamic_with_late_values_matches_refilter(ops in prop::collection::vec(op_strategy(), 1..150)) {
        let flags: LateStreams<bool> = LateStreams::new();
        let lookup = flags.clone();
        let source: ObservableList<usize> = ObservableList::new();
        let view = ListView::new();
        let _subscription = source.subscribe(WhereDynamic::new(
            move |id: &usize| Ok(lookup.stream(*id)),
            view.clone(),
        ));

        for op in &ops {
            match *op {
                Op::Rekey(p, v) if !source.is_empty() => {
                    let id = source.items()[p % source.len()];
                    flags.set(id, v > 0);
                }
                _ => apply(&source, op, |_| flags.add()),
            }
            let expected: Vec<usize> = source
                .items()
                .into_iter()
                .filter(|id| flags.get(*id) == Some(true))
                .collect();
            prop_assert_eq!(view.items(), expected);
        }
    }

    #[test]
    fn select_dynamic_matches_remap(ops in prop::collection::vec(op_strategy(), 1..150)) {
        let results: LateStreams<i32> = LateStreams::new();
        let lookup = results.clone();
        let source: ObservableList<usize> = ObservableList::new();
        let view = ListView::new();
        let _subscription = source.subscribe(SelectDynamic::new(
            move |id: &usize| Ok(lookup.stream(*id)),
            view.clone(),
        ));

        for op in &ops {
            match *op {
                Op::Rekey(p, v) if !source.is_empty() => {
                    let id = source.items()[p % source.len()];
                    results.set(id, v);
                }
                _ => apply(&source, op, |_| results.add()),
            }
            let expected: Vec<i32> = source
                .items()
                .into_iter()
                .filter_map(|id| results.get(id))
                .collect();
            prop_assert_eq!(view.items(), expected);
        }
    }

    #[test]
    fn order_by_dynamic_with_late_keys_is_sorted(ops in prop::collection::vec(op_strategy(), 1..150)) {
        let keys: LateStreams<i32> = LateStreams::new();
        let lookup = keys.clone();
        let source: ObservableList<usize> = ObservableList::new();
        let view = ListView::new();
        let _subscription = source.subscribe(OrderByDynamic::new(
            move |id: &usize| Ok(lookup.stream(*id)),
            KeyComparator::asc(),
            view.clone(),
        ));

        for op in &ops {
            match *op {
                Op::Rekey(p, v) if !source.is_empty() => {
                    let id = source.items()[p % source.len()];
                    keys.set(id, v);
                }
                _ => apply(&source, op, |_| keys.add()),
            }
            let out = view.items();
            prop_assert!(out.windows(2).all(|w| keys.get(w[0]) <= keys.get(w[1])));
            let keyed: Vec<usize> = source
                .items()
                .into_iter()
                .filter(|id| keys.get(*id).is_some())
                .collect();
            prop_assert_eq!(sorted(out), sorted(keyed));
        }
    }

    #[test]
    fn group_by_dynamic_with_late_keys_matches_regroup(ops in prop::collection::vec(op_strategy(), 1..150)) {
        let keys: LateStreams<i32> = LateStreams::new();
        let lookup = keys.clone();
        let source: ObservableList<usize> = ObservableList::new();
        let view = ListView::new();
        let _subscription = source.subscribe(GroupByDynamic::new(
            move |id: &usize| Ok(lookup.stream(*id)),
            view.clone(),
        ));

        for op in &ops {
            match *op {
                Op::Rekey(p, v) if !source.is_empty() => {
                    let id = source.items()[p % source.len()];
                    keys.set(id, v.rem_euclid(4));
                }
                _ => apply(&source, op, |_| keys.add()),
            }
            let keyed: Vec<usize> = source
                .items()
                .into_iter()
                .filter(|id| keys.get(*id).is_some())
                .collect();
            let groups = view.items();
            prop_assert!(groups.iter().all(|g| !g.is_empty()));
            prop_assert_eq!(
                group_map(&groups),
                expected_groups(&keyed, |id| keys.get(*id).unwrap_or_default())
            );
        }
    }
}


#[test]
fn test_order_by_change_log_replays() {
    // The emitted log replayed onto an empty list gives the same result.
    let source = ObservableList::from_vec(vec![5, 3, 9, 1]);
    let view = ListView::new();
    let _subscription = source.subscribe(OrderBy::new(|v: &i32| Ok(*v), KeyComparator::desc(), view.clone()));
    source.replace(0, 0);
    source.move_item(0, 3);
    source.remove(1);

    let mut replay = Vec::new();
    for change in view.changes() {
        change.apply_to(&mut replay);
    }
    assert_eq!(replay, vec![3, 1, 0]);
    assert_eq!(view.items(), replay);
    assert!(view
        .changes()
        .iter()
        .all(|c| !matches!(c, ListChange::RemoveAll)));
}
