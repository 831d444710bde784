//! Materializing observers.
//!
//! `ListView` replays a change stream into a vector and keeps the log of
//! changes it received. `Recorder` keeps every value of a plain stream. Both
//! are cheap-to-clone handles, so one clone can be handed to `subscribe`
//! while another is inspected.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::mem;
use ripple_core::{Error, ListChange, Observer};

struct ViewState<T> {
    items: Vec<T>,
    changes: Vec<ListChange<T>>,
    completed: bool,
    error: Option<Error>,
}

/// A list materialized from a change stream.
pub struct ListView<T> {
    state: Rc<RefCell<ViewState<T>>>,
}

impl<T> Clone for ListView<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: Clone> Default for ListView<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ListView<T> {
    /// Creates an empty view.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ViewState {
                items: Vec::new(),
                changes: Vec::new(),
                completed: false,
                error: None,
            })),
        }
    }

    /// Returns a copy of the materialized items.
    pub fn items(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    /// Returns the number of materialized items.
    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    /// Returns true if the view holds no items.
    pub fn is_empty(&self) -> bool {
        self.state.borrow().items.is_empty()
    }

    /// Returns a copy of every change received so far.
    pub fn changes(&self) -> Vec<ListChange<T>> {
        self.state.borrow().changes.clone()
    }

    /// Returns and forgets the changes received so far.
    pub fn take_changes(&self) -> Vec<ListChange<T>> {
        mem::take(&mut self.state.borrow_mut().changes)
    }

    /// Returns true once the stream completed.
    pub fn is_completed(&self) -> bool {
        self.state.borrow().completed
    }

    /// Returns the error the stream failed with, if any.
    pub fn error(&self) -> Option<Error> {
        self.state.borrow().error.clone()
    }
}

impl<T: Clone> Observer<ListChange<T>> for ListView<T> {
    fn on_next(&mut self, change: ListChange<T>) {
        let mut state = self.state.borrow_mut();
        state.changes.push(change.clone());
        change.apply_to(&mut state.items);
    }

    fn on_error(&mut self, error: Error) {
        self.state.borrow_mut().error = Some(error);
    }

    fn on_completed(&mut self) {
        self.state.borrow_mut().completed = true;
    }
}

struct RecorderState<T> {
    values: Vec<T>,
    completed: bool,
    error: Option<Error>,
}

/// An observer that records everything it receives.
pub struct Recorder<T> {
    state: Rc<RefCell<RecorderState<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: Clone> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Recorder<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(RecorderState {
                values: Vec::new(),
                completed: false,
                error: None,
            })),
        }
    }

    /// Returns a copy of the recorded values.
    pub fn values(&self) -> Vec<T> {
        self.state.borrow().values.clone()
    }

    /// Returns and forgets the recorded values.
    pub fn take(&self) -> Vec<T> {
        mem::take(&mut self.state.borrow_mut().values)
    }

    pub fn is_completed(&self) -> bool {
        self.state.borrow().completed
    }

    pub fn error(&self) -> Option<Error> {
        self.state.borrow().error.clone()
    }
}

impl<T> Observer<T> for Recorder<T> {
    fn on_next(&mut self, value: T) {
        self.state.borrow_mut().values.push(value);
    }

    fn on_error(&mut self, error: Error) {
        self.state.borrow_mut().error = Some(error);
    }

    fn on_completed(&mut self) {
        self.state.borrow_mut().completed = true;
    }
}
