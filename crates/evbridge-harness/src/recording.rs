#![forbid(unsafe_code)]

//! A consumer that remembers everything it was given.

use std::cell::{Cell, RefCell};
use std::ops::ControlFlow;
use std::rc::Rc;

use evbridge_core::{BridgeError, Completion, Consumer};

/// One delivery, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded<T> {
    Value(T),
    Completion(Completion),
}

/// Records values and completions. Optionally answers `Break` once it has
/// seen a given number of values.
#[derive(Debug)]
pub struct RecordingConsumer<T> {
    events: RefCell<Vec<Recorded<T>>>,
    values_seen: Cell<usize>,
    break_after: Option<usize>,
}

impl<T> Default for RecordingConsumer<T> {
    fn default() -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            values_seen: Cell::new(0),
            break_after: None,
        }
    }
}

impl<T> RecordingConsumer<T> {
    /// A shared recorder, ready to pass to `subscribe`.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// A recorder that answers `Break` on its `n`th value.
    #[must_use]
    pub fn breaking_after(n: usize) -> Rc<Self> {
        Rc::new(Self {
            break_after: Some(n),
            ..Self::default()
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values_seen.get()
    }

    #[must_use]
    pub fn completions(&self) -> Vec<Completion> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Recorded::Completion(c) => Some(c.clone()),
                Recorded::Value(_) => None,
            })
            .collect()
    }

    /// The single failure delivered, if any.
    #[must_use]
    pub fn failure(&self) -> Option<BridgeError> {
        self.completions()
            .into_iter()
            .find_map(|c| c.error().cloned())
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.events
            .borrow()
            .iter()
            .any(|e| matches!(e, Recorded::Completion(_)))
    }

    /// Run `f` over the recorded events without cloning them.
    pub fn with_events<R>(&self, f: impl FnOnce(&[Recorded<T>]) -> R) -> R {
        f(&self.events.borrow())
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
        self.values_seen.set(0);
    }
}

impl<T: Clone> RecordingConsumer<T> {
    #[must_use]
    pub fn events(&self) -> Vec<Recorded<T>> {
        self.events.borrow().clone()
    }

    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Recorded::Value(v) => Some(v.clone()),
                Recorded::Completion(_) => None,
            })
            .collect()
    }
}

impl<T> Consumer<T> for RecordingConsumer<T> {
    fn receive_value(&self, value: T) -> ControlFlow<()> {
        self.events.borrow_mut().push(Recorded::Value(value));
        let seen = self.values_seen.get() + 1;
        self.values_seen.set(seen);
        match self.break_after {
            Some(n) if seen >= n => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    }

    fn receive_completion(&self, completion: Completion) {
        self.events.borrow_mut().push(Recorded::Completion(completion));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let rec = RecordingConsumer::<u8>::new();
        let _ = rec.receive_value(1);
        let _ = rec.receive_value(2);
        rec.receive_completion(Completion::Finished);

        assert_eq!(
            rec.events(),
            vec![
                Recorded::Value(1),
                Recorded::Value(2),
                Recorded::Completion(Completion::Finished)
            ]
        );
        assert_eq!(rec.values(), vec![1, 2]);
        assert!(rec.is_complete());
        assert!(rec.failure().is_none());
    }

    #[test]
    fn breaks_after_n() {
        let rec = RecordingConsumer::<u8>::breaking_after(2);
        assert!(rec.receive_value(1).is_continue());
        assert!(rec.receive_value(2).is_break());
    }

    #[test]
    fn clear_resets() {
        let rec = RecordingConsumer::<u8>::new();
        let _ = rec.receive_value(1);
        rec.clear();
        assert!(rec.is_empty());
        assert_eq!(rec.value_count(), 0);
    }
}
