#![forbid(unsafe_code)]

//! Observed properties.
//!
//! # Design
//!
//! [`Observable<T>`] is a shared, version-tracked value. Cloning it creates
//! another handle to the **same** value. Mutations that change the value
//! notify every registered observer with a [`Change`] carrying the old and
//! new values.
//!
//! Observers are kept in a [`ListenerRegistry`], so an observer may set the
//! observable again, register, or unregister from inside its own
//! notification.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Observers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications).
//! 4. No `RefCell` borrow of the value is held while observers run.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use evbridge_core::logging::trace;
use evbridge_core::{
    EventCallback, EventSource, EventStreamAdapter, ListenerId, ListenerRegistry, StreamConfig,
};

/// One observed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change<T> {
    pub old: T,
    pub new: T,
}

struct ObservableInner<T> {
    value: T,
    version: u64,
}

/// A shared value that notifies observers when it changes.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
    observers: Rc<ListenerRegistry<Change<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            observers: Rc::clone(&self.observers),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner { value, version: 0 })),
            observers: Rc::new(ListenerRegistry::new()),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Run `f` against the current value without cloning it.
    ///
    /// `f` must not mutate this observable.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Replace the value. Returns `true` if observers were notified.
    pub fn set(&self, value: T) -> bool {
        let old = {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return false;
            }
            inner.version += 1;
            std::mem::replace(&mut inner.value, value.clone())
        };
        self.notify(Change { old, new: value });
        true
    }

    /// Mutate the value in place. Observers are notified only if the result
    /// differs from the previous value.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut next = self.get();
        f(&mut next);
        self.set(next)
    }

    /// Number of value-changing mutations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn notify(&self, change: Change<T>) {
        let notified = self.observers.emit(change);
        trace!(
            message = "observable.notify",
            version = self.version(),
            observers = notified
        );
        let _ = notified;
    }

    /// Infinite stream of new values, starting with the next change.
    #[must_use]
    pub fn publisher(&self) -> EventStreamAdapter<Self, T> {
        EventStreamAdapter::new(
            Rc::new(self.clone()),
            StreamConfig::infinite("observable"),
            |change: Change<T>| Ok(change.new),
        )
    }

    /// Infinite stream of `(old, new)` pairs.
    #[must_use]
    pub fn changes(&self) -> EventStreamAdapter<Self, Change<T>> {
        EventStreamAdapter::passthrough(
            Rc::new(self.clone()),
            StreamConfig::infinite("observable.changes"),
        )
    }
}

impl<T> EventSource for Observable<T> {
    type Event = Change<T>;
    type Handle = ListenerId;

    fn register(&self, on_event: EventCallback<Change<T>>) -> ListenerId {
        self.observers.register(on_event)
    }

    fn unregister(&self, handle: ListenerId) {
        self.observers.unregister(handle);
    }
}
