#![forbid(unsafe_code)]

//! A hand-driven [`EventSource`] with registration bookkeeping.

use std::cell::Cell;
use std::fmt;

use evbridge_core::{EventCallback, EventSource, ListenerId, ListenerRegistry};

/// Source whose events are raised explicitly by the test.
///
/// Counts every `register` and `unregister` call so tests can check that a
/// subscription registers once and unregisters exactly once.
pub struct ManualSource<E> {
    listeners: ListenerRegistry<E>,
    registers: Cell<u64>,
    unregisters: Cell<u64>,
    /// Unregister calls whose handle was not registered.
    stale_unregisters: Cell<u64>,
}

impl<E> Default for ManualSource<E> {
    fn default() -> Self {
        Self {
            listeners: ListenerRegistry::new(),
            registers: Cell::new(0),
            unregisters: Cell::new(0),
            stale_unregisters: Cell::new(0),
        }
    }
}

impl<E> fmt::Debug for ManualSource<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualSource")
            .field("listeners", &self.listeners.len())
            .field("registers", &self.registers.get())
            .field("unregisters", &self.unregisters.get())
            .finish()
    }
}

impl<E> ManualSource<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn register_calls(&self) -> u64 {
        self.registers.get()
    }

    #[must_use]
    pub fn unregister_calls(&self) -> u64 {
        self.unregisters.get()
    }

    #[must_use]
    pub fn stale_unregister_calls(&self) -> u64 {
        self.stale_unregisters.get()
    }

    /// Callbacks currently registered.
    #[must_use]
    pub fn live_registrations(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: Clone> ManualSource<E> {
    /// Deliver `event` to every registered callback. Returns how many ran.
    pub fn raise(&self, event: E) -> usize {
        self.listeners.emit(event)
    }

    /// Raise each event in order.
    pub fn raise_all(&self, events: impl IntoIterator<Item = E>) {
        for event in events {
            self.raise(event);
        }
    }
}

impl<E> EventSource for ManualSource<E> {
    type Event = E;
    type Handle = ListenerId;

    fn register(&self, on_event: EventCallback<E>) -> ListenerId {
        self.registers.set(self.registers.get() + 1);
        self.listeners.register(on_event)
    }

    fn unregister(&self, handle: ListenerId) {
        self.unregisters.set(self.unregisters.get() + 1);
        if !self.listeners.unregister(handle) {
            self.stale_unregisters.set(self.stale_unregisters.get() + 1);
        }
    }
}
