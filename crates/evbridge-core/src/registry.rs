#![forbid(unsafe_code)]

//! Listener bookkeeping shared by the concrete event sources.
//!
//! Snapshot-on-emit semantics:
//!   - A listener removed *during* an emission round is still called in that
//!     round. The adapter's own state check is what stops a cancelled
//!     subscription from delivering.
//!   - A listener added *during* an emission round is not called until the
//!     next round.
//!
//! The `RefCell` borrow is never held while a callback runs, so callbacks may
//! register or unregister freely. Each callback is kept alive by the snapshot
//! for the duration of its own call even if it unregisters itself.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::source::EventCallback;

/// Identifier returned by [`ListenerRegistry::register`].
pub type ListenerId = u64;

/// Ordered set of callbacks for one kind of event.
pub struct ListenerRegistry<E> {
    listeners: RefCell<Vec<(ListenerId, EventCallback<E>)>>,
    next_id: Cell<ListenerId>,
}

impl<E> ListenerRegistry<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Add `callback` and return its id. Listeners run in registration order.
    pub fn register(&self, callback: EventCallback<E>) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, callback));
        id
    }

    /// Remove the listener `id`. Returns `false` if it was not present.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }
}

impl<E: Clone> ListenerRegistry<E> {
    /// Call every listener registered at the start of the round with a clone
    /// of `event`. Returns the number of listeners called.
    pub fn emit(&self, event: E) -> usize {
        let snapshot: Vec<EventCallback<E>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for cb in &snapshot {
            cb(event.clone());
        }
        snapshot.len()
    }
}

impl<E> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ListenerRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .field("next_id", &self.next_id.get())
            .finish()
    }
}
