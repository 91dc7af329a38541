#![forbid(unsafe_code)]

//! One-shot external actions.
//!
//! An [`Operation<T>`] completes at most once, either resolved with a value
//! or rejected with a reason. Its [`publisher`](Operation::publisher) is a
//! one-shot stream: the subscriber sees `value` then `Finished`, or a single
//! `Failed(OperationFailed)`.
//!
//! There is no replay. A subscriber that arrives after completion receives
//! nothing until it cancels. Its callback is dropped at registration, so no
//! dead listener is left behind.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use evbridge_core::logging::{debug, trace};
use evbridge_core::{
    BridgeError, EventCallback, EventSource, EventStreamAdapter, ListenerId, ListenerRegistry,
    Result, StreamConfig,
};

/// Where an [`Operation`] is in its life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState<T> {
    Pending,
    Resolved(T),
    Rejected(BridgeError),
}

impl<T> OperationState<T> {
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

struct OperationInner<T> {
    label: &'static str,
    state: RefCell<OperationState<T>>,
    listeners: ListenerRegistry<Result<T>>,
}

/// A pending external action that completes once.
///
/// Cloning creates another handle to the **same** operation.
pub struct Operation<T> {
    inner: Rc<OperationInner<T>>,
}

impl<T> Clone for Operation<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("label", &self.inner.label)
            .field("state", &*self.inner.state.borrow())
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

impl<T: Clone + 'static> Operation<T> {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            inner: Rc::new(OperationInner {
                label,
                state: RefCell::new(OperationState::Pending),
                listeners: ListenerRegistry::new(),
            }),
        }
    }

    /// Complete successfully. Returns `false` if already complete.
    pub fn resolve(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    /// Complete with a failure. Returns `false` if already complete.
    pub fn reject(&self, reason: impl Into<String>) -> bool {
        self.complete(Err(BridgeError::operation(reason)))
    }

    fn complete(&self, outcome: Result<T>) -> bool {
        {
            let mut state = self.inner.state.borrow_mut();
            if !state.is_pending() {
                trace!(message = "operation.complete.ignored", label = self.inner.label);
                return false;
            }
            *state = match &outcome {
                Ok(value) => OperationState::Resolved(value.clone()),
                Err(error) => OperationState::Rejected(error.clone()),
            };
        }
        debug!(
            message = "operation.complete",
            label = self.inner.label,
            ok = outcome.is_ok()
        );
        self.inner.listeners.emit(outcome);
        true
    }

    #[must_use]
    pub fn state(&self) -> OperationState<T> {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.state.borrow().is_pending()
    }

    /// One-shot stream of this operation's outcome.
    #[must_use]
    pub fn publisher(&self) -> EventStreamAdapter<Self, T> {
        EventStreamAdapter::new(
            Rc::new(self.clone()),
            StreamConfig::one_shot(self.inner.label),
            |outcome: Result<T>| outcome,
        )
    }
}

/// Handle given to subscribers of a completed operation. Never allocated by
/// the registry, so unregistering it is a no-op.
const COMPLETED_HANDLE: ListenerId = 0;

impl<T> EventSource for Operation<T> {
    type Event = Result<T>;
    type Handle = ListenerId;

    fn register(&self, on_event: EventCallback<Result<T>>) -> ListenerId {
        if !self.inner.state.borrow().is_pending() {
            trace!(message = "operation.register.completed", label = self.inner.label);
            return COMPLETED_HANDLE;
        }
        self.inner.listeners.register(on_event)
    }

    fn unregister(&self, handle: ListenerId) {
        self.inner.listeners.unregister(handle);
    }
}
