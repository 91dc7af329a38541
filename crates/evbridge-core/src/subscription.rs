#![forbid(unsafe_code)]

//! Subscription handles and cancellation.
//!
//! # State machine
//!
//! ```text
//! Unregistered --activate--> Active --cancel / consumer gone / break / one-shot done--> Cancelled
//! ```
//!
//! `Cancelled` is terminal.
//!
//! # Invariants
//!
//! 1. A subscription holds at most one registration.
//! 2. The registration's unregister action runs exactly once, on the first
//!    transition into `Cancelled` (explicit `cancel()`, adapter-initiated
//!    teardown, or dropping the last handle).
//! 3. `cancel()` is idempotent and may be called re-entrantly from inside a
//!    consumer callback of the same subscription.
//! 4. Attachments (operator stages kept alive by the subscription) are
//!    released on cancel, after the unregister action has run.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::logging::{debug, trace};

// ─── Id generation and counters ──────────────────────────────────────────────

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_subscription_id() -> u64 {
    NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Total number of subscriptions that transitioned into `Cancelled`.
static SUBSCRIPTIONS_CANCELLED_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Read the total cancellation count (for diagnostics/telemetry).
#[must_use]
pub fn subscriptions_cancelled_total() -> u64 {
    SUBSCRIPTIONS_CANCELLED_TOTAL.load(Ordering::Relaxed)
}

// ─── Demand ──────────────────────────────────────────────────────────────────

/// Number of further values a consumer asks for.
///
/// Accepted by [`Subscription::request_more`] for interface conformance only.
/// The sources bridged here are push-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Demand {
    None,
    Max(usize),
    Unlimited,
}

impl Demand {
    #[must_use]
    pub const fn max(n: usize) -> Self {
        Self::Max(n)
    }

    #[must_use]
    pub const fn is_unlimited(self) -> bool {
        matches!(self, Self::Unlimited)
    }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// Lifecycle state of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    Unregistered,
    Active,
    Cancelled,
}

type Unregister = Box<dyn FnOnce()>;

struct SubscriptionInner {
    id: u64,
    label: &'static str,
    state: Cell<SubscriptionState>,
    registration: RefCell<Option<Unregister>>,
    attachments: RefCell<Vec<Box<dyn Any>>>,
}

impl SubscriptionInner {
    /// Transition into `Cancelled`, run the unregister action, and hand back
    /// the attachments. Returns `None` if already cancelled.
    fn release(&self, reason: &'static str) -> Option<Retained> {
        if self.state.replace(SubscriptionState::Cancelled) == SubscriptionState::Cancelled {
            return None;
        }
        SUBSCRIPTIONS_CANCELLED_TOTAL.fetch_add(1, Ordering::Relaxed);
        debug!(
            message = "stream.cancel",
            subscription_id = self.id,
            label = self.label,
            reason
        );
        let _ = reason;

        // Take everything out before running foreign code so re-entrant calls
        // never observe a live borrow.
        let registration = self.registration.borrow_mut().take();
        if let Some(unregister) = registration {
            unregister();
        }
        Some(Retained {
            _attachments: std::mem::take(&mut *self.attachments.borrow_mut()),
        })
    }
}

impl Drop for SubscriptionInner {
    fn drop(&mut self) {
        drop(self.release("dropped"));
    }
}

/// Attachments taken out of a cancelled subscription.
///
/// The adapter holds this across a terminal delivery so operator stages
/// survive until the final value and completion have passed through them.
#[must_use]
pub(crate) struct Retained {
    _attachments: Vec<Box<dyn Any>>,
}

/// Handle to one live binding between a stream and a consumer.
///
/// Cloning creates another handle to the **same** subscription. Dropping the
/// last handle cancels it, so keep the handle (or a [`CancelBag`]) for as long
/// as values should flow.
#[must_use = "dropping a Subscription cancels it"]
#[derive(Clone)]
pub struct Subscription {
    inner: Rc<SubscriptionInner>,
}

impl Subscription {
    /// A new subscription in the `Unregistered` state.
    pub fn new(label: &'static str) -> Self {
        Self {
            inner: Rc::new(SubscriptionInner {
                id: next_subscription_id(),
                label,
                state: Cell::new(SubscriptionState::Unregistered),
                registration: RefCell::new(None),
                attachments: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Store the registration's unregister action and move to `Active`.
    ///
    /// If the subscription is no longer `Unregistered` the action runs
    /// immediately instead, so a registration is never leaked and never
    /// doubled.
    pub fn activate(&self, unregister: impl FnOnce() + 'static) {
        if self.inner.state.get() != SubscriptionState::Unregistered {
            trace!(
                message = "stream.activate.late",
                subscription_id = self.inner.id,
                label = self.inner.label
            );
            unregister();
            return;
        }
        *self.inner.registration.borrow_mut() = Some(Box::new(unregister));
        self.inner.state.set(SubscriptionState::Active);
    }

    /// Keep `value` alive until this subscription is cancelled.
    ///
    /// Used by operator stages, which are otherwise only weakly referenced by
    /// the stage upstream of them. Dropped immediately if already cancelled.
    pub fn attach(&self, value: impl Any) {
        if self.is_cancelled() {
            return;
        }
        self.inner.attachments.borrow_mut().push(Box::new(value));
    }

    /// Cancel the subscription, unregistering from the source.
    ///
    /// Only the first call has an effect.
    pub fn cancel(&self) {
        drop(self.inner.release("cancel"));
    }

    /// Adapter-side teardown with a reason for the log. Attachments are
    /// released when the returned value is dropped.
    pub(crate) fn terminate(&self, reason: &'static str) -> Option<Retained> {
        self.inner.release(reason)
    }

    /// Ask for more values. Push-only sources ignore this.
    pub fn request_more(&self, demand: Demand) {
        trace!(
            message = "stream.request_more",
            subscription_id = self.inner.id,
            demand = ?demand
        );
        let _ = demand;
    }

    /// Process-unique identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        self.inner.label
    }

    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        self.inner.state.get()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state() == SubscriptionState::Cancelled
    }

    /// Move this handle into `bag`.
    pub fn store_in(self, bag: &mut CancelBag) {
        bag.insert(self);
    }

    pub(crate) fn downgrade(&self) -> WeakSubscription {
        WeakSubscription {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("state", &self.inner.state.get())
            .field("attachments", &self.inner.attachments.borrow().len())
            .finish()
    }
}

/// Non-owning reference to a subscription, held by the source callback.
pub(crate) struct WeakSubscription {
    inner: Weak<SubscriptionInner>,
}

impl WeakSubscription {
    pub(crate) fn upgrade(&self) -> Option<Subscription> {
        self.inner.upgrade().map(|inner| Subscription { inner })
    }
}

// ─── CancelBag ───────────────────────────────────────────────────────────────

/// Owns a set of subscriptions and cancels all of them when dropped.
#[derive(Debug, Default)]
pub struct CancelBag {
    subscriptions: Vec<Subscription>,
}

impl CancelBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Number of stored subscriptions still active.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.subscriptions.iter().filter(|s| s.is_active()).count()
    }

    /// Cancel and forget every stored subscription.
    pub fn cancel_all(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
    }
}

impl Extend<Subscription> for CancelBag {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        self.subscriptions.extend(iter);
    }
}

impl Drop for CancelBag {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
