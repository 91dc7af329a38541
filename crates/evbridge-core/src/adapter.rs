#![forbid(unsafe_code)]

//! The callback-to-stream adapter.
//!
//! # Design
//!
//! [`EventStreamAdapter`] wraps one [`EventSource`] and a coercion function
//! from the source's raw event to the stream's value type. Each call to
//! [`subscribe`](Publisher::subscribe) registers one callback with the source
//! and returns a [`Subscription`] that owns that registration.
//!
//! Ownership, per subscription:
//!
//! ```text
//! Subscription ──owns──> unregister action ──owns──> Rc<source>, handle
//! source ──owns──> callback ──weak──> Subscription
//!                           ──weak──> consumer
//! ```
//!
//! Nothing upstream owns the consumer, and nothing the source owns keeps the
//! subscription alive, so there is no cycle to leak.
//!
//! # Delivery
//!
//! Each raw event is handled synchronously on the caller's stack:
//!
//! 1. Not `Active` (not yet activated, or already cancelled): dropped.
//! 2. Consumer gone: dropped, and the subscription cancels itself.
//! 3. Coercion fails: an `Infinite` stream with [`CoercionPolicy::Drop`]
//!    drops the event and keeps going; otherwise the subscription cancels
//!    and the consumer receives `Completion::Failed`.
//! 4. Coercion succeeds: an `Infinite` stream delivers the value and cancels
//!    if the consumer answered `Break`; a `OneShot` stream cancels, then
//!    delivers the value followed by `Completion::Finished`.
//!
//! A one-shot subscription is cancelled *before* its terminal delivery, so a
//! second event raised re-entrantly from inside the consumer is dropped by
//! step 1.
//!
//! # Failure Modes
//!
//! - **Consumer panics**: the panic unwinds through the source's callback.
//!   The adapter itself never panics on adapter-local failures.
//! - **Source ignores `unregister`**: late events still reach the callback
//!   and are dropped by step 1 (counted in `AdapterStats::dropped_after_cancel`).

use std::cell::Cell;
use std::fmt;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use crate::consumer::{Completion, Consumer};
use crate::error::{BridgeError, Result};
use crate::logging::{debug, trace, warn};
use crate::source::{EventCallback, EventSource};
use crate::subscription::{Subscription, WeakSubscription};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Whether a stream ends after its first emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Termination {
    /// Values keep flowing until cancelled.
    #[default]
    Infinite,
    /// Exactly one terminal outcome, then done.
    OneShot,
}

/// What an infinite stream does with an event that fails coercion.
///
/// One-shot streams always treat a coercion failure as their terminal
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoercionPolicy {
    /// Drop the event silently.
    #[default]
    Drop,
    /// End the stream with `Completion::Failed`.
    Fail,
}

/// Per-adapter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub label: &'static str,
    pub termination: Termination,
    pub coercion: CoercionPolicy,
}

impl StreamConfig {
    /// Infinite stream, drop-on-coercion-failure.
    #[must_use]
    pub const fn infinite(label: &'static str) -> Self {
        Self {
            label,
            termination: Termination::Infinite,
            coercion: CoercionPolicy::Drop,
        }
    }

    /// One-shot stream.
    #[must_use]
    pub const fn one_shot(label: &'static str) -> Self {
        Self {
            label,
            termination: Termination::OneShot,
            coercion: CoercionPolicy::Fail,
        }
    }

    #[must_use]
    pub const fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    #[must_use]
    pub const fn with_coercion(mut self, coercion: CoercionPolicy) -> Self {
        self.coercion = coercion;
        self
    }

    #[must_use]
    pub const fn is_one_shot(&self) -> bool {
        matches!(self.termination, Termination::OneShot)
    }

    /// Whether a failed coercion drops the event rather than ending the
    /// stream.
    #[must_use]
    const fn drops_failures(&self) -> bool {
        matches!(self.termination, Termination::Infinite)
            && matches!(self.coercion, CoercionPolicy::Drop)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::infinite("stream")
    }
}

// ─── Stats ───────────────────────────────────────────────────────────────────

/// Counters shared by every subscription of one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdapterStats {
    /// Calls made to `EventSource::register`.
    pub registrations: u64,
    /// Calls made to `EventSource::unregister`.
    pub unregistrations: u64,
    /// Values handed to consumers.
    pub delivered: u64,
    /// Terminal completions handed to consumers.
    pub completions: u64,
    /// Events dropped because coercion failed on an infinite stream.
    pub dropped_failures: u64,
    /// Events dropped because the consumer no longer existed.
    pub dropped_consumer_gone: u64,
    /// Events that arrived while the subscription was not active.
    pub dropped_after_cancel: u64,
}

impl AdapterStats {
    /// Registrations not yet matched by an unregistration.
    #[must_use]
    pub const fn live_registrations(&self) -> u64 {
        self.registrations.saturating_sub(self.unregistrations)
    }
}

type StatsCell = Rc<Cell<AdapterStats>>;

fn bump(stats: &Cell<AdapterStats>, f: impl FnOnce(&mut AdapterStats)) {
    let mut s = stats.get();
    f(&mut s);
    stats.set(s);
}

// ─── Publisher ───────────────────────────────────────────────────────────────

/// Something a consumer can subscribe to.
pub trait Publisher {
    type Output: 'static;

    /// Subscribe a weakly held consumer.
    fn subscribe_weak(&self, consumer: Weak<dyn Consumer<Self::Output>>) -> Subscription;

    /// Subscribe `consumer`. The stream only keeps a weak reference; the
    /// caller decides how long the consumer lives.
    fn subscribe<C>(&self, consumer: &Rc<C>) -> Subscription
    where
        C: Consumer<Self::Output> + 'static,
        Self: Sized,
    {
        let weak: Weak<C> = Rc::downgrade(consumer);
        self.subscribe_weak(weak)
    }
}

// ─── Adapter ─────────────────────────────────────────────────────────────────

type CoerceFn<E, T> = dyn Fn(E) -> Result<T>;

/// Bridges one [`EventSource`] into a subscribable stream of `T`.
pub struct EventStreamAdapter<S: EventSource, T> {
    source: Rc<S>,
    coerce: Rc<CoerceFn<S::Event, T>>,
    config: StreamConfig,
    stats: StatsCell,
}

impl<S: EventSource, T> Clone for EventStreamAdapter<S, T> {
    fn clone(&self) -> Self {
        Self {
            source: Rc::clone(&self.source),
            coerce: Rc::clone(&self.coerce),
            config: self.config,
            stats: Rc::clone(&self.stats),
        }
    }
}

impl<S: EventSource, T> fmt::Debug for EventStreamAdapter<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStreamAdapter")
            .field("config", &self.config)
            .field("stats", &self.stats.get())
            .finish_non_exhaustive()
    }
}

impl<S, T> EventStreamAdapter<S, T>
where
    S: EventSource + 'static,
    S::Event: 'static,
    S::Handle: 'static,
    T: 'static,
{
    /// Create an adapter that converts each raw event with `coerce`.
    pub fn new(
        source: Rc<S>,
        config: StreamConfig,
        coerce: impl Fn(S::Event) -> Result<T> + 'static,
    ) -> Self {
        Self {
            source,
            coerce: Rc::new(coerce),
            config,
            stats: Rc::new(Cell::new(AdapterStats::default())),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Snapshot of the counters shared by all subscriptions of this adapter.
    #[must_use]
    pub fn stats(&self) -> AdapterStats {
        self.stats.get()
    }

    #[must_use]
    pub fn source(&self) -> &Rc<S> {
        &self.source
    }

    fn event_callback(
        &self,
        subscription: WeakSubscription,
        consumer: Weak<dyn Consumer<T>>,
    ) -> EventCallback<S::Event> {
        let coerce = Rc::clone(&self.coerce);
        let stats = Rc::clone(&self.stats);
        let config = self.config;
        Rc::new(move |raw: S::Event| {
            // The last handle is gone; its drop already unregistered.
            let Some(subscription) = subscription.upgrade() else {
                return;
            };
            deliver(&subscription, &consumer, &*coerce, raw, config, &stats);
        })
    }
}

impl<S> EventStreamAdapter<S, S::Event>
where
    S: EventSource + 'static,
    S::Event: 'static,
    S::Handle: 'static,
{
    /// An adapter that passes raw events through unchanged.
    pub fn passthrough(source: Rc<S>, config: StreamConfig) -> Self {
        Self::new(source, config, Ok)
    }
}

impl<S, T> Publisher for EventStreamAdapter<S, T>
where
    S: EventSource + 'static,
    S::Event: 'static,
    S::Handle: 'static,
    T: 'static,
{
    type Output = T;

    fn subscribe_weak(&self, consumer: Weak<dyn Consumer<T>>) -> Subscription {
        let subscription = Subscription::new(self.config.label);
        let on_event = self.event_callback(subscription.downgrade(), consumer);

        let handle = self.source.register(on_event);
        bump(&self.stats, |s| s.registrations += 1);

        let source = Rc::clone(&self.source);
        let stats = Rc::clone(&self.stats);
        subscription.activate(move || {
            source.unregister(handle);
            bump(&stats, |s| s.unregistrations += 1);
        });

        debug!(
            message = "stream.subscribe",
            subscription_id = subscription.id(),
            label = self.config.label,
            one_shot = self.config.is_one_shot()
        );
        subscription
    }
}

fn deliver<E, T>(
    subscription: &Subscription,
    consumer: &Weak<dyn Consumer<T>>,
    coerce: &CoerceFn<E, T>,
    raw: E,
    config: StreamConfig,
    stats: &Cell<AdapterStats>,
) {
    if !subscription.is_active() {
        bump(stats, |s| s.dropped_after_cancel += 1);
        trace!(
            message = "stream.drop.inactive",
            subscription_id = subscription.id(),
            label = config.label,
            state = ?subscription.state()
        );
        return;
    }

    let Some(consumer) = consumer.upgrade() else {
        bump(stats, |s| s.dropped_consumer_gone += 1);
        trace!(
            message = "stream.drop.consumer_gone",
            subscription_id = subscription.id(),
            label = config.label
        );
        drop(subscription.terminate("consumer gone"));
        return;
    };

    match coerce(raw) {
        Ok(value) => deliver_value(subscription, &*consumer, value, config, stats),
        Err(error) if config.drops_failures() => {
            bump(stats, |s| s.dropped_failures += 1);
            trace!(
                message = "stream.drop.coercion",
                subscription_id = subscription.id(),
                label = config.label,
                error = %error
            );
            let _ = error;
        }
        Err(error) => fail(subscription, &*consumer, error, config, stats),
    }
}

fn deliver_value<T>(
    subscription: &Subscription,
    consumer: &dyn Consumer<T>,
    value: T,
    config: StreamConfig,
    stats: &Cell<AdapterStats>,
) {
    bump(stats, |s| s.delivered += 1);
    match config.termination {
        Termination::Infinite => {
            if let ControlFlow::Break(()) = consumer.receive_value(value) {
                drop(subscription.terminate("consumer break"));
            }
        }
        Termination::OneShot => {
            let _retained = subscription.terminate("one-shot complete");
            // The flow answer is irrelevant: nothing follows but completion.
            let _ = consumer.receive_value(value);
            bump(stats, |s| s.completions += 1);
            consumer.receive_completion(Completion::Finished);
        }
    }
}

fn fail<T>(
    subscription: &Subscription,
    consumer: &dyn Consumer<T>,
    error: BridgeError,
    config: StreamConfig,
    stats: &Cell<AdapterStats>,
) {
    let _ = config;
    warn!(
        message = "stream.fail",
        subscription_id = subscription.id(),
        label = config.label,
        error = %error
    );
    let _retained = subscription.terminate("failed");
    bump(stats, |s| s.completions += 1);
    consumer.receive_completion(Completion::Failed(error));
}

// ─── Tests ───────────────────────────────────────────────────────────────────
