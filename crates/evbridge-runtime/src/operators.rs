#![forbid(unsafe_code)]

//! Stream transforms.
//!
//! # Design
//!
//! Every operator is a [`Publisher`] wrapping an upstream publisher. On
//! subscribe it builds a fresh [`Stage`] (so per-subscription state such as
//! `remove_duplicates`' last value is never shared), subscribes the stage
//! upstream, and attaches the stage to the returned [`Subscription`]:
//!
//! ```text
//! source ──weak──> stage₁ ──weak──> stage₂ ──weak──> consumer
//! Subscription ──owns──> stage₁, stage₂
//! ```
//!
//! The whole chain shares one subscription. Cancelling it unregisters from
//! the source and releases every stage.
//!
//! # Invariants
//!
//! 1. Values keep their upstream order; operators never reorder or buffer.
//! 2. Completions are forwarded unchanged.
//! 3. A stage whose downstream consumer is gone answers `Break`, which
//!    cancels the chain.

use std::cell::RefCell;
use std::fmt;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use evbridge_core::logging::trace;
use evbridge_core::{Completion, Consumer, Publisher, Sink, Subscription};

type StepFn<T, U> = Box<dyn Fn(T) -> Option<U>>;
type MakeStep<T, U> = Rc<dyn Fn() -> StepFn<T, U>>;

fn step_factory<T, U>(make: impl Fn() -> StepFn<T, U> + 'static) -> MakeStep<T, U> {
    Rc::new(make)
}

/// One operator instance inside one subscription.
struct Stage<T, U> {
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    label: &'static str,
    step: StepFn<T, U>,
    downstream: Weak<dyn Consumer<U>>,
}

impl<T, U> Consumer<T> for Stage<T, U> {
    fn receive_value(&self, value: T) -> ControlFlow<()> {
        // Checked before the step so a filtering stage still notices.
        let Some(downstream) = self.downstream.upgrade() else {
            trace!(message = "operator.downstream_gone", operator = self.label);
            return ControlFlow::Break(());
        };
        match (self.step)(value) {
            Some(out) => downstream.receive_value(out),
            None => ControlFlow::Continue(()),
        }
    }

    fn receive_completion(&self, completion: Completion) {
        if let Some(downstream) = self.downstream.upgrade() {
            downstream.receive_completion(completion);
        }
    }
}

/// A transform applied to an upstream publisher.
///
/// Built by the [`PublisherExt`] methods.
pub struct Operator<P: Publisher, U> {
    upstream: P,
    label: &'static str,
    make_step: MakeStep<P::Output, U>,
}

impl<P: Publisher + Clone, U> Clone for Operator<P, U> {
    fn clone(&self) -> Self {
        Self {
            upstream: self.upstream.clone(),
            label: self.label,
            make_step: Rc::clone(&self.make_step),
        }
    }
}

impl<P: Publisher + fmt::Debug, U> fmt::Debug for Operator<P, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("label", &self.label)
            .field("upstream", &self.upstream)
            .finish_non_exhaustive()
    }
}

impl<P: Publisher, U: 'static> Operator<P, U> {
    fn new(upstream: P, label: &'static str, make_step: MakeStep<P::Output, U>) -> Self {
        Self {
            upstream,
            label,
            make_step,
        }
    }

    #[must_use]
    pub fn upstream(&self) -> &P {
        &self.upstream
    }
}

impl<P: Publisher, U: 'static> Publisher for Operator<P, U> {
    type Output = U;

    fn subscribe_weak(&self, consumer: Weak<dyn Consumer<U>>) -> Subscription {
        let stage = Rc::new(Stage {
            label: self.label,
            step: (self.make_step)(),
            downstream: consumer,
        });
        let upstream_consumer = Rc::downgrade(&stage);
        let subscription = self.upstream.subscribe_weak(upstream_consumer);
        subscription.attach(stage);
        subscription
    }
}

/// Transform and terminal methods for every [`Publisher`].
pub trait PublisherExt: Publisher + Sized {
    /// Transform each value.
    fn map<U: 'static>(self, f: impl Fn(Self::Output) -> U + 'static) -> Operator<Self, U> {
        let f = Rc::new(f);
        Operator::new(
            self,
            "map",
            step_factory::<Self::Output, U>(move || {
                let f = Rc::clone(&f);
                Box::new(move |v| Some(f(v)))
            }),
        )
    }

    /// Keep values for which `predicate` holds.
    fn filter(
        self,
        predicate: impl Fn(&Self::Output) -> bool + 'static,
    ) -> Operator<Self, Self::Output> {
        let predicate = Rc::new(predicate);
        Operator::new(
            self,
            "filter",
            step_factory::<Self::Output, Self::Output>(move || {
                let predicate = Rc::clone(&predicate);
                Box::new(move |v| predicate(&v).then_some(v))
            }),
        )
    }

    /// Transform each value, dropping `None`.
    fn compact_map<U: 'static>(
        self,
        f: impl Fn(Self::Output) -> Option<U> + 'static,
    ) -> Operator<Self, U> {
        let f = Rc::new(f);
        Operator::new(
            self,
            "compact_map",
            step_factory::<Self::Output, U>(move || {
                let f = Rc::clone(&f);
                Box::new(move |v| f(v))
            }),
        )
    }

    /// Drop values equal to the one delivered just before.
    fn remove_duplicates(self) -> Operator<Self, Self::Output>
    where
        Self::Output: PartialEq + Clone,
    {
        Operator::new(
            self,
            "remove_duplicates",
            step_factory::<Self::Output, Self::Output>(|| {
                let last = RefCell::new(None);
                Box::new(move |v: Self::Output| {
                    let mut last = last.borrow_mut();
                    if last.as_ref() == Some(&v) {
                        return None;
                    }
                    *last = Some(v.clone());
                    Some(v)
                })
            }),
        )
    }

    /// Subscribe a closure. The returned subscription keeps it alive.
    fn sink(&self, on_value: impl Fn(Self::Output) + 'static) -> Subscription {
        self.sink_consumer(Sink::new(on_value))
    }

    /// Subscribe closures for values and the completion.
    fn sink_completion(
        &self,
        on_value: impl Fn(Self::Output) + 'static,
        on_completion: impl Fn(Completion) + 'static,
    ) -> Subscription {
        self.sink_consumer(Sink::new(on_value).on_completion(on_completion))
    }

    /// Subscribe an owned consumer, kept alive by the returned subscription.
    fn sink_consumer<C: Consumer<Self::Output> + 'static>(&self, consumer: C) -> Subscription {
        let consumer = Rc::new(consumer);
        let subscription = self.subscribe(&consumer);
        subscription.attach(consumer);
        subscription
    }
}

impl<P: Publisher> PublisherExt for P {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::Observable;
    use crate::operation::Operation;
    use std::cell::Cell;

    fn collected<T: 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(T) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in = Rc::clone(&seen);
        (seen, move |v| seen_in.borrow_mut().push(v))
    }

    #[test]
    fn map_filter_chain_preserves_order() {
        let obs = Observable::new(0);
        let (seen, push) = collected::<String>();
        let _sub = obs
            .publisher()
            .filter(|v| v % 2 == 1)
            .map(|v| format!("#{v}"))
            .sink(push);

        for v in 1..=5 {
            obs.set(v);
        }
        assert_eq!(*seen.borrow(), vec!["#1", "#3", "#5"]);
    }

    #[test]
    fn compact_map_drops_none() {
        let obs = Observable::new(String::new());
        let (seen, push) = collected::<u8>();
        let _sub = obs
            .publisher()
            .compact_map(|s| s.parse::<u8>().ok())
            .sink(push);

        for s in ["1", "x", "300", "4"] {
            obs.set(s.to_string());
        }
        assert_eq!(*seen.borrow(), vec![1, 4]);
    }

    #[test]
    fn remove_duplicates_is_per_subscription() {
        let control = crate::control::Control::new("stepper");
        let stream = control
            .value_changes::<i64>()
            .remove_duplicates();
        let (a, push_a) = collected::<i64>();
        let _sa = stream.sink(push_a);

        for v in [1, 1, 2, 2, 1] {
            control
                .properties()
                .set_value(crate::control::VALUE_KEY, v);
            control.send_actions(crate::control::ControlEvents::VALUE_CHANGED);
        }
        let (b, push_b) = collected::<i64>();
        let _sb = stream.sink(push_b);
        control.send_actions(crate::control::ControlEvents::VALUE_CHANGED);

        assert_eq!(*a.borrow(), vec![1, 2, 1]);
        assert_eq!(*b.borrow(), vec![1]);
    }

    #[test]
    fn cancel_releases_every_stage_and_the_sink() {
        let obs = Observable::new(0);
        let drops = Rc::new(Cell::new(0));

        struct DropCounter(Rc<Cell<u32>>);
        impl DropCounter {
            fn touch(&self) {}
        }
        impl Drop for DropCounter {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let counter = DropCounter(Rc::clone(&drops));
        let sub = obs
            .publisher()
            .map(|v| v * 2)
            .sink(move |_| counter.touch());
        assert_eq!(obs.observer_count(), 1);
        sub.cancel();
        assert_eq!(obs.observer_count(), 0);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn completion_is_forwarded_through_stages() {
        let op = Operation::<u32>::new("load");
        let (seen, push) = collected::<u32>();
        let finished = Rc::new(Cell::new(false));
        let finished_in = Rc::clone(&finished);
        let _sub = op
            .publisher()
            .map(|v| v + 1)
            .sink_completion(push, move |c| finished_in.set(c.is_finished()));

        op.resolve(41);
        assert_eq!(*seen.borrow(), vec![42]);
        assert!(finished.get());
    }

    #[test]
    fn dropped_downstream_breaks_the_chain() {
        let obs = Observable::new(0);
        let count = Rc::new(Cell::new(0));
        let count_in = Rc::clone(&count);
        let consumer = Rc::new(Sink::new(move |_: i32| count_in.set(count_in.get() + 1)));
        let sub = obs.publisher().map(|v| v + 1).subscribe(&consumer);

        obs.set(1);
        drop(consumer);
        obs.set(2);
        assert_eq!(count.get(), 1);
        assert!(sub.is_cancelled());
        assert_eq!(obs.observer_count(), 0);
    }

    #[test]
    fn dropped_downstream_behind_rejecting_filter_is_released() {
        let obs = Observable::new(0);
        let consumer = Rc::new(Sink::new(|_: i32| {}));
        let sub = obs.publisher().filter(|v| *v > 100).subscribe(&consumer);

        drop(consumer);
        for v in 1..=50 {
            obs.set(v);
        }
        assert!(sub.is_cancelled());
        assert_eq!(obs.observer_count(), 0);
    }
}
