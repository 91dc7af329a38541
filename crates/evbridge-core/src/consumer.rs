#![forbid(unsafe_code)]

//! The downstream side of a stream.
//!
//! A [`Consumer`] receives values one at a time and at most one terminal
//! [`Completion`]. Returning [`ControlFlow::Break`] from
//! [`receive_value`](Consumer::receive_value) tells the subscription that no
//! further values are wanted; it cancels right after that delivery.
//!
//! Consumers are always handed to a stream as `Rc<C>` and held weakly by the
//! subscription. Whoever created the consumer decides how long it lives.

use std::fmt;
use std::ops::ControlFlow;

use crate::error::BridgeError;

/// Terminal signal delivered to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The stream ended normally (one-shot success).
    Finished,
    /// The stream ended with a failure.
    Failed(BridgeError),
}

impl Completion {
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    #[must_use]
    pub fn error(&self) -> Option<&BridgeError> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Finished => None,
        }
    }
}

/// Receiver of stream values.
pub trait Consumer<T> {
    /// Receive one value. Return `ControlFlow::Break(())` to stop the stream.
    fn receive_value(&self, value: T) -> ControlFlow<()>;

    /// Receive the terminal signal. Called at most once per subscription.
    fn receive_completion(&self, completion: Completion);
}

type ValueFn<T> = Box<dyn Fn(T) -> ControlFlow<()>>;
type CompletionFn = Box<dyn Fn(Completion)>;

/// Closure-backed consumer.
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use evbridge_core::consumer::{Consumer, Sink};
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let seen_in = Rc::clone(&seen);
/// let sink = Sink::new(move |v: i32| seen_in.borrow_mut().push(v));
/// let _ = sink.receive_value(3);
/// assert_eq!(*seen.borrow(), vec![3]);
/// ```
pub struct Sink<T> {
    on_value: ValueFn<T>,
    on_completion: CompletionFn,
}

impl<T> Sink<T> {
    /// A sink that accepts every value.
    pub fn new(on_value: impl Fn(T) + 'static) -> Self {
        Self::with_flow(move |v| {
            on_value(v);
            ControlFlow::Continue(())
        })
    }

    /// A sink whose closure decides whether to keep receiving.
    pub fn with_flow(on_value: impl Fn(T) -> ControlFlow<()> + 'static) -> Self {
        Self {
            on_value: Box::new(on_value),
            on_completion: Box::new(|_| {}),
        }
    }

    /// Set the completion handler.
    #[must_use]
    pub fn on_completion(mut self, on_completion: impl Fn(Completion) + 'static) -> Self {
        self.on_completion = Box::new(on_completion);
        self
    }
}

impl<T> Consumer<T> for Sink<T> {
    fn receive_value(&self, value: T) -> ControlFlow<()> {
        (self.on_value)(value)
    }

    fn receive_completion(&self, completion: Completion) {
        (self.on_completion)(completion);
    }
}

impl<T> fmt::Debug for Sink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").finish_non_exhaustive()
    }
}
