#![forbid(unsafe_code)]

//! Core: subscriptions, consumers, event sources, and the callback-to-stream
//! adapter.
//!
//! The pieces fit together like this:
//!
//! - An [`EventSource`](source::EventSource) is anything with a
//!   `register(callback) -> handle` / `unregister(handle)` pair.
//! - An [`EventStreamAdapter`](adapter::EventStreamAdapter) wraps one source
//!   and hands out a [`Subscription`](subscription::Subscription) per
//!   [`Consumer`](consumer::Consumer).
//! - The subscription owns the registration and only weakly references the
//!   consumer, so a consumer going away never keeps the source's bookkeeping
//!   alive.

pub mod adapter;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod registry;
pub mod source;
pub mod subscription;
pub mod value;

pub use adapter::{
    AdapterStats, CoercionPolicy, EventStreamAdapter, Publisher, StreamConfig, Termination,
};
pub use consumer::{Completion, Consumer, Sink};
pub use error::{BridgeError, Result};
pub use registry::{ListenerId, ListenerRegistry};
pub use source::{EventCallback, EventSource};
pub use subscription::{
    CancelBag, Demand, Subscription, SubscriptionState, subscriptions_cancelled_total,
};
pub use value::{FromValue, Value};

// No-op logging macros used when the `tracing` feature is off. Call sites go
// through `crate::logging::{trace, debug, warn}` either way.

#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
