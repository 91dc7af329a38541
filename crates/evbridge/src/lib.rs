#![forbid(unsafe_code)]

//! evbridge public facade crate.
//!
//! Turns callback-registration APIs into subscribable streams with leak-free
//! teardown. Most users want the [`prelude`].
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use evbridge::prelude::*;
//!
//! let counter = Observable::new(0);
//! let seen = Rc::new(Cell::new(0));
//! let seen_in = Rc::clone(&seen);
//! let sub = counter.publisher().sink(move |v| seen_in.set(v));
//!
//! counter.set(3);
//! assert_eq!(seen.get(), 3);
//!
//! sub.cancel();
//! counter.set(4);
//! assert_eq!(seen.get(), 3);
//! ```

pub use evbridge_core as core;
#[cfg(feature = "harness")]
pub use evbridge_harness as harness;
#[cfg(feature = "runtime")]
pub use evbridge_runtime as runtime;

pub mod prelude {
    pub use evbridge_core::{
        BridgeError, CancelBag, Completion, Consumer, Demand, EventSource, EventStreamAdapter,
        Publisher, Sink, StreamConfig, Subscription, Value,
    };
    #[cfg(feature = "runtime")]
    pub use evbridge_runtime::{
        Control, ControlEvents, DelegateProxy, KeyValueObject, Observable, Operation,
        PublisherExt,
    };
}
