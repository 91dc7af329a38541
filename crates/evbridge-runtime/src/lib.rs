#![forbid(unsafe_code)]

//! Host-side event sources and the streams built on them.
//!
//! Each source is an object the application owns. Its stream factories return
//! an [`EventStreamAdapter`](evbridge_core::EventStreamAdapter) configured for
//! that source; subscribing registers with the source and the returned
//! [`Subscription`](evbridge_core::Subscription) unregisters on cancel or drop.
//!
//! | Source | Factory | Termination |
//! |--------|---------|-------------|
//! | [`Observable`] | `publisher()`, `changes()` | infinite |
//! | [`KeyValueObject`] | `observe::<T>(key)` | infinite |
//! | [`Control`] | `events(mask)`, `property::<T>(mask, key)` | infinite |
//! | [`DelegateProxy`] | `methods(sel)`, `method::<T>(sel, i)` | infinite |
//! | [`Operation`] | `publisher()` | one-shot |

pub mod control;
pub mod delegate;
pub mod key_value;
pub mod observable;
pub mod operation;
pub mod operators;

pub use control::{Control, ControlEventSource, ControlEvents, ControlPropertySource};
pub use delegate::{DelegateProxy, Dispatch, ForwardDelegate, MethodSource, Selector};
pub use key_value::{KeyChange, KeyPathSource, KeyValueObject};
pub use observable::{Change, Observable};
pub use operation::{Operation, OperationState};
pub use operators::{Operator, PublisherExt};
