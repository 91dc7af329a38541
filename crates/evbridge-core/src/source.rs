#![forbid(unsafe_code)]

//! The upstream side: callback registration APIs.
//!
//! An [`EventSource`] is the smallest abstraction of a host event API: hand
//! it a callback, get back a handle; hand the handle back to stop the
//! callbacks. Property observation, target-action control events, delegate
//! methods, and one-shot completions all fit this shape.
//!
//! # Contract for implementors
//!
//! - `register` must not call the callback before it returns.
//! - After `unregister(handle)` returns, the callback must not be invoked for
//!   events raised later.
//! - `register`/`unregister` may be called from inside a callback the source
//!   is currently running. Keep your own clone of the callback `Rc` for the
//!   duration of each call (as [`ListenerRegistry`] does).
//!
//! [`ListenerRegistry`]: crate::registry::ListenerRegistry

use std::rc::Rc;

/// Callback handed to [`EventSource::register`].
pub type EventCallback<E> = Rc<dyn Fn(E)>;

/// A host API that delivers events to registered callbacks.
pub trait EventSource {
    /// Payload of one event.
    type Event;
    /// Opaque token identifying one registration.
    type Handle;

    fn register(&self, on_event: EventCallback<Self::Event>) -> Self::Handle;

    fn unregister(&self, handle: Self::Handle);
}

impl<S: EventSource + ?Sized> EventSource for Rc<S> {
    type Event = S::Event;
    type Handle = S::Handle;

    fn register(&self, on_event: EventCallback<Self::Event>) -> Self::Handle {
        (**self).register(on_event)
    }

    fn unregister(&self, handle: Self::Handle) {
        (**self).unregister(handle);
    }
}
