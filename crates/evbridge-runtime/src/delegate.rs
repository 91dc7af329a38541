#![forbid(unsafe_code)]

//! Delegate-method interception.
//!
//! A [`DelegateProxy`] stands in as an object's delegate. When the host calls
//! a delegate method it goes through [`DelegateProxy::invoke`], which
//!
//! 1. hands the arguments to every interceptor registered for that selector,
//!    in registration order, and then
//! 2. forwards the call to the original delegate, if one is set and still
//!    alive, so existing behavior keeps working.
//!
//! The forward delegate is held weakly; the proxy never extends its life.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use evbridge_core::logging::{debug, trace};
use evbridge_core::{
    BridgeError, EventCallback, EventSource, EventStreamAdapter, FromValue, ListenerId,
    ListenerRegistry, StreamConfig, Value,
};

/// Name of a delegate method, e.g. `"scrollViewDidScroll:"`.
pub type Selector = &'static str;

/// The original delegate a proxy forwards to.
pub trait ForwardDelegate {
    /// Whether this delegate implements `selector`.
    fn responds_to(&self, selector: Selector) -> bool;

    /// Handle a forwarded call.
    fn invoke(&self, selector: Selector, args: &[Value]);
}

/// What one [`DelegateProxy::invoke`] call reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dispatch {
    /// Interceptors that ran.
    pub intercepted: usize,
    /// Whether the forward delegate handled the call.
    pub forwarded: bool,
}

type Interceptors = Rc<ListenerRegistry<Rc<[Value]>>>;

#[derive(Default)]
struct ProxyInner {
    interceptors: RefCell<AHashMap<Selector, Interceptors>>,
    forward: RefCell<Option<Weak<dyn ForwardDelegate>>>,
}

/// Delegate stand-in that turns method calls into streams.
///
/// Cloning creates another handle to the **same** proxy.
#[derive(Clone, Default)]
pub struct DelegateProxy {
    inner: Rc<ProxyInner>,
}

impl fmt::Debug for DelegateProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut selectors: Vec<Selector> =
            self.inner.interceptors.borrow().keys().copied().collect();
        selectors.sort_unstable();
        f.debug_struct("DelegateProxy")
            .field("intercepted", &selectors)
            .field("has_forward", &self.forward_delegate().is_some())
            .finish()
    }
}

impl DelegateProxy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward calls to `delegate` after interceptors have run.
    pub fn set_forward_delegate<D: ForwardDelegate + 'static>(&self, delegate: &Rc<D>) {
        let weak = Rc::downgrade(delegate);
        let weak: Weak<dyn ForwardDelegate> = weak;
        *self.inner.forward.borrow_mut() = Some(weak);
    }

    pub fn clear_forward_delegate(&self) {
        self.inner.forward.borrow_mut().take();
    }

    fn forward_delegate(&self) -> Option<Rc<dyn ForwardDelegate>> {
        self.inner.forward.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// True if `selector` is intercepted or the forward delegate implements
    /// it. Hosts use this to decide whether to call the method at all.
    #[must_use]
    pub fn responds_to(&self, selector: Selector) -> bool {
        self.is_intercepting(selector)
            || self
                .forward_delegate()
                .is_some_and(|d| d.responds_to(selector))
    }

    #[must_use]
    pub fn is_intercepting(&self, selector: Selector) -> bool {
        self.inner
            .interceptors
            .borrow()
            .get(selector)
            .is_some_and(|r| !r.is_empty())
    }

    /// Called by the host when a delegate method fires.
    pub fn invoke(&self, selector: Selector, args: Vec<Value>) -> Dispatch {
        let args: Rc<[Value]> = args.into();
        let registry = self.inner.interceptors.borrow().get(selector).cloned();
        let intercepted = registry.map_or(0, |r| r.emit(Rc::clone(&args)));

        let forwarded = match self.forward_delegate() {
            Some(delegate) if delegate.responds_to(selector) => {
                delegate.invoke(selector, &args);
                true
            }
            _ => false,
        };
        trace!(
            message = "delegate.invoke",
            selector,
            intercepted,
            forwarded
        );
        Dispatch {
            intercepted,
            forwarded,
        }
    }

    fn intercept(&self, selector: Selector, on_call: EventCallback<Rc<[Value]>>) -> ListenerId {
        let registry = Rc::clone(
            self.inner
                .interceptors
                .borrow_mut()
                .entry(selector)
                .or_default(),
        );
        let id = registry.register(on_call);
        debug!(message = "delegate.intercept", selector, listener = id);
        id
    }

    fn remove_interceptor(&self, selector: Selector, id: ListenerId) {
        let mut interceptors = self.inner.interceptors.borrow_mut();
        let now_empty = interceptors.get(selector).is_some_and(|registry| {
            registry.unregister(id);
            registry.is_empty()
        });
        if now_empty {
            interceptors.remove(selector);
        }
    }

    /// Infinite stream of the argument lists `selector` is called with.
    #[must_use]
    pub fn methods(&self, selector: Selector) -> EventStreamAdapter<MethodSource, Vec<Value>> {
        EventStreamAdapter::new(
            self.method_source(selector),
            StreamConfig::infinite("delegate.method"),
            |args: Rc<[Value]>| Ok(args.to_vec()),
        )
    }

    /// Infinite stream of argument `index` of each `selector` call, converted
    /// to `T`. Calls with too few or mistyped arguments are dropped.
    #[must_use]
    pub fn method<T: FromValue + 'static>(
        &self,
        selector: Selector,
        index: usize,
    ) -> EventStreamAdapter<MethodSource, T> {
        EventStreamAdapter::new(
            self.method_source(selector),
            StreamConfig::infinite("delegate.argument"),
            move |args: Rc<[Value]>| {
                args.get(index)
                    .cloned()
                    .ok_or_else(|| BridgeError::missing(format!("{selector}[{index}]")))
                    .and_then(T::from_value)
            },
        )
    }

    fn method_source(&self, selector: Selector) -> Rc<MethodSource> {
        Rc::new(MethodSource {
            proxy: self.clone(),
            selector,
        })
    }
}

/// Calls of one selector on one proxy.
pub struct MethodSource {
    proxy: DelegateProxy,
    selector: Selector,
}

impl fmt::Debug for MethodSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSource")
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl EventSource for MethodSource {
    type Event = Rc<[Value]>;
    type Handle = ListenerId;

    fn register(&self, on_event: EventCallback<Rc<[Value]>>) -> ListenerId {
        self.proxy.intercept(self.selector, on_event)
    }

    fn unregister(&self, handle: ListenerId) {
        self.proxy.remove_interceptor(self.selector, handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evbridge_core::{Publisher, Sink};
    use std::cell::Cell;

    const DID_SCROLL: Selector = "scrollViewDidScroll:";
    const DID_SELECT: Selector = "tableView:didSelectRowAt:";

    #[derive(Default)]
    struct Original {
        scrolls: Cell<u32>,
    }

    impl ForwardDelegate for Original {
        fn responds_to(&self, selector: Selector) -> bool {
            selector == DID_SCROLL
        }

        fn invoke(&self, _selector: Selector, _args: &[Value]) {
            self.scrolls.set(self.scrolls.get() + 1);
        }
    }

    #[test]
    fn intercepts_and_forwards() {
        let proxy = DelegateProxy::new();
        let original = Rc::new(Original::default());
        proxy.set_forward_delegate(&original);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in = Rc::clone(&seen);
        let sink = Rc::new(Sink::new(move |args: Vec<Value>| seen_in.borrow_mut().push(args)));
        let _sub = proxy.methods(DID_SCROLL).subscribe(&sink);

        let d = proxy.invoke(DID_SCROLL, vec![Value::Float(12.0)]);
        assert_eq!(
            d,
            Dispatch {
                intercepted: 1,
                forwarded: true
            }
        );
        assert_eq!(*seen.borrow(), vec![vec![Value::Float(12.0)]]);
        assert_eq!(original.scrolls.get(), 1);
    }

    #[test]
    fn responds_to_follows_interception_and_forward() {
        let proxy = DelegateProxy::new();
        assert!(!proxy.responds_to(DID_SELECT));

        let sink = Rc::new(Sink::new(|_: Vec<Value>| {}));
        let sub = proxy.methods(DID_SELECT).subscribe(&sink);
        assert!(proxy.responds_to(DID_SELECT));
        sub.cancel();
        assert!(!proxy.responds_to(DID_SELECT));

        let original = Rc::new(Original::default());
        proxy.set_forward_delegate(&original);
        assert!(proxy.responds_to(DID_SCROLL));
        drop(original);
        assert!(!proxy.responds_to(DID_SCROLL));
    }

    #[test]
    fn typed_argument_drops_short_or_mistyped_calls() {
        let proxy = DelegateProxy::new();
        let rows = Rc::new(RefCell::new(Vec::new()));
        let rows_in = Rc::clone(&rows);
        let sink = Rc::new(Sink::new(move |row: usize| rows_in.borrow_mut().push(row)));
        let stream = proxy.method::<usize>(DID_SELECT, 1);
        let _sub = stream.subscribe(&sink);

        proxy.invoke(DID_SELECT, vec![Value::Null, Value::Int(4)]);
        proxy.invoke(DID_SELECT, vec![Value::Null]);
        proxy.invoke(DID_SELECT, vec![Value::Null, Value::from("x")]);
        proxy.invoke(DID_SELECT, vec![Value::Null, Value::Int(7)]);

        assert_eq!(*rows.borrow(), vec![4, 7]);
        assert_eq!(stream.stats().dropped_failures, 2);
    }

    #[test]
    fn forward_delegate_is_not_retained() {
        let proxy = DelegateProxy::new();
        let original = Rc::new(Original::default());
        proxy.set_forward_delegate(&original);
        assert_eq!(Rc::strong_count(&original), 1);
        assert!(!proxy.invoke(DID_SELECT, Vec::new()).forwarded);
        proxy.clear_forward_delegate();
        assert!(!proxy.invoke(DID_SCROLL, Vec::new()).forwarded);
    }
}
