#![forbid(unsafe_code)]

//! Target-action controls.
//!
//! A [`Control`] fires actions for interaction events described by
//! [`ControlEvents`] bit masks. Targets register for a mask and run whenever
//! a sent event set intersects it. A disabled control sends nothing.
//!
//! Two stream factories sit on top:
//!
//! - [`events`](Control::events): one `()` per matching interaction.
//! - [`property`](Control::property): on each matching interaction, read a
//!   key from the control's property store and convert it. Missing or
//!   mistyped values are dropped.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use evbridge_core::logging::trace;
use evbridge_core::{
    BridgeError, EventCallback, EventSource, EventStreamAdapter, FromValue, ListenerId,
    ListenerRegistry, StreamConfig, Value,
};

use crate::key_value::{KeyValueObject, WeakKeyValueObject};

bitflags! {
    /// Interaction events a control can send.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlEvents: u32 {
        const TOUCH_DOWN               = 1 << 0;
        const TOUCH_DOWN_REPEAT        = 1 << 1;
        const TOUCH_DRAG_INSIDE        = 1 << 2;
        const TOUCH_DRAG_OUTSIDE       = 1 << 3;
        const TOUCH_DRAG_ENTER         = 1 << 4;
        const TOUCH_DRAG_EXIT          = 1 << 5;
        const TOUCH_UP_INSIDE          = 1 << 6;
        const TOUCH_UP_OUTSIDE         = 1 << 7;
        const TOUCH_CANCEL             = 1 << 8;
        const VALUE_CHANGED            = 1 << 12;
        const PRIMARY_ACTION_TRIGGERED = 1 << 13;
        const EDITING_DID_BEGIN        = 1 << 16;
        const EDITING_CHANGED          = 1 << 17;
        const EDITING_DID_END          = 1 << 18;
        const EDITING_DID_END_ON_EXIT  = 1 << 19;

        const ALL_TOUCH_EVENTS   = 0x0000_0FFF;
        const ALL_EDITING_EVENTS = 0x000F_0000;
    }
}

/// Property key read by [`Control::text_changes`].
pub const TEXT_KEY: &str = "text";
/// Property key read by [`Control::value_changes`].
pub const VALUE_KEY: &str = "value";

struct ControlInner {
    label: &'static str,
    targets: ListenerRegistry<ControlEvents>,
    enabled: Cell<bool>,
    properties: KeyValueObject,
}

/// A control that sends target-action events.
///
/// Cloning creates another handle to the **same** control.
#[derive(Clone)]
pub struct Control {
    inner: Rc<ControlInner>,
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Control")
            .field("label", &self.inner.label)
            .field("enabled", &self.inner.enabled.get())
            .field("targets", &self.inner.targets.len())
            .finish_non_exhaustive()
    }
}

impl Control {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            inner: Rc::new(ControlInner {
                label,
                targets: ListenerRegistry::new(),
                enabled: Cell::new(true),
                properties: KeyValueObject::new(),
            }),
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        self.inner.label
    }

    /// Run `action` with the intersecting events whenever `mask` is sent.
    pub fn add_target(
        &self,
        mask: ControlEvents,
        action: impl Fn(ControlEvents) + 'static,
    ) -> ListenerId {
        self.inner.targets.register(Rc::new(move |sent: ControlEvents| {
            let hit = sent & mask;
            if !hit.is_empty() {
                action(hit);
            }
        }))
    }

    pub fn remove_target(&self, id: ListenerId) -> bool {
        self.inner.targets.unregister(id)
    }

    #[must_use]
    pub fn target_count(&self) -> usize {
        self.inner.targets.len()
    }

    /// Send `events` to every interested target. Returns the number of
    /// targets considered, `0` when disabled.
    pub fn send_actions(&self, events: ControlEvents) -> usize {
        if !self.is_enabled() {
            trace!(
                message = "control.send.disabled",
                label = self.inner.label,
                events = events.bits()
            );
            return 0;
        }
        self.inner.targets.emit(events)
    }

    /// Shorthand for a completed tap.
    pub fn tap(&self) -> usize {
        self.send_actions(ControlEvents::TOUCH_DOWN | ControlEvents::TOUCH_UP_INSIDE)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.set(enabled);
    }

    /// The control's property store.
    #[must_use]
    pub fn properties(&self) -> &KeyValueObject {
        &self.inner.properties
    }

    /// Store a property and send `events`, the way a user edit would.
    pub fn edit(&self, key: &str, value: impl Into<Value>, events: ControlEvents) -> usize {
        self.inner.properties.set_value(key, value);
        self.send_actions(events)
    }

    /// Infinite stream of `()` for every interaction intersecting `mask`.
    #[must_use]
    pub fn events(&self, mask: ControlEvents) -> EventStreamAdapter<ControlEventSource, ()> {
        EventStreamAdapter::new(
            Rc::new(ControlEventSource {
                control: self.clone(),
                mask,
            }),
            StreamConfig::infinite("control.events"),
            |_: ControlEvents| Ok(()),
        )
    }

    /// Infinite stream of `key` read at each interaction intersecting `mask`.
    #[must_use]
    pub fn property<T: FromValue + 'static>(
        &self,
        mask: ControlEvents,
        key: &str,
    ) -> EventStreamAdapter<ControlPropertySource, T> {
        let missing_key: Rc<str> = Rc::from(key);
        EventStreamAdapter::new(
            Rc::new(ControlPropertySource {
                events: ControlEventSource {
                    control: self.clone(),
                    mask,
                },
                store: self.inner.properties.downgrade(),
                key: Rc::from(key),
            }),
            StreamConfig::infinite("control.property"),
            move |value: Option<Value>| {
                value
                    .ok_or_else(|| BridgeError::missing(&*missing_key))
                    .and_then(T::from_value)
            },
        )
    }

    /// Completed taps.
    #[must_use]
    pub fn taps(&self) -> EventStreamAdapter<ControlEventSource, ()> {
        self.events(ControlEvents::TOUCH_UP_INSIDE)
    }

    /// The `"text"` property after every editing event or value change.
    #[must_use]
    pub fn text_changes(&self) -> EventStreamAdapter<ControlPropertySource, String> {
        self.property(
            ControlEvents::ALL_EDITING_EVENTS | ControlEvents::VALUE_CHANGED,
            TEXT_KEY,
        )
    }

    /// The `"value"` property after every value change.
    #[must_use]
    pub fn value_changes<T: FromValue + 'static>(
        &self,
    ) -> EventStreamAdapter<ControlPropertySource, T> {
        self.property(ControlEvents::VALUE_CHANGED, VALUE_KEY)
    }
}

/// Interactions of one control, filtered by mask.
pub struct ControlEventSource {
    control: Control,
    mask: ControlEvents,
}

impl fmt::Debug for ControlEventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlEventSource")
            .field("control", &self.control.label())
            .field("mask", &self.mask)
            .finish()
    }
}

impl EventSource for ControlEventSource {
    type Event = ControlEvents;
    type Handle = ListenerId;

    fn register(&self, on_event: EventCallback<ControlEvents>) -> ListenerId {
        self.control.add_target(self.mask, move |hit| on_event(hit))
    }

    fn unregister(&self, handle: ListenerId) {
        self.control.remove_target(handle);
    }
}

/// A property read at interaction time.
///
/// The registered action holds the property store weakly, so the control
/// never keeps itself alive through its own targets.
pub struct ControlPropertySource {
    events: ControlEventSource,
    store: WeakKeyValueObject,
    key: Rc<str>,
}

impl fmt::Debug for ControlPropertySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPropertySource")
            .field("events", &self.events)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl EventSource for ControlPropertySource {
    type Event = Option<Value>;
    type Handle = ListenerId;

    fn register(&self, on_event: EventCallback<Option<Value>>) -> ListenerId {
        let store = self.store.clone();
        let key = Rc::clone(&self.key);
        self.events.register(Rc::new(move |_hit: ControlEvents| {
            let value = store.upgrade().and_then(|props| props.value(&key));
            on_event(value);
        }))
    }

    fn unregister(&self, handle: ListenerId) {
        self.events.unregister(handle);
    }
}
