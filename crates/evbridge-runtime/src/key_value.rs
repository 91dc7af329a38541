#![forbid(unsafe_code)]

//! Key-path observation over dynamically typed properties.
//!
//! A [`KeyValueObject`] stores [`Value`]s under string keys and notifies
//! observers of every change. [`observe`](KeyValueObject::observe) turns one
//! key into a typed stream; values that do not convert to the requested type
//! are dropped and later matching values keep flowing.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use evbridge_core::logging::trace;
use evbridge_core::{
    EventCallback, EventSource, EventStreamAdapter, FromValue, ListenerId, ListenerRegistry,
    StreamConfig, Value,
};

/// One changed key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyChange {
    pub key: Rc<str>,
    /// Previous value, `Value::Null` if the key was absent.
    pub old: Value,
    /// New value, `Value::Null` if the key was removed.
    pub new: Value,
}

pub(crate) struct KeyValueInner {
    values: RefCell<AHashMap<Rc<str>, Value>>,
    observers: ListenerRegistry<KeyChange>,
}

/// Shared property store with per-key change notification.
#[derive(Clone)]
pub struct KeyValueObject {
    inner: Rc<KeyValueInner>,
}

impl Default for KeyValueObject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyValueObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueObject")
            .field("keys", &self.inner.values.borrow().len())
            .field("observers", &self.inner.observers.len())
            .finish()
    }
}

impl KeyValueObject {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(KeyValueInner {
                values: RefCell::new(AHashMap::new()),
                observers: ListenerRegistry::new(),
            }),
        }
    }

    /// Store `value` under `key`. Returns `true` if observers were notified.
    ///
    /// Storing a value equal to the current one does nothing.
    pub fn set_value(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let change = {
            let mut values = self.inner.values.borrow_mut();
            // An absent key reads as `Null`.
            if values.get(key).unwrap_or(&Value::Null) == &value {
                return false;
            }
            let key: Rc<str> = values
                .get_key_value(key)
                .map_or_else(|| Rc::from(key), |(k, _)| Rc::clone(k));
            let old = values
                .insert(Rc::clone(&key), value.clone())
                .unwrap_or_default();
            KeyChange {
                key,
                old,
                new: value,
            }
        };
        self.notify(change);
        true
    }

    /// Remove `key`, notifying observers with a `Value::Null` new value.
    pub fn remove_value(&self, key: &str) -> Option<Value> {
        let (key, old) = self.inner.values.borrow_mut().remove_entry(key)?;
        if !old.is_null() {
            self.notify(KeyChange {
                key,
                old: old.clone(),
                new: Value::Null,
            });
        }
        Some(old)
    }

    /// Clone of the value stored under `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<Value> {
        self.inner.values.borrow().get(key).cloned()
    }

    /// Typed read of `key`.
    pub fn typed_value<T: FromValue>(&self, key: &str) -> evbridge_core::Result<T> {
        self.value(key)
            .ok_or_else(|| evbridge_core::BridgeError::missing(key))
            .and_then(T::from_value)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.values.borrow().contains_key(key)
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }

    /// Register a raw observer for every key.
    pub fn add_observer(&self, on_change: EventCallback<KeyChange>) -> ListenerId {
        self.inner.observers.register(on_change)
    }

    pub fn remove_observer(&self, id: ListenerId) -> bool {
        self.inner.observers.unregister(id)
    }

    pub(crate) fn downgrade(&self) -> WeakKeyValueObject {
        WeakKeyValueObject {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn notify(&self, change: KeyChange) {
        trace!(message = "kvo.notify", key = &*change.key);
        self.inner.observers.emit(change);
    }

    /// Infinite stream of `key`'s new values, converted to `T`.
    ///
    /// Values that fail to convert (including removal, which reports
    /// `Value::Null`) are dropped unless `T` accepts null, e.g. `Option<_>`.
    #[must_use]
    pub fn observe<T: FromValue + 'static>(
        &self,
        key: &str,
    ) -> EventStreamAdapter<KeyPathSource, T> {
        EventStreamAdapter::new(
            Rc::new(KeyPathSource {
                object: self.clone(),
                key: Rc::from(key),
            }),
            StreamConfig::infinite("kvo"),
            T::from_value,
        )
    }
}

/// Non-owning handle to a [`KeyValueObject`].
#[derive(Clone)]
pub(crate) struct WeakKeyValueObject {
    inner: Weak<KeyValueInner>,
}

impl WeakKeyValueObject {
    pub(crate) fn upgrade(&self) -> Option<KeyValueObject> {
        self.inner.upgrade().map(|inner| KeyValueObject { inner })
    }
}

/// The [`EventSource`] behind [`KeyValueObject::observe`]: changes to one key.
pub struct KeyPathSource {
    object: KeyValueObject,
    key: Rc<str>,
}

impl KeyPathSource {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for KeyPathSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPathSource")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl EventSource for KeyPathSource {
    type Event = Value;
    type Handle = ListenerId;

    fn register(&self, on_event: EventCallback<Value>) -> ListenerId {
        let key = Rc::clone(&self.key);
        self.object.add_observer(Rc::new(move |change: KeyChange| {
            if change.key == key {
                on_event(change.new);
            }
        }))
    }

    fn unregister(&self, handle: ListenerId) {
        self.object.remove_observer(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evbridge_core::{Publisher, Sink};
    use std::cell::RefCell;

    fn collect<T: 'static>() -> (Rc<RefCell<Vec<T>>>, Rc<Sink<T>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in = Rc::clone(&seen);
        let sink = Rc::new(Sink::new(move |v: T| seen_in.borrow_mut().push(v)));
        (seen, sink)
    }

    #[test]
    fn set_and_read() {
        let obj = KeyValueObject::new();
        assert!(obj.set_value("count", 3));
        assert!(!obj.set_value("count", 3));
        assert_eq!(obj.value("count"), Some(Value::Int(3)));
        assert_eq!(obj.typed_value::<i64>("count"), Ok(3));
        assert!(obj.typed_value::<i64>("absent").is_err());
    }

    #[test]
    fn observe_only_sees_its_key() {
        let obj = KeyValueObject::new();
        let (seen, sink) = collect::<String>();
        let _sub = obj.observe::<String>("title").subscribe(&sink);

        obj.set_value("title", "a");
        obj.set_value("subtitle", "nope");
        obj.set_value("title", "b");
        assert_eq!(*seen.borrow(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn mismatched_types_are_dropped_and_stream_continues() {
        let obj = KeyValueObject::new();
        let (seen, sink) = collect::<i64>();
        let sub = obj.observe::<i64>("n").subscribe(&sink);

        obj.set_value("n", 1);
        obj.set_value("n", "text");
        obj.set_value("n", 2);
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert!(sub.is_active());
    }

    #[test]
    fn removal_reports_null() {
        let obj = KeyValueObject::new();
        let (seen, sink) = collect::<Option<bool>>();
        let _sub = obj.observe::<Option<bool>>("flag").subscribe(&sink);

        obj.set_value("flag", true);
        assert_eq!(obj.remove_value("flag"), Some(Value::Bool(true)));
        assert_eq!(obj.remove_value("flag"), None);
        assert_eq!(*seen.borrow(), vec![Some(true), None]);
    }

    #[test]
    fn null_on_absent_key_is_not_a_change() {
        let obj = KeyValueObject::new();
        let (seen, sink) = collect::<Value>();
        let _sub = obj.observe::<Value>("k").subscribe(&sink);

        assert!(!obj.set_value("k", Value::Null));
        assert!(!obj.contains_key("k"));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn cancel_removes_observer() {
        let obj = KeyValueObject::new();
        let (_seen, sink) = collect::<Value>();
        let sub = obj.observe::<Value>("k").subscribe(&sink);
        assert_eq!(obj.observer_count(), 1);
        sub.cancel();
        assert_eq!(obj.observer_count(), 0);
    }

    #[test]
    fn weak_handle_does_not_keep_object_alive() {
        let obj = KeyValueObject::new();
        let weak = obj.downgrade();
        assert!(weak.upgrade().is_some());
        drop(obj);
        assert!(weak.upgrade().is_none());
    }
}
