//! End-to-end scenarios across the runtime sources.
//!
//! Each test drives a host-side object the way an application would and
//! checks what a recording consumer saw.

#![forbid(unsafe_code)]

use std::cell::Cell;
use std::rc::Rc;

use evbridge_core::{BridgeError, CancelBag, Completion, Publisher, Value};
use evbridge_harness::{Recorded, RecordingConsumer, TraceKind, from_jsonl};
use evbridge_runtime::{
    Control, ControlEvents, DelegateProxy, ForwardDelegate, KeyValueObject, Observable, Operation,
    PublisherExt, Selector,
};

#[test]
fn property_observation_delivers_each_new_value() {
    let counter = Observable::new(0);
    let consumer = RecordingConsumer::new();
    let _sub = counter.publisher().subscribe(&consumer);

    counter.set(5);
    counter.set(9);

    assert_eq!(consumer.values(), vec![5, 9]);
    assert!(!consumer.is_complete());
}

#[test]
fn failed_save_delivers_one_failure_and_no_values() {
    let save = Operation::<()>::new("save");
    let consumer = RecordingConsumer::new();
    let _sub = save.publisher().subscribe(&consumer);

    save.reject("disk-full");

    assert_eq!(
        consumer.events(),
        vec![Recorded::Completion(Completion::Failed(
            BridgeError::OperationFailed {
                reason: "disk-full".into()
            }
        ))]
    );
}

#[test]
fn cancelled_control_stream_ignores_later_interactions() {
    let button = Control::new("submit");
    let consumer = RecordingConsumer::new();
    let sub = button.taps().subscribe(&consumer);

    sub.cancel();
    for _ in 0..3 {
        button.tap();
    }

    assert!(consumer.is_empty());
    assert_eq!(button.target_count(), 0);
}

#[test]
fn released_consumer_is_not_called() {
    let button = Control::new("submit");
    let consumer = RecordingConsumer::new();
    let sub = button.taps().subscribe(&consumer);
    let weak = Rc::downgrade(&consumer);

    drop(consumer);
    button.tap();

    assert!(weak.upgrade().is_none());
    assert!(sub.is_cancelled());
    assert_eq!(button.target_count(), 0);
}

#[test]
fn key_path_stream_skips_mismatched_values() {
    let profile = KeyValueObject::new();
    let consumer = RecordingConsumer::new();
    let _sub = profile.observe::<String>("name").subscribe(&consumer);

    profile.set_value("name", "ada");
    profile.set_value("name", 42);
    profile.set_value("name", "grace");

    assert_eq!(consumer.values(), vec!["ada".to_string(), "grace".to_string()]);
}

struct TableDelegate {
    selections: Cell<u32>,
}

const DID_SELECT: Selector = "tableView:didSelectRowAt:";

impl ForwardDelegate for TableDelegate {
    fn responds_to(&self, selector: Selector) -> bool {
        selector == DID_SELECT
    }

    fn invoke(&self, _selector: Selector, _args: &[Value]) {
        self.selections.set(self.selections.get() + 1);
    }
}

#[test]
fn intercepted_delegate_still_reaches_original() {
    let proxy = DelegateProxy::new();
    let original = Rc::new(TableDelegate {
        selections: Cell::new(0),
    });
    proxy.set_forward_delegate(&original);

    let rows = RecordingConsumer::new();
    let _sub = proxy.method::<i64>(DID_SELECT, 1).subscribe(&rows);

    proxy.invoke(DID_SELECT, vec![Value::Null, Value::Int(3)]);
    proxy.invoke(DID_SELECT, vec![Value::Null, Value::Int(8)]);

    assert_eq!(rows.values(), vec![3, 8]);
    assert_eq!(original.selections.get(), 2);
}

#[test]
fn cancel_bag_tears_down_a_screen() {
    let field = Control::new("email");
    let enabled = Observable::new(false);
    let mut bag = CancelBag::new();

    let enabled_in = enabled.clone();
    field
        .text_changes()
        .map(|text| text.contains('@'))
        .sink(move |valid| {
            enabled_in.set(valid);
        })
        .store_in(&mut bag);

    let submissions = Rc::new(Cell::new(0));
    let submissions_in = Rc::clone(&submissions);
    let button = Control::new("submit");
    button
        .taps()
        .sink(move |()| submissions_in.set(submissions_in.get() + 1))
        .store_in(&mut bag);

    field.edit("text", "ada@", ControlEvents::EDITING_CHANGED);
    button.tap();
    assert!(enabled.get());
    assert_eq!(submissions.get(), 1);

    drop(bag);
    field.edit("text", "ada", ControlEvents::EDITING_CHANGED);
    button.tap();
    assert!(enabled.get());
    assert_eq!(submissions.get(), 1);
    assert_eq!(field.target_count(), 0);
    assert_eq!(button.target_count(), 0);
}

#[test]
fn delivery_trace_is_deterministic() {
    fn run() -> String {
        let save = Operation::<u32>::new("save");
        let consumer = RecordingConsumer::new();
        let _sub = save.publisher().subscribe(&consumer);
        save.resolve(7);
        consumer.to_jsonl("save").expect("serialize trace")
    }

    let first = run();
    assert_eq!(first, run());
    let records = from_jsonl(&first).expect("parse trace");
    let kinds: Vec<TraceKind> = records.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![TraceKind::Value, TraceKind::Finished]);
}
