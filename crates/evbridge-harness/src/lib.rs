#![forbid(unsafe_code)]

//! Test tooling for evbridge streams.
//!
//! - [`RecordingConsumer`]: remembers every value and completion in order.
//! - [`ManualSource`]: an [`EventSource`](evbridge_core::EventSource) raised
//!   by hand that counts register/unregister calls.
//! - [`trace`]: JSONL export of recorded deliveries and adapter counters.

pub mod manual_source;
pub mod recording;
pub mod trace;

pub use manual_source::ManualSource;
pub use recording::{Recorded, RecordingConsumer};
pub use trace::{TraceKind, TraceRecord, from_jsonl, stats_json, to_jsonl};
