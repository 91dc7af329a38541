#![forbid(unsafe_code)]

//! JSONL export of recorded deliveries.
//!
//! Each line is one delivery:
//!
//! ```text
//! {"seq":0,"stream":"kvo","kind":"value","value":5}
//! {"seq":1,"stream":"save","kind":"failed","error":"operation failed: disk-full"}
//! ```
//!
//! Traces are plain test artifacts. Two runs of the same scenario must
//! produce identical traces.

use evbridge_core::{AdapterStats, Completion};
use serde::{Deserialize, Serialize};

use crate::recording::{Recorded, RecordingConsumer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Value,
    Finished,
    Failed,
}

/// One line of a delivery trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub seq: u64,
    pub stream: String,
    pub kind: TraceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> RecordingConsumer<T> {
    /// Convert everything recorded so far into trace records.
    pub fn to_trace(&self, stream: &str) -> serde_json::Result<Vec<TraceRecord>> {
        self.with_events(|events| {
            events
                .iter()
                .zip(0u64..)
                .map(|(event, seq)| record(stream, seq, event))
                .collect()
        })
    }

    /// Recorded deliveries as JSONL.
    pub fn to_jsonl(&self, stream: &str) -> serde_json::Result<String> {
        to_jsonl(&self.to_trace(stream)?)
    }
}

fn record<T: Serialize>(
    stream: &str,
    seq: u64,
    event: &Recorded<T>,
) -> serde_json::Result<TraceRecord> {
    let (kind, value, error) = match event {
        Recorded::Value(v) => (TraceKind::Value, Some(serde_json::to_value(v)?), None),
        Recorded::Completion(Completion::Finished) => (TraceKind::Finished, None, None),
        Recorded::Completion(Completion::Failed(e)) => {
            (TraceKind::Failed, None, Some(e.to_string()))
        }
    };
    Ok(TraceRecord {
        seq,
        stream: stream.to_string(),
        kind,
        value,
        error,
    })
}

pub fn to_jsonl(records: &[TraceRecord]) -> serde_json::Result<String> {
    let mut out = String::new();
    for rec in records {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&serde_json::to_string(rec)?);
    }
    Ok(out)
}

pub fn from_jsonl(jsonl: &str) -> serde_json::Result<Vec<TraceRecord>> {
    jsonl
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}

/// Adapter counters as one JSON object, for appending to a trace file.
#[must_use]
pub fn stats_json(stream: &str, stats: &AdapterStats) -> serde_json::Value {
    serde_json::json!({
        "stream": stream,
        "registrations": stats.registrations,
        "unregistrations": stats.unregistrations,
        "delivered": stats.delivered,
        "completions": stats.completions,
        "dropped_failures": stats.dropped_failures,
        "dropped_consumer_gone": stats.dropped_consumer_gone,
        "dropped_after_cancel": stats.dropped_after_cancel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use evbridge_core::{BridgeError, Consumer};

    #[test]
    fn jsonl_lines_parse_back() {
        let rec = RecordingConsumer::<i64>::new();
        let _ = rec.receive_value(5);
        let _ = rec.receive_value(9);
        rec.receive_completion(Completion::Failed(BridgeError::operation("disk-full")));

        let jsonl = rec.to_jsonl("kvo").expect("serialize");
        assert_eq!(jsonl.lines().count(), 3);
        for line in jsonl.lines() {
            let parsed: serde_json::Value =
                serde_json::from_str(line).expect("each JSONL line must be valid JSON");
            assert_eq!(parsed["stream"], "kvo");
        }

        let back = from_jsonl(&jsonl).expect("parse");
        assert_eq!(back[1].value, Some(serde_json::json!(9)));
        assert_eq!(back[2].kind, TraceKind::Failed);
        assert_eq!(back[2].error.as_deref(), Some("operation failed: disk-full"));
    }

    #[test]
    fn finished_has_no_payload() {
        let rec = RecordingConsumer::<()>::new();
        rec.receive_completion(Completion::Finished);
        let jsonl = rec.to_jsonl("op").expect("serialize");
        assert_eq!(jsonl, r#"{"seq":0,"stream":"op","kind":"finished"}"#);
    }

    #[test]
    fn stats_object_fields() {
        let stats = AdapterStats {
            registrations: 2,
            unregistrations: 1,
            ..AdapterStats::default()
        };
        let json = stats_json("s", &stats);
        assert_eq!(json["registrations"], 2);
        assert_eq!(json["dropped_failures"], 0);
    }
}
