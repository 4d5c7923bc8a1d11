use std::fmt::Display;

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

mod merge_request;
mod push;

pub(crate) use merge_request::MergeRequestEvent;
pub(crate) use push::{CommitSummary, PushEvent};

use crate::constants::{MERGE_REQUEST_KIND, PUSH_KIND};

/// Result of parsing a payload for one handler.
///
/// Payloads of another kind are kept as [`Parsed::Ignored`], which every handler
/// operation treats as "nothing to do".
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Parsed<T> {
    Ignored { kind: Option<String> },
    Event(T),
}

impl<T> Parsed<T> {
    pub(crate) fn event(&self) -> Option<&T> {
        match self {
            Parsed::Event(event) => Some(event),
            Parsed::Ignored { .. } => None,
        }
    }
}

/// Kinds of webhook deliveries this service acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventKind {
    MergeRequest,
    Push,
}

impl EventKind {
    /// Merge request hooks are tagged by `object_kind`, push hooks by `event_name`.
    pub(crate) fn of(payload: &Value) -> Option<Self> {
        if object_kind(payload) == Some(MERGE_REQUEST_KIND) {
            Some(EventKind::MergeRequest)
        } else if event_name(payload) == Some(PUSH_KIND) {
            Some(EventKind::Push)
        } else {
            None
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::MergeRequest => f.write_str(MERGE_REQUEST_KIND),
            EventKind::Push => f.write_str(PUSH_KIND),
        }
    }
}

/// A webhook delivery queued for the runner.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Delivery {
    pub kind: EventKind,
    pub payload: Value,
}

pub(crate) fn object_kind(payload: &Value) -> Option<&str> {
    payload.get("object_kind").and_then(Value::as_str)
}

pub(crate) fn event_name(payload: &Value) -> Option<&str> {
    payload.get("event_name").and_then(Value::as_str)
}

/// Deserialize a payload section, falling back to an all-absent value on shape errors.
fn lenient<T: DeserializeOwned + Default>(value: &Value) -> T {
    T::deserialize(value).unwrap_or_else(|e| {
        tracing::warn!("Unexpected webhook payload shape, ignoring its fields: {e}");
        T::default()
    })
}

/// Read one top-level field leniently, so a malformed field only loses itself.
fn lenient_field<T: DeserializeOwned + Default>(payload: &Value, name: &str) -> T {
    payload.get(name).map(lenient).unwrap_or_default()
}

/// `deserialize_with` adapter for nested fields that must not poison their parent.
fn lenient_nested<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Value::deserialize(deserializer).map(|value| lenient(&value))
}
