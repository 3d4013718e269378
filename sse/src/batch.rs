//! Operation batches supplied by the client as signals.
//!
//! A batch looks like `{"events": [{"type": "patchElements", ...}, ...]}`.
//! Each entry names one patch operation and its options in camelCase. Entries
//! with an unknown `type`, or options that do not decode, are skipped with a
//! warning so the rest of the batch still runs.

use crate::error::{batch_error, Error};
use crate::message::{
    Event, ExecuteScript, PatchElements, PatchMode, PatchSignals, Signals, LINE_BREAKING_CHARS,
};
use crate::session::StreamSession;
use crate::signals::SignalSnapshot;
use crate::transport::Transport;
use log::*;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Batch {
    #[serde(default)]
    pub events: Vec<Value>,
}

impl Batch {
    pub fn from_snapshot(snapshot: &SignalSnapshot) -> Result<Self, Error> {
        snapshot.deserialize()
    }
}

/// One decoded batch entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Elements(PatchElements),
    Signals(PatchSignals),
    Script(ExecuteScript),
}

impl Operation {
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| batch_error("batch event has no `type`"))?;

        match kind {
            "patchElements" => {
                let entry: ElementsEntry = decode(kind, value)?;
                require_single_line(kind, "selector", entry.selector.as_deref())?;
                require_single_line(kind, "eventId", entry.event_id.as_deref())?;
                Ok(Operation::Elements(entry.into()))
            }
            "patchSignals" => {
                let entry: SignalsEntry = decode(kind, value)?;
                require_single_line(kind, "eventId", entry.event_id.as_deref())?;
                Ok(Operation::Signals(entry.into()))
            }
            "executeScript" => {
                let entry: ScriptEntry = decode(kind, value)?;
                require_single_line(kind, "eventId", entry.event_id.as_deref())?;
                Ok(Operation::Script(entry.into()))
            }
            other => Err(batch_error(&format!("unknown batch event type `{other}`"))),
        }
    }
}

impl From<Operation> for Event {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Elements(patch) => patch.into(),
            Operation::Signals(patch) => patch.into(),
            Operation::Script(script) => script.into(),
        }
    }
}

/// Sends every recognized entry of `batch`, in order, and returns how many
/// were sent. Stops early once the session is closed.
pub fn run_batch<T: Transport>(session: &mut StreamSession<T>, batch: &Batch) -> usize {
    let mut sent = 0;
    for (index, value) in batch.events.iter().enumerate() {
        if session.is_closed() {
            debug!(
                "Stream session {} closed, abandoning batch at event {index}",
                session.id().as_str()
            );
            break;
        }
        match Operation::from_value(value) {
            Ok(operation) => {
                session.send(operation);
                sent += 1;
            }
            Err(e) => warn!("Skipping batch event {index}: {e}"),
        }
    }
    sent
}

fn decode<'de, S: Deserialize<'de>>(kind: &str, value: &'de Value) -> Result<S, Error> {
    S::deserialize(value).map_err(|e| batch_error(&format!("invalid `{kind}` event: {e}")))
}

fn require_single_line(kind: &str, field: &str, value: Option<&str>) -> Result<(), Error> {
    match value {
        Some(value) if value.contains(LINE_BREAKING_CHARS) => Err(batch_error(&format!(
            "invalid `{kind}` event: `{field}` contains a line break"
        ))),
        _ => Ok(()),
    }
}

fn retry(millis: Option<u64>) -> Option<Duration> {
    millis.map(Duration::from_millis)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ElementsEntry {
    #[serde(default)]
    elements: String,
    selector: Option<String>,
    #[serde(default)]
    mode: PatchMode,
    #[serde(default)]
    use_view_transition: bool,
    event_id: Option<String>,
    retry_duration: Option<u64>,
}

impl From<ElementsEntry> for PatchElements {
    fn from(entry: ElementsEntry) -> Self {
        PatchElements {
            elements: entry.elements,
            selector: entry.selector,
            mode: entry.mode,
            use_view_transition: entry.use_view_transition,
            event_id: entry.event_id,
            retry: retry(entry.retry_duration),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalsEntry {
    signals: Option<Map<String, Value>>,
    #[serde(rename = "signals-raw")]
    signals_raw: Option<String>,
    #[serde(default)]
    only_if_missing: bool,
    event_id: Option<String>,
    retry_duration: Option<u64>,
}

impl From<SignalsEntry> for PatchSignals {
    fn from(entry: SignalsEntry) -> Self {
        let signals = match (entry.signals_raw, entry.signals) {
            (Some(raw), _) => Signals::Raw(raw),
            (None, Some(map)) => Signals::Map(map),
            (None, None) => Signals::Map(Map::new()),
        };
        PatchSignals {
            signals,
            only_if_missing: entry.only_if_missing,
            event_id: entry.event_id,
            retry: retry(entry.retry_duration),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptEntry {
    #[serde(default)]
    script: String,
    auto_remove: Option<bool>,
    #[serde(default)]
    attributes: Map<String, Value>,
    event_id: Option<String>,
    retry_duration: Option<u64>,
}

impl From<ScriptEntry> for ExecuteScript {
    fn from(entry: ScriptEntry) -> Self {
        let mut script =
            ExecuteScript::new(entry.script).with_auto_remove(entry.auto_remove.unwrap_or(true));
        for (key, value) in entry.attributes {
            let value = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            script = script.with_attribute(key, value);
        }
        script.event_id = entry.event_id;
        script.retry = retry(entry.retry_duration);
        script
    }
}
