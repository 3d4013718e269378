use crate::consts::*;
use crate::error::Error;
use log::*;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Trait for getting the wire event kind of a patch
pub trait EventType {
    fn event_type(&self) -> EventKind;
}

/// The two event kinds this protocol version puts on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PatchElements,
    PatchSignals,
}

impl EventKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::PatchElements => PATCH_ELEMENTS_EVENT,
            EventKind::PatchSignals => PATCH_SIGNALS_EVENT,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mode in which elements are patched into the DOM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchMode {
    /// Morph the entire element, preserving state
    #[default]
    Outer,
    /// Morph inner HTML only, preserving state
    Inner,
    /// Replace the entire element, resetting state
    Replace,
    /// Insert at the beginning inside the target
    Prepend,
    /// Insert at the end inside the target
    Append,
    /// Insert before the target element
    Before,
    /// Insert after the target element
    After,
    /// Remove the target element from the DOM
    Remove,
}

impl PatchMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PatchMode::Outer => "outer",
            PatchMode::Inner => "inner",
            PatchMode::Replace => "replace",
            PatchMode::Prepend => "prepend",
            PatchMode::Append => "append",
            PatchMode::Before => "before",
            PatchMode::After => "after",
            PatchMode::Remove => "remove",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct PatchModeParseError;

impl fmt::Display for PatchModeParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown patch mode")
    }
}

impl std::error::Error for PatchModeParseError {}

impl FromStr for PatchMode {
    type Err = PatchModeParseError;
    fn from_str(mode: &str) -> Result<PatchMode, Self::Err> {
        match mode.to_lowercase().as_str() {
            "outer" => Ok(PatchMode::Outer),
            "inner" => Ok(PatchMode::Inner),
            "replace" => Ok(PatchMode::Replace),
            "prepend" => Ok(PatchMode::Prepend),
            "append" => Ok(PatchMode::Append),
            "before" => Ok(PatchMode::Before),
            "after" => Ok(PatchMode::After),
            "remove" => Ok(PatchMode::Remove),
            _ => Err(PatchModeParseError),
        }
    }
}

impl<'de> Deserialize<'de> for PatchMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mode = String::deserialize(deserializer)?;
        mode.parse()
            .map_err(|_| de::Error::custom(format!("unknown patch mode `{mode}`")))
    }
}

impl fmt::Display for PatchMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Patches HTML elements into the DOM.
///
/// Every option defaults to the value the client assumes when the option is
/// absent, so defaults are never written to the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchElements {
    /// HTML to patch, possibly multi-line, possibly empty.
    pub elements: String,
    /// CSS selector of the patch target. Without one the client matches on element ids.
    /// Line breaks and NUL are dropped when encoding.
    pub selector: Option<String>,
    pub mode: PatchMode,
    pub use_view_transition: bool,
    pub event_id: Option<String>,
    /// Reconnect delay for this event. A zero duration is treated as unset.
    pub retry: Option<Duration>,
}

impl PatchElements {
    pub fn new(elements: impl Into<String>) -> Self {
        Self {
            elements: elements.into(),
            ..Default::default()
        }
    }

    /// Removes the elements matched by `selector`.
    pub fn remove(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            mode: PatchMode::Remove,
            ..Default::default()
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_mode(mut self, mode: PatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_use_view_transition(mut self, use_view_transition: bool) -> Self {
        self.use_view_transition = use_view_transition;
        self
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn encode_into(&self, buf: &mut String) {
        write_header(
            buf,
            EventKind::PatchElements,
            self.event_id.as_deref(),
            self.retry,
        );

        if self.mode != PatchMode::default() {
            write_data(buf, MODE_DATALINE, self.mode.as_str());
        }
        if let Some(selector) = &self.selector {
            write_data(buf, SELECTOR_DATALINE, &single_line(selector));
        }
        if self.use_view_transition {
            write_data(buf, USE_VIEW_TRANSITION_DATALINE, "true");
        }
        for line in logical_lines(&self.elements) {
            write_data(buf, ELEMENTS_DATALINE, line);
        }

        buf.push('\n');
    }
}

impl EventType for PatchElements {
    fn event_type(&self) -> EventKind {
        EventKind::PatchElements
    }
}

/// Signals payload of a [`PatchSignals`] event.
#[derive(Debug, Clone, PartialEq)]
pub enum Signals {
    /// Pre-formatted text passed to the client verbatim.
    Raw(String),
    /// Serialized compactly, keys in insertion order.
    Map(Map<String, Value>),
}

impl Signals {
    fn payload(&self) -> Cow<'_, str> {
        match self {
            Signals::Raw(raw) => Cow::Borrowed(raw.as_str()),
            Signals::Map(map) => match serde_json::to_string(map) {
                Ok(json) => Cow::Owned(json),
                Err(e) => {
                    error!("Failed to serialize signals map: {e}");
                    Cow::Borrowed("{}")
                }
            },
        }
    }
}

impl From<Map<String, Value>> for Signals {
    fn from(map: Map<String, Value>) -> Self {
        Signals::Map(map)
    }
}

impl From<Value> for Signals {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Signals::Map(map),
            other => Signals::Raw(other.to_string()),
        }
    }
}

impl From<String> for Signals {
    fn from(raw: String) -> Self {
        Signals::Raw(raw)
    }
}

impl From<&str> for Signals {
    fn from(raw: &str) -> Self {
        Signals::Raw(raw.to_owned())
    }
}

/// Patches signals into the client's signal store.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchSignals {
    pub signals: Signals,
    /// Only set signals that do not exist yet on the client.
    pub only_if_missing: bool,
    pub event_id: Option<String>,
    /// Reconnect delay for this event. A zero duration is treated as unset.
    pub retry: Option<Duration>,
}

impl PatchSignals {
    pub fn new(signals: impl Into<Signals>) -> Self {
        Self {
            signals: signals.into(),
            only_if_missing: false,
            event_id: None,
            retry: None,
        }
    }

    /// Serializes any typed value into a compact signals payload.
    pub fn from_serialize<T: Serialize + ?Sized>(signals: &T) -> Result<Self, Error> {
        Ok(Self::new(Signals::Raw(serde_json::to_string(signals)?)))
    }

    pub fn with_only_if_missing(mut self, only_if_missing: bool) -> Self {
        self.only_if_missing = only_if_missing;
        self
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn encode_into(&self, buf: &mut String) {
        write_header(
            buf,
            EventKind::PatchSignals,
            self.event_id.as_deref(),
            self.retry,
        );

        if self.only_if_missing {
            write_data(buf, ONLY_IF_MISSING_DATALINE, "true");
        }

        // A pre-formatted payload may span lines; each becomes its own data line.
        let payload = self.signals.payload();
        let lines = logical_lines(&payload);
        if lines.is_empty() {
            write_data(buf, SIGNALS_DATALINE, "");
        }
        for line in lines {
            write_data(buf, SIGNALS_DATALINE, line);
        }

        buf.push('\n');
    }
}

impl EventType for PatchSignals {
    fn event_type(&self) -> EventKind {
        EventKind::PatchSignals
    }
}

/// Runs a script on the client.
///
/// There is no script event on the wire: this is sugar for a [`PatchElements`]
/// appending a `<script>` tag to the document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteScript {
    pub script: String,
    /// Whether the client removes the tag after execution. Defaults to `true`.
    pub auto_remove: bool,
    /// Extra `<script>` attributes, written verbatim in order.
    /// An empty value renders a boolean attribute.
    pub attributes: Vec<(String, String)>,
    pub event_id: Option<String>,
    pub retry: Option<Duration>,
}

impl ExecuteScript {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            auto_remove: true,
            attributes: Vec::new(),
            event_id: None,
            retry: None,
        }
    }

    /// Navigates the client to `url`.
    pub fn redirect(url: &str) -> Self {
        Self::new(format!(
            "setTimeout(() => window.location.href = \"{}\")",
            escape_js_string(url)
        ))
    }

    /// Replaces the client's current URL without navigating.
    pub fn replace_url(url: &str) -> Self {
        Self::new(format!(
            "window.history.replaceState({{}}, \"\", \"{}\")",
            escape_js_string(url)
        ))
    }

    pub fn console_log(message: &str) -> Self {
        Self::new(format!("console.log(\"{}\")", escape_js_string(message)))
    }

    pub fn console_error(message: &str) -> Self {
        Self::new(format!("console.error(\"{}\")", escape_js_string(message)))
    }

    pub fn with_auto_remove(mut self, auto_remove: bool) -> Self {
        self.auto_remove = auto_remove;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn into_patch_elements(self) -> PatchElements {
        let mut tag = String::from("<script");
        for (key, value) in &self.attributes {
            tag.push(' ');
            tag.push_str(key);
            if !value.is_empty() {
                tag.push_str("=\"");
                tag.push_str(value);
                tag.push('"');
            }
        }
        if self.auto_remove {
            tag.push(' ');
            tag.push_str(AUTO_REMOVE_ATTRIBUTE);
        }
        tag.push('>');
        tag.push_str(&self.script);
        tag.push_str("</script>");

        PatchElements {
            elements: tag,
            selector: Some(SCRIPT_SELECTOR.to_owned()),
            mode: PatchMode::Append,
            use_view_transition: false,
            event_id: self.event_id,
            retry: self.retry,
        }
    }
}

impl EventType for ExecuteScript {
    fn event_type(&self) -> EventKind {
        EventKind::PatchElements
    }
}

/// A complete outbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PatchElements(PatchElements),
    PatchSignals(PatchSignals),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.event_type()
    }

    pub fn encode(&self) -> String {
        let mut buf = String::new();
        self.encode_into(&mut buf);
        buf
    }

    pub fn encode_into(&self, buf: &mut String) {
        match self {
            Event::PatchElements(patch) => patch.encode_into(buf),
            Event::PatchSignals(patch) => patch.encode_into(buf),
        }
    }
}

impl EventType for Event {
    fn event_type(&self) -> EventKind {
        match self {
            Event::PatchElements(_) => EventKind::PatchElements,
            Event::PatchSignals(_) => EventKind::PatchSignals,
        }
    }
}

impl From<PatchElements> for Event {
    fn from(patch: PatchElements) -> Self {
        Event::PatchElements(patch)
    }
}

impl From<PatchSignals> for Event {
    fn from(patch: PatchSignals) -> Self {
        Event::PatchSignals(patch)
    }
}

impl From<ExecuteScript> for Event {
    fn from(script: ExecuteScript) -> Self {
        Event::PatchElements(script.into_patch_elements())
    }
}

/// The frame written once when a session opens.
pub fn preamble(retry: Duration) -> String {
    format!("retry: {}\n\n", retry.as_millis())
}

fn write_header(buf: &mut String, kind: EventKind, event_id: Option<&str>, retry: Option<Duration>) {
    write_field(buf, "event", kind.as_str());
    if let Some(event_id) = event_id {
        write_field(buf, "id", &single_line(event_id));
    }
    if let Some(retry) = retry.filter(|retry| !retry.is_zero()) {
        write_field(buf, "retry", &retry.as_millis().to_string());
    }
}

fn write_field(buf: &mut String, field: &str, value: &str) {
    buf.push_str(field);
    buf.push_str(": ");
    buf.push_str(value);
    buf.push('\n');
}

fn write_data(buf: &mut String, key: &str, value: &str) {
    buf.push_str("data: ");
    buf.push_str(key);
    buf.push(' ');
    buf.push_str(value);
    buf.push('\n');
}

/// Characters that would end a line or the frame inside a one-line field.
pub const LINE_BREAKING_CHARS: [char; 3] = ['\n', '\r', '\0'];

/// Drops [`LINE_BREAKING_CHARS`] so `id:` and `selector` always stay on one line.
fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(LINE_BREAKING_CHARS) {
        Cow::Owned(value.replace(LINE_BREAKING_CHARS, ""))
    } else {
        Cow::Borrowed(value)
    }
}

/// Splits on `\r\n`, `\n` or a lone `\r`, the three line terminators of the
/// event-stream format. Empty lines are kept, but a trailing terminator does
/// not start a new line: `"<p>x</p>\n"` is one line, and empty text is none.
fn logical_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        match rest.find(|c: char| c == '\r' || c == '\n') {
            Some(idx) => {
                lines.push(&rest[..idx]);
                let terminator = if rest[idx..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[idx + terminator..];
            }
            None => {
                lines.push(rest);
                break;
            }
        }
    }
    lines
}

fn escape_js_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}
