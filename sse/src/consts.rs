//! Wire-level constants shared by every SDK speaking this protocol version.

/// Event name for DOM patches.
pub const PATCH_ELEMENTS_EVENT: &str = "datastar-patch-elements";

/// Event name for signal store patches.
pub const PATCH_SIGNALS_EVENT: &str = "datastar-patch-signals";

/// Reconnect delay written in the preamble of every session.
pub const DEFAULT_RETRY_MS: u64 = 1000;

/// Header the browser runtime sets on every request it issues.
pub const DATASTAR_REQUEST_HEADER: &str = "datastar-request";

/// Signals are carried in this query parameter on GET requests.
pub const DATASTAR_QUERY_PARAM: &str = "datastar";

pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
pub const EVENT_STREAM_CACHE_CONTROL: &str = "no-cache";

// Keys used inside `data:` lines
pub const SELECTOR_DATALINE: &str = "selector";
pub const MODE_DATALINE: &str = "mode";
pub const USE_VIEW_TRANSITION_DATALINE: &str = "useViewTransition";
pub const ELEMENTS_DATALINE: &str = "elements";
pub const SIGNALS_DATALINE: &str = "signals";
pub const ONLY_IF_MISSING_DATALINE: &str = "onlyIfMissing";

/// Scripts are always appended to the document body.
pub const SCRIPT_SELECTOR: &str = "body";

/// Makes the client discard a script tag once it has executed.
pub const AUTO_REMOVE_ATTRIBUTE: &str = r#"data-effect="el.remove()""#;
