//! Server-Sent Events (SSE) protocol layer for hypermedia patch streams.
//!
//! This crate implements the server side of the datastar SSE protocol: the
//! server pushes typed "patch" events over a long-lived `text/event-stream`
//! response and the browser runtime applies them to the DOM and to its
//! reactive signal store.
//!
//! # Architecture
//!
//! - **Event encoder** (`message`): turns a structured patch request into the
//!   exact framed wire text. Defaults are never written to the wire.
//! - **Signal reader** (`signals`): extracts the client's current signal
//!   snapshot from a request, either from the `datastar` query parameter
//!   (GET) or from the JSON body (everything else). Malformed JSON is a
//!   failure value, never a panic.
//! - **Stream session** (`session`): wraps one outbound transport, tracks
//!   closed-ness and turns every write after close into a silent no-op.
//! - **Lifecycle manager** (`manager`): opens sessions, runs managed operation
//!   sequences and guarantees the stream is closed on every exit path.
//! - **Transport** (`transport`): the seam between a session and the HTTP
//!   response body, plus the one-shot disconnect notification.
//!
//! # Message Flow
//!
//! 1. A request handler reads the client's signals via `signals::read`
//! 2. The `Manager` opens a `StreamSession`, writing the `retry:` preamble
//! 3. The handler issues patch operations against the session
//! 4. Each operation is encoded into a frame and written to the transport
//! 5. The `Manager` closes the session, ending the response body
//!
//! # Example: streaming a patch
//!
//! ```rust,ignore
//! use sse::message::{PatchElements, PatchMode};
//!
//! let (transport, frames) = sse::transport::channel();
//! let outcome = manager
//!     .run(transport, SessionOptions::default(), |session| {
//!         Box::pin(async move {
//!             session.patch_elements(
//!                 PatchElements::new("<div>hi</div>")
//!                     .with_selector("#c")
//!                     .with_mode(PatchMode::Append),
//!             );
//!             Ok(())
//!         })
//!     })
//!     .await;
//! ```
//!
//! # Modules
//!
//! - `batch`: externally supplied operation batches (SDK conformance harness)
//! - `consts`: pinned wire-level constants
//! - `error`: crate error type and error kinds
//! - `manager`: managed and unmanaged session lifecycles
//! - `message`: patch event types and the wire encoder
//! - `session`: the per-connection stream session
//! - `signals`: inbound signal snapshots
//! - `transport`: outbound transport trait and the channel-backed transport

pub mod batch;
pub mod consts;
pub mod error;
pub mod manager;
pub mod message;
pub mod session;
pub mod signals;
pub mod transport;

pub use manager::{Manager, Outcome, SessionOptions};
pub use session::StreamSession;
