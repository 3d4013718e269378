use crate::message::{self, Event, ExecuteScript, PatchElements, PatchSignals};
use crate::transport::Transport;
use log::*;
use std::time::Duration;

/// Unique identifier for a stream session (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// One live streamed response.
///
/// A session is `open` from creation until [`close`](Self::close) is called or
/// the transport reports that the client went away; `closed` is terminal.
/// Every patch operation on a closed session is a silent no-op: nothing is
/// encoded, nothing is written and no error is raised.
///
/// Sessions assume a single writer and provide no internal locking.
#[derive(Debug)]
pub struct StreamSession<T: Transport> {
    id: SessionId,
    transport: T,
    closed: bool,
    released: bool,
}

impl<T: Transport> StreamSession<T> {
    /// Opens a session over `transport`, writing the `retry:` preamble.
    pub fn open(transport: T, default_retry: Duration) -> Self {
        let mut session = Self {
            id: SessionId::new(),
            transport,
            closed: false,
            released: false,
        };
        session.write(&message::preamble(default_retry));
        debug!("Opened stream session {}", session.id.as_str());
        session
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Multi-step producers should check this before each step and stop early.
    pub fn is_closed(&self) -> bool {
        self.closed || self.transport.is_closed()
    }

    /// Encodes and writes one event, in call order.
    pub fn send(&mut self, event: impl Into<Event>) {
        if self.observe_closed() {
            trace!(
                "Dropping event for closed stream session {}",
                self.id.as_str()
            );
            return;
        }
        let frame = event.into().encode();
        self.write(&frame);
    }

    pub fn patch_elements(&mut self, patch: PatchElements) {
        self.send(patch);
    }

    pub fn patch_signals(&mut self, patch: PatchSignals) {
        self.send(patch);
    }

    pub fn execute_script(&mut self, script: ExecuteScript) {
        self.send(script);
    }

    pub fn remove_elements(&mut self, selector: &str) {
        self.send(PatchElements::remove(selector));
    }

    pub fn redirect(&mut self, url: &str) {
        self.send(ExecuteScript::redirect(url));
    }

    pub fn replace_url(&mut self, url: &str) {
        self.send(ExecuteScript::replace_url(url));
    }

    pub fn console_log(&mut self, message: &str) {
        self.send(ExecuteScript::console_log(message));
    }

    pub fn console_error(&mut self, message: &str) {
        self.send(ExecuteScript::console_error(message));
    }

    /// Closes the session. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.released {
            trace!("Stream session {} already closed", self.id.as_str());
            return;
        }
        self.closed = true;
        self.released = true;
        self.transport.close();
        debug!("Closed stream session {}", self.id.as_str());
    }

    fn observe_closed(&mut self) -> bool {
        if !self.closed && self.transport.is_closed() {
            debug!(
                "Stream session {} transport closed by peer",
                self.id.as_str()
            );
            self.closed = true;
        }
        self.closed
    }

    fn write(&mut self, frame: &str) {
        if let Err(e) = self.transport.write_frame(frame) {
            // A client disconnecting mid-stream is expected; drop the frame.
            debug!(
                "Stream session {} write failed, marking closed: {e}",
                self.id.as_str()
            );
            self.closed = true;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{transport_error, Error, TransportErrorKind};
    use crate::message::PatchMode;
    use crate::transport::{channel, Transport};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// In-memory transport that records every side effect.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingTransport {
        pub(crate) frames: Arc<Mutex<Vec<String>>>,
        pub(crate) closes: Arc<Mutex<usize>>,
        pub(crate) peer_gone: Arc<Mutex<bool>>,
    }

    impl RecordingTransport {
        pub(crate) fn written(&self) -> String {
            self.frames.lock().unwrap().concat()
        }

        pub(crate) fn close_count(&self) -> usize {
            *self.closes.lock().unwrap()
        }
    }

    impl Transport for RecordingTransport {
        fn write_frame(&mut self, frame: &str) -> Result<(), Error> {
            if self.is_closed() {
                return Err(transport_error(TransportErrorKind::Closed, "closed"));
            }
            self.frames.lock().unwrap().push(frame.to_owned());
            Ok(())
        }

        fn close(&mut self) {
            *self.closes.lock().unwrap() += 1;
        }

        fn is_closed(&self) -> bool {
            *self.closes.lock().unwrap() > 0 || *self.peer_gone.lock().unwrap()
        }
    }

    fn open() -> (StreamSession<RecordingTransport>, RecordingTransport) {
        let transport = RecordingTransport::default();
        let session = StreamSession::open(transport.clone(), Duration::from_millis(1000));
        (session, transport)
    }

    #[test]
    fn test_open_writes_preamble() {
        let (session, transport) = open();
        assert!(!session.is_closed());
        assert_eq!(transport.written(), "retry: 1000\n\n");
    }

    #[test]
    fn test_events_are_written_in_call_order() {
        let (mut session, transport) = open();

        session.patch_elements(PatchElements::new("<div id=\"a\"></div>"));
        session.patch_signals(PatchSignals::new(json!({"count": 1})));
        session.remove_elements("#a");

        assert_eq!(
            transport.written(),
            "retry: 1000\n\n\
             event: datastar-patch-elements\ndata: elements <div id=\"a\"></div>\n\n\
             event: datastar-patch-signals\ndata: signals {\"count\":1}\n\n\
             event: datastar-patch-elements\ndata: mode remove\ndata: selector #a\n\n"
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut session, transport) = open();

        session.close();
        session.close();

        assert!(session.is_closed());
        assert_eq!(transport.close_count(), 1);
    }

    #[test]
    fn test_writes_after_close_are_silent_noops() {
        let (mut session, transport) = open();
        session.close();
        let before = transport.written();

        session.patch_elements(PatchElements::new("<p>late</p>").with_mode(PatchMode::Append));
        session.patch_signals(PatchSignals::new("{}"));
        session.console_log("late");
        session.redirect("/elsewhere");

        assert_eq!(transport.written(), before);
    }

    #[test]
    fn test_peer_disconnect_closes_session() {
        let (mut session, transport) = open();
        *transport.peer_gone.lock().unwrap() = true;

        assert!(session.is_closed());
        session.patch_elements(PatchElements::new("<p>unseen</p>"));
        assert_eq!(transport.written(), "retry: 1000\n\n");

        session.close();
        assert_eq!(transport.close_count(), 1);
        session.close();
        assert_eq!(transport.close_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_receiver_turns_writes_into_noops() {
        let (transport, frames) = channel();
        let mut session = StreamSession::open(transport, Duration::from_millis(500));
        drop(frames);

        session.console_error("client is gone");
        assert!(session.is_closed());
        session.close();
    }

    #[test]
    fn test_convenience_operations_route_through_patch_elements() {
        let (mut session, transport) = open();

        session.replace_url("/next");
        session.console_error("boom");

        let written = transport.written();
        assert_eq!(written.matches("event: datastar-patch-elements").count(), 2);
        assert!(written.contains(
            "data: elements <script data-effect=\"el.remove()\">window.history.replaceState({}, \"\", \"/next\")</script>"
        ));
        assert!(written.contains("console.error(\"boom\")"));
    }

    #[test]
    fn test_session_ids_are_unique() {
        let (first, _) = open();
        let (second, _) = open();
        assert_ne!(first.id(), second.id());
    }
}
