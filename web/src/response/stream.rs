//! Event-stream responses backed by stream sessions.
//!
//! Both helpers answer immediately with the `text/event-stream` preamble
//! headers and feed the body from a channel transport. Dropping the body,
//! which is what axum does when the client goes away, closes the session.

use axum::{
    body::Body,
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use log::*;
use sse::consts::{EVENT_STREAM_CACHE_CONTROL, EVENT_STREAM_CONTENT_TYPE};
use sse::error::Error as SseError;
use sse::manager::Unmanaged;
use sse::transport::{self, ChannelTransport, Disconnected, FrameReceiver};
use sse::{Manager, Outcome, SessionOptions, StreamSession};
use tokio::task::JoinHandle;

/// A session whose lifecycle is owned by the response.
pub type Session = StreamSession<ChannelTransport>;

/// Streams the patches issued by `ops` and closes the session once `ops`
/// returns, fails or panics.
pub fn managed<F>(manager: &Manager, options: SessionOptions, ops: F) -> Response
where
    F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<(), SseError>> + Send + 'static,
{
    let (response, outcome) = managed_with_outcome(manager, options, ops);
    tokio::spawn(async move {
        match outcome.await {
            Ok(Outcome::KeptAlive { mut session, .. }) => {
                warn!(
                    "Stream session {} was kept alive but nobody claimed it, closing",
                    session.id().as_str()
                );
                session.close();
            }
            Ok(_) => {}
            Err(e) => error!("Managed stream task failed to complete: {e}"),
        }
    });
    response
}

/// Like [`managed`], also handing back the [`Outcome`] so keep-alive callers
/// can take the still-open session.
pub fn managed_with_outcome<F>(
    manager: &Manager,
    options: SessionOptions,
    ops: F,
) -> (Response, JoinHandle<Outcome<ChannelTransport>>)
where
    F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<(), SseError>> + Send + 'static,
{
    let (transport, frames) = transport::channel();
    let manager = manager.clone();
    let outcome = tokio::spawn(async move { manager.run(transport, options, ops).await });
    (event_stream(frames), outcome)
}

/// Opens a session the caller drives and must close, together with its
/// disconnect notification and the response to return.
pub fn unmanaged(manager: &Manager) -> (Session, Disconnected, Response) {
    let (transport, frames) = transport::channel();
    let Unmanaged {
        session,
        disconnected,
    } = manager.open_unmanaged(transport);
    (session, disconnected, event_stream(frames))
}

fn event_stream(frames: FrameReceiver) -> Response {
    (
        [
            (CONTENT_TYPE, EVENT_STREAM_CONTENT_TYPE),
            (CACHE_CONTROL, EVENT_STREAM_CACHE_CONTROL),
        ],
        Body::from_stream(frames.into_stream()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sse::message::PatchElements;

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_managed_response_has_event_stream_headers() {
        let response = managed(&Manager::new(), SessionOptions::default(), |session| {
            Box::pin(async move {
                session.patch_elements(PatchElements::new("<p id=\"a\">a</p>"));
                Ok(())
            })
        });

        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            EVENT_STREAM_CONTENT_TYPE
        );
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            EVENT_STREAM_CACHE_CONTROL
        );
        assert_eq!(
            body_text(response).await,
            "retry: 1000\n\nevent: datastar-patch-elements\ndata: elements <p id=\"a\">a</p>\n\n"
        );
    }

    #[tokio::test]
    async fn test_kept_alive_session_keeps_streaming() {
        let (response, outcome) =
            managed_with_outcome(&Manager::new(), SessionOptions::keep_alive(), |session| {
                Box::pin(async move {
                    session.console_log("first");
                    Ok(())
                })
            });

        let mut session = outcome.await.unwrap().into_session().unwrap();
        session.console_log("second");
        session.close();

        let body = body_text(response).await;
        assert!(body.contains("console.log(\"first\")"));
        assert!(body.contains("console.log(\"second\")"));
    }

    #[tokio::test]
    async fn test_unmanaged_session_ends_body_on_close() {
        let (mut session, _disconnected, response) = unmanaged(&Manager::new());
        session.remove_elements("#gone");
        session.close();

        assert_eq!(
            body_text(response).await,
            "retry: 1000\n\nevent: datastar-patch-elements\ndata: mode remove\ndata: selector #gone\n\n"
        );
    }
}
