use crate::extractors::signals::Signals;
use crate::response::managed;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use log::*;
use serde::Deserialize;
use service::AppState;
use sse::message::PatchElements;
use sse::SessionOptions;
use std::time::Duration;

pub(crate) const MESSAGE: &str = "Hello, world!";

#[derive(Debug, Default, Deserialize)]
pub struct HelloSignals {
    /// Milliseconds between two characters; the configured delay when absent.
    pub delay: Option<u64>,
}

/// GET the demo page driving the hello stream
pub async fn index(State(app_state): State<AppState>) -> impl IntoResponse {
    Html(format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <title>patchstream demo</title>
    <script type="module" src="https://cdn.jsdelivr.net/gh/starfederation/datastar@main/bundles/datastar.js"></script>
</head>
<body>
    <div data-signals-delay="{delay}">
        <label for="delay">Delay in milliseconds</label>
        <input data-bind-delay id="delay" type="number" step="100" min="0" />
        <button data-on-click="@get('/hello')">Start</button>
    </div>
    <div id="message"></div>
</body>
</html>"##,
        delay = app_state.config.hello_delay_ms,
    ))
}

/// GET stream "Hello, world!" into `#message` one character at a time
pub async fn hello(
    State(app_state): State<AppState>,
    Signals(signals): Signals<HelloSignals>,
) -> Response {
    let delay = signals
        .delay
        .map(Duration::from_millis)
        .unwrap_or_else(|| app_state.config.hello_delay());
    debug!("Streaming hello message with a {}ms delay", delay.as_millis());

    managed(
        app_state.sse_manager(),
        SessionOptions::default(),
        move |session| {
            Box::pin(async move {
                for (index, c) in MESSAGE.char_indices() {
                    if session.is_closed() {
                        debug!(
                            "Client left stream session {} after {index} characters",
                            session.id().as_str()
                        );
                        break;
                    }
                    let end = index + c.len_utf8();
                    session.patch_elements(PatchElements::new(format!(
                        "<div id=\"message\">{}</div>",
                        &MESSAGE[..end]
                    )));
                    tokio::time::sleep(delay).await;
                }
                Ok(())
            })
        },
    )
}
