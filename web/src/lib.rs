//! HTTP integration for patch streams.
//!
//! Exposes the demo and conformance routes over axum and adapts the `sse`
//! crate's sessions to streamed `text/event-stream` responses.
//!
//! # Modules
//!
//! - `controller`: route handlers
//! - `extractors`: `ReadSignals`, `Signals<T>` and `DatastarRequest`
//! - `response`: managed and unmanaged event-stream responses
//! - `router`: route table

use axum::http::{
    header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use log::*;
use service::AppState;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

mod controller;
mod error;
mod extractors;
pub mod response;
pub mod router;

pub use error::{Error, Result};

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let server_url = format!(
        "{}:{}",
        app_state.config.interface(),
        app_state.config.port
    );
    let listener = TcpListener::bind(&server_url).await?;

    let cors = cors_layer(&app_state.config.allowed_origins);

    info!("Server starting... listening for connections on http://{server_url}");

    axum::serve(listener, router::define_routes(app_state).layer(cors)).await
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = parse_origins(allowed_origins);
    debug!("CORS allowed origins: {origins:?}");

    CorsLayer::new()
        .allow_methods([
            Method::DELETE,
            Method::GET,
            Method::PATCH,
            Method::POST,
            Method::PUT,
        ])
        .allow_credentials(true)
        .allow_headers([
            ACCEPT,
            CACHE_CONTROL,
            CONTENT_TYPE,
            HeaderName::from_static(sse::consts::DATASTAR_REQUEST_HEADER),
        ])
        .allow_origin(origins)
        .max_age(Duration::from_secs(60 * 60))
}

/// Origins that are not valid header values are skipped with a warning.
fn parse_origins(allowed_origins: &[String]) -> Vec<HeaderValue> {
    allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin}: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins_skips_invalid_origins() {
        let origins = parse_origins(&[
            "http://localhost:3000".to_owned(),
            "not\na header".to_owned(),
            "https://example.com".to_owned(),
        ]);

        assert_eq!(
            origins,
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("https://example.com"),
            ]
        );
    }

    #[test]
    fn test_parse_origins_with_nothing_valid_is_empty() {
        assert!(parse_origins(&["bad\rorigin".to_owned()]).is_empty());
        assert!(parse_origins(&[]).is_empty());
    }
}
