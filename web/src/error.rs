use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use log::*;
use sse::error::{Error as SseError, ErrorKind};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(SseError);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.0.error_kind
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.0)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.0)
    }
}

// Client mistakes carry their message back; everything else stays opaque.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = self.0.message().unwrap_or_default();
        match &self.0.error_kind {
            ErrorKind::Signals(kind) => {
                debug!("Rejecting request with unreadable signals ({kind:?}): {message}");
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            ErrorKind::Batch => (StatusCode::BAD_REQUEST, message).into_response(),
            ErrorKind::Encode | ErrorKind::Transport(_) | ErrorKind::Operation => {
                error!("Request failed: {}", self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
            }
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<SseError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sse::error::{batch_error, signals_error, SignalsErrorKind};

    #[test]
    fn test_signals_errors_are_bad_requests_with_message() {
        let response =
            Error::from(signals_error(SignalsErrorKind::MalformedJson, "expected value")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_batch_errors_are_bad_requests() {
        let response = Error::from(batch_error("unknown batch event type")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_operation_errors_are_internal() {
        let response = Error::from(SseError::operation("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
