use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// Whether the request was issued by the browser runtime, i.e. it carries
/// the `datastar-request: true` marker header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatastarRequest(pub bool);

impl<S> FromRequestParts<S> for DatastarRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(DatastarRequest(sse::signals::is_datastar_request(
            &parts.headers,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> DatastarRequest {
        let (mut parts, _) = request.into_parts();
        DatastarRequest::from_request_parts(&mut parts, &())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_marker_header_must_be_exactly_true() {
        let marked = Request::builder()
            .header("datastar-request", "true")
            .body(())
            .unwrap();
        assert_eq!(extract(marked).await, DatastarRequest(true));

        let plain = Request::builder().body(()).unwrap();
        assert_eq!(extract(plain).await, DatastarRequest(false));

        let wrong = Request::builder()
            .header("datastar-request", "yes")
            .body(())
            .unwrap();
        assert_eq!(extract(wrong).await, DatastarRequest(false));
    }
}
