use crate::error::Error;
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::Method,
};
use log::*;
use serde::de::DeserializeOwned;
use sse::error::SignalsErrorKind;
use sse::signals::{self, RequestBody, SignalSnapshot};
use std::convert::Infallible;

/// The client's signal snapshot. Never rejects: a malformed snapshot is
/// handed to the handler as a failed [`SignalSnapshot`].
#[derive(Debug, Clone)]
pub struct ReadSignals(pub SignalSnapshot);

impl<S> FromRequest<S> for ReadSignals
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Ok(ReadSignals(read_snapshot(req, state).await))
    }
}

/// Typed signals. Rejects with `400 Bad Request` and the parse message when
/// the snapshot is malformed or does not match `T`.
#[derive(Debug, Clone)]
pub struct Signals<T>(pub T);

impl<S, T> FromRequest<S> for Signals<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let snapshot = read_snapshot(req, state).await;
        Ok(Signals(snapshot.deserialize()?))
    }
}

async fn read_snapshot<S>(req: Request, state: &S) -> SignalSnapshot
where
    S: Send + Sync,
{
    let method = req.method().clone();
    let query = req.uri().query().map(str::to_owned);

    if method == Method::GET {
        return signals::read(&method, query.as_deref(), RequestBody::Empty);
    }

    match Bytes::from_request(req, state).await {
        Ok(body) => signals::read(&method, query.as_deref(), RequestBody::Bytes(&body)),
        Err(rejection) => {
            warn!("Failed to read signals body: {rejection}");
            SignalSnapshot::failed(SignalsErrorKind::MalformedJson, rejection.body_text())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;
    use serde::Deserialize;
    use sse::error::ErrorKind;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Counter {
        count: i64,
    }

    #[tokio::test]
    async fn test_read_signals_from_post_body() {
        let request = http::Request::builder()
            .method("POST")
            .uri("/signals")
            .body(Body::from(r#"{"count":3}"#))
            .unwrap();

        let ReadSignals(snapshot) = ReadSignals::from_request(request, &()).await.unwrap();
        assert!(snapshot.is_ok());
        assert_eq!(snapshot.deserialize::<Counter>().unwrap(), Counter { count: 3 });
    }

    #[tokio::test]
    async fn test_read_signals_never_rejects_malformed_json() {
        let request = http::Request::builder()
            .method("POST")
            .uri("/signals")
            .body(Body::from("{count"))
            .unwrap();

        let ReadSignals(snapshot) = ReadSignals::from_request(request, &()).await.unwrap();
        assert!(!snapshot.is_ok());
        assert!(snapshot.error().is_some());
    }

    #[tokio::test]
    async fn test_typed_signals_from_query() {
        let request = http::Request::builder()
            .uri("/signals?datastar=%7B%22count%22%3A-1%7D")
            .body(Body::empty())
            .unwrap();

        let Signals(counter) = Signals::<Counter>::from_request(request, &())
            .await
            .unwrap();
        assert_eq!(counter, Counter { count: -1 });
    }

    #[tokio::test]
    async fn test_typed_signals_reject_wrong_shape() {
        let request = http::Request::builder()
            .method("PUT")
            .uri("/signals")
            .body(Body::from(r#"{"count":"many"}"#))
            .unwrap();

        let err = Signals::<Counter>::from_request(request, &())
            .await
            .unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::Signals(SignalsErrorKind::Deserialize)
        );
    }
}
