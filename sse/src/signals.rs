//! Reads the client's signal snapshot from an inbound request.
//!
//! Retrieval requests (`GET`) carry the snapshot URL-encoded in the
//! `datastar` query parameter; every other method carries it as the JSON
//! request body. Reading never fails: a malformed snapshot is reported as a
//! failed [`SignalSnapshot`] and the caller decides what to answer.

use crate::consts::{DATASTAR_QUERY_PARAM, DATASTAR_REQUEST_HEADER};
use crate::error::{signals_error, Error, SignalsErrorKind};
use axum::http::{HeaderMap, Method};
use log::*;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Request body as seen by [`read`].
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody<'a> {
    Empty,
    /// Raw text still to be parsed.
    Text(&'a str),
    Bytes(&'a [u8]),
    /// A body some earlier layer already parsed.
    Json(Value),
}

/// The client's current signals, or why they could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSnapshot {
    values: Option<Map<String, Value>>,
    failure: Option<(SignalsErrorKind, String)>,
}

impl SignalSnapshot {
    pub fn ok(values: Map<String, Value>) -> Self {
        Self {
            values: Some(values),
            failure: None,
        }
    }

    pub fn empty() -> Self {
        Self::ok(Map::new())
    }

    pub fn failed(kind: SignalsErrorKind, message: impl Into<String>) -> Self {
        Self {
            values: None,
            failure: Some((kind, message.into())),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.values.is_some()
    }

    /// Present iff the snapshot was read successfully.
    pub fn values(&self) -> Option<&Map<String, Value>> {
        self.values.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.failure.as_ref().map(|(_, message)| message.as_str())
    }

    pub fn into_result(self) -> Result<Map<String, Value>, Error> {
        match (self.values, self.failure) {
            (Some(values), _) => Ok(values),
            (None, Some((kind, message))) => Err(signals_error(kind, &message)),
            (None, None) => Ok(Map::new()),
        }
    }

    /// Deserializes the snapshot into a typed signals struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if let Some((kind, message)) = &self.failure {
            return Err(signals_error(*kind, message));
        }
        let values = self.values.clone().unwrap_or_default();
        serde_json::from_value(Value::Object(values)).map_err(|e| {
            warn!("Signals do not match the expected shape: {e}");
            signals_error(SignalsErrorKind::Deserialize, &e.to_string())
        })
    }
}

/// Reads the snapshot for a request with the given method, raw query string
/// and body.
pub fn read(method: &Method, query: Option<&str>, body: RequestBody<'_>) -> SignalSnapshot {
    if method == Method::GET {
        return read_query(query);
    }

    match body {
        RequestBody::Empty => SignalSnapshot::empty(),
        RequestBody::Text(text) => parse(text),
        RequestBody::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => parse(text),
            Err(e) => {
                debug!("Signals body is not valid UTF-8: {e}");
                SignalSnapshot::failed(SignalsErrorKind::MalformedJson, e.to_string())
            }
        },
        RequestBody::Json(value) => from_value(value),
    }
}

/// True when the request carries the `datastar-request: true` marker header.
pub fn is_datastar_request(headers: &HeaderMap) -> bool {
    headers
        .get(DATASTAR_REQUEST_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == "true")
}

fn read_query(query: Option<&str>) -> SignalSnapshot {
    let encoded = query.and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == DATASTAR_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
    });

    match encoded {
        Some(json) => parse(&json),
        None => SignalSnapshot::empty(),
    }
}

fn parse(text: &str) -> SignalSnapshot {
    if text.trim().is_empty() {
        return SignalSnapshot::empty();
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value) => from_value(value),
        Err(e) => {
            debug!("Malformed signals JSON: {e}");
            SignalSnapshot::failed(SignalsErrorKind::MalformedJson, e.to_string())
        }
    }
}

fn from_value(value: Value) -> SignalSnapshot {
    match value {
        Value::Object(values) => SignalSnapshot::ok(values),
        Value::Null => SignalSnapshot::empty(),
        other => SignalSnapshot::failed(
            SignalsErrorKind::NotAnObject,
            format!("expected a JSON object of signals, got {other}"),
        ),
    }
}
