//! Error types for the `sse` crate.
//!
//! Follows the same pattern as the other layers: a root `Error` struct holding
//! an error kind and an optional source for error chaining.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the protocol layer.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the protocol layer.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Encode,
    Signals(SignalsErrorKind),
    Transport(TransportErrorKind),
    Batch,
    /// A managed operation sequence returned an error or panicked.
    Operation,
}

/// Errors from reading inbound signals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalsErrorKind {
    MalformedJson,
    NotAnObject,
    Deserialize,
}

/// Errors from writing to the outbound transport.
#[derive(Debug, PartialEq)]
pub enum TransportErrorKind {
    Closed,
}

impl Error {
    /// Wraps a caller failure raised inside a managed operation sequence.
    pub fn operation<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Error {
            source: Some(err.into()),
            error_kind: ErrorKind::Operation,
        }
    }

    /// The message of the underlying source, if any.
    pub fn message(&self) -> Option<String> {
        self.source.as_ref().map(|source| source.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Encode => write!(f, "Encode error")?,
            ErrorKind::Signals(kind) => write!(f, "Signals error: {:?}", kind)?,
            ErrorKind::Transport(kind) => write!(f, "Transport error: {:?}", kind)?,
            ErrorKind::Batch => write!(f, "Batch error")?,
            ErrorKind::Operation => write!(f, "Operation error")?,
        }
        match &self.source {
            Some(source) => write!(f, ": {source}"),
            None => Ok(()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Encode,
        }
    }
}

/// Helper function to create signals errors.
pub fn signals_error(kind: SignalsErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Signals(kind),
    }
}

/// Helper function to create transport errors.
pub fn transport_error(kind: TransportErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Transport(kind),
    }
}

/// Helper function to create batch errors.
pub fn batch_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Batch,
    }
}
