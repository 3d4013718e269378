use crate::consts::DEFAULT_RETRY_MS;
use crate::error::Error;
use crate::session::StreamSession;
use crate::transport::{Disconnected, Transport};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// Per-sequence options for managed sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Leave the session open once the operation sequence returns so it can be
    /// handed to a longer-lived context. Defaults to `false`.
    pub keep_alive: bool,
}

impl SessionOptions {
    pub fn keep_alive() -> Self {
        Self { keep_alive: true }
    }
}

/// How a managed operation sequence ended.
#[derive(Debug)]
pub enum Outcome<T: Transport> {
    /// The sequence returned `Ok` and the session was closed.
    Completed,
    /// The sequence failed or panicked and the session was closed.
    Failed(Error),
    /// Keep-alive was requested: the session is still open and owned by the caller.
    KeptAlive {
        session: StreamSession<T>,
        result: Result<(), Error>,
    },
}

impl<T: Transport> Outcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Outcome::Completed => None,
            Outcome::Failed(e) => Some(e),
            Outcome::KeptAlive { result, .. } => result.as_ref().err(),
        }
    }

    pub fn into_session(self) -> Option<StreamSession<T>> {
        match self {
            Outcome::KeptAlive { session, .. } => Some(session),
            Outcome::Completed | Outcome::Failed(_) => None,
        }
    }
}

/// A session the caller drives and closes itself.
#[derive(Debug)]
pub struct Unmanaged<T: Transport> {
    pub session: StreamSession<T>,
    /// Resolves when the client goes away so the producer can stop.
    pub disconnected: Disconnected,
}

/// Opens stream sessions and owns their lifecycle.
#[derive(Debug, Clone)]
pub struct Manager {
    default_retry: Duration,
}

impl Manager {
    pub fn new() -> Self {
        Self::with_default_retry(Duration::from_millis(DEFAULT_RETRY_MS))
    }

    pub fn with_default_retry(default_retry: Duration) -> Self {
        Self { default_retry }
    }

    pub fn default_retry(&self) -> Duration {
        self.default_retry
    }

    /// Opens a session, writing the preamble.
    pub fn open<T: Transport>(&self, transport: T) -> StreamSession<T> {
        StreamSession::open(transport, self.default_retry)
    }

    /// Opens a session the caller must close explicitly.
    pub fn open_unmanaged<T: Transport>(&self, mut transport: T) -> Unmanaged<T> {
        let disconnected = transport.disconnected();
        let session = self.open(transport);
        info!("Opened unmanaged stream session {}", session.id().as_str());
        Unmanaged {
            session,
            disconnected,
        }
    }

    /// Runs an asynchronous operation sequence against a fresh session and
    /// closes it on every exit path unless keep-alive was requested.
    ///
    /// ```rust,ignore
    /// manager
    ///     .run(transport, SessionOptions::default(), |session| {
    ///         Box::pin(async move {
    ///             session.console_log("hello");
    ///             Ok(())
    ///         })
    ///     })
    ///     .await;
    /// ```
    pub async fn run<T, F>(&self, transport: T, options: SessionOptions, ops: F) -> Outcome<T>
    where
        T: Transport,
        F: for<'s> FnOnce(&'s mut StreamSession<T>) -> BoxFuture<'s, Result<(), Error>>,
    {
        let mut session = self.open(transport);
        let caught = AssertUnwindSafe(ops(&mut session)).catch_unwind().await;
        let result = caught.unwrap_or_else(|payload| Err(panicked(payload)));
        finish(session, options, result)
    }

    /// Synchronous counterpart of [`run`](Self::run).
    pub fn run_sync<T, F>(&self, transport: T, options: SessionOptions, ops: F) -> Outcome<T>
    where
        T: Transport,
        F: FnOnce(&mut StreamSession<T>) -> Result<(), Error>,
    {
        let mut session = self.open(transport);
        let caught = panic::catch_unwind(AssertUnwindSafe(|| ops(&mut session)));
        let result = caught.unwrap_or_else(|payload| Err(panicked(payload)));
        finish(session, options, result)
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

fn finish<T: Transport>(
    mut session: StreamSession<T>,
    options: SessionOptions,
    result: Result<(), Error>,
) -> Outcome<T> {
    if let Err(e) = &result {
        error!(
            "Operation sequence for stream session {} failed: {e}",
            session.id().as_str()
        );
    }

    if options.keep_alive {
        debug!(
            "Keeping stream session {} open for the caller",
            session.id().as_str()
        );
        return Outcome::KeptAlive { session, result };
    }

    session.close();
    match result {
        Ok(()) => Outcome::Completed,
        Err(e) => Outcome::Failed(e),
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> Error {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "operation sequence panicked".to_owned()
    };
    Error::operation(message)
}
