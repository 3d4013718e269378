//! Outbound transports a [`StreamSession`](crate::StreamSession) writes frames into.

use crate::error::{transport_error, Error, TransportErrorKind};
use async_stream::stream;
use axum::body::Bytes;
use futures::Stream;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

/// The write side of one streamed response.
///
/// Implementations must not buffer frames for later delivery once closed.
pub trait Transport: Send {
    /// Writes one complete frame. Fails once the transport is closed.
    fn write_frame(&mut self, frame: &str) -> Result<(), Error>;

    /// Ends the stream. Further writes fail.
    fn close(&mut self);

    /// True once the stream was closed locally or by the peer.
    fn is_closed(&self) -> bool;

    /// Notification that resolves when the peer goes away. Can be taken once;
    /// later calls return a notification that never resolves.
    fn disconnected(&mut self) -> Disconnected {
        Disconnected::never()
    }
}

/// One-shot notification that a transport was closed.
#[derive(Debug)]
pub struct Disconnected {
    signal: Option<oneshot::Receiver<()>>,
    fired: bool,
}

impl Disconnected {
    pub fn never() -> Self {
        Self {
            signal: None,
            fired: false,
        }
    }

    fn from_signal(signal: oneshot::Receiver<()>) -> Self {
        Self {
            signal: Some(signal),
            fired: false,
        }
    }
}

impl Future for Disconnected {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.fired {
            return Poll::Ready(());
        }
        let Some(signal) = self.signal.as_mut() else {
            return Poll::Pending;
        };
        match Pin::new(signal).poll(cx) {
            Poll::Ready(_) => {
                self.fired = true;
                self.signal = None;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Creates a transport backed by an unbounded channel together with the
/// receiving half that feeds the HTTP response body.
pub fn channel() -> (ChannelTransport, FrameReceiver) {
    let (sender, frames) = mpsc::unbounded_channel();
    let (guard, signal) = oneshot::channel();

    (
        ChannelTransport {
            sender: Some(sender),
            disconnected: Some(signal),
        },
        FrameReceiver {
            frames,
            _guard: guard,
        },
    )
}

#[derive(Debug)]
pub struct ChannelTransport {
    sender: Option<mpsc::UnboundedSender<String>>,
    disconnected: Option<oneshot::Receiver<()>>,
}

impl Transport for ChannelTransport {
    fn write_frame(&mut self, frame: &str) -> Result<(), Error> {
        let Some(sender) = &self.sender else {
            return Err(transport_error(
                TransportErrorKind::Closed,
                "transport already closed",
            ));
        };
        sender.send(frame.to_owned()).map_err(|_| {
            transport_error(TransportErrorKind::Closed, "frame receiver dropped")
        })
    }

    fn close(&mut self) {
        // Dropping the only sender ends the receiving stream after the
        // frames already queued.
        self.sender.take();
    }

    fn is_closed(&self) -> bool {
        self.sender
            .as_ref()
            .map_or(true, |sender| sender.is_closed())
    }

    fn disconnected(&mut self) -> Disconnected {
        match self.disconnected.take() {
            Some(signal) => Disconnected::from_signal(signal),
            None => Disconnected::never(),
        }
    }
}

/// Receiving half of [`channel`]. Dropping it, which is what happens when
/// the client disconnects and the response body is dropped, closes the
/// transport and fires its [`Disconnected`] notification.
#[derive(Debug)]
pub struct FrameReceiver {
    frames: mpsc::UnboundedReceiver<String>,
    _guard: oneshot::Sender<()>,
}

impl FrameReceiver {
    pub async fn recv(&mut self) -> Option<String> {
        self.frames.recv().await
    }

    /// Turns the receiver into a body stream that ends once the transport closes.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        let mut receiver = self;
        stream! {
            while let Some(frame) = receiver.recv().await {
                yield Ok::<_, Infallible>(Bytes::from(frame));
            }
        }
    }
}
