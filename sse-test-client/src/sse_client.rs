use anyhow::Result;
use eventsource_client::{self as es, Client};
use futures_util::stream::StreamExt;
use log::*;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    /// The `data:` lines of the event joined with `\n`.
    pub data: String,
    pub timestamp: Instant,
}

impl Event {
    /// Data lines as written on the wire, e.g. `elements <div>hi</div>`.
    pub fn data_lines(&self) -> impl Iterator<Item = &str> {
        self.data.lines()
    }
}

pub struct Connection {
    pub label: String,
    event_rx: mpsc::UnboundedReceiver<Event>,
    _handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    /// Opens a GET event stream. Reconnection is disabled so the server
    /// closing the stream ends the connection.
    pub async fn establish(url: &str, label: String) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let client = es::ClientBuilder::for_url(url)?
            .header("datastar-request", "true")?
            .reconnect(es::ReconnectOptions::reconnect(false).build())
            .build();

        let connection_label = label.clone();
        let handle = tokio::spawn(async move {
            let mut stream = client.stream();

            loop {
                match stream.next().await {
                    Some(Ok(es::SSE::Event(event))) => {
                        let sse_event = Event {
                            event_type: event.event_type,
                            data: event.data,
                            timestamp: Instant::now(),
                        };

                        if tx.send(sse_event).is_err() {
                            debug!("SSE receiver dropped for {}", connection_label);
                            break;
                        }
                    }
                    Some(Ok(es::SSE::Comment(_))) => {
                        // Ignore comments (keep-alive)
                    }
                    Some(Err(e)) => {
                        debug!("SSE stream for {} ended: {}", connection_label, e);
                        break;
                    }
                    None => {
                        debug!("SSE stream ended for {}", connection_label);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            label,
            event_rx: rx,
            _handle: handle,
        })
    }

    pub async fn wait_for_event(&mut self, event_type: &str, timeout: Duration) -> Result<Event> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                anyhow::bail!("Timeout waiting for event: {}", event_type);
            }

            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) if event.event_type == event_type => {
                    return Ok(event);
                }
                Ok(Some(_)) => {
                    // Wrong event type, keep waiting
                    continue;
                }
                Ok(None) => {
                    anyhow::bail!("SSE connection closed");
                }
                Err(_) => {
                    anyhow::bail!("Timeout waiting for event: {}", event_type);
                }
            }
        }
    }

    /// Collects every event until the server closes the stream.
    pub async fn collect_until_closed(&mut self, timeout: Duration) -> Result<Vec<Event>> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => return Ok(events),
                Err(_) => anyhow::bail!(
                    "{} still open after {:?} ({} events received)",
                    self.label,
                    timeout,
                    events.len()
                ),
            }
        }
    }
}

/// One frame of a fully buffered event-stream body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub event: Option<String>,
    pub id: Option<String>,
    pub retry: Option<u64>,
    pub data: Vec<String>,
}

/// Splits a buffered `text/event-stream` body into frames.
pub fn parse_frames(body: &str) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut current = Frame::default();
    let mut touched = false;

    for line in body.lines() {
        if line.is_empty() {
            if touched {
                frames.push(std::mem::take(&mut current));
                touched = false;
            }
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        touched = true;
        match field {
            "event" => current.event = Some(value.to_string()),
            "id" => current.id = Some(value.to_string()),
            "retry" => current.retry = value.parse().ok(),
            "data" => current.data.push(value.to_string()),
            _ => {}
        }
    }

    if touched {
        frames.push(current);
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frames_splits_on_blank_lines() {
        let body = "retry: 1000\n\n\
                    event: datastar-patch-elements\ndata: mode append\ndata: selector #c\ndata: elements <div>hi</div>\n\n\
                    event: datastar-patch-signals\nid: 7\ndata: signals {\"x\":1}\n\n";

        let frames = parse_frames(body);

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].retry, Some(1000));
        assert_eq!(frames[1].event.as_deref(), Some("datastar-patch-elements"));
        assert_eq!(
            frames[1].data,
            vec!["mode append", "selector #c", "elements <div>hi</div>"]
        );
        assert_eq!(frames[2].id.as_deref(), Some("7"));
        assert_eq!(frames[2].data, vec!["signals {\"x\":1}"]);
    }

    #[test]
    fn test_parse_frames_keeps_unterminated_tail() {
        let frames = parse_frames("event: datastar-patch-signals\ndata: signals {}");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, vec!["signals {}"]);
    }
}
