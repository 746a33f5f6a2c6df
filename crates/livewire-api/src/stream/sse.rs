//! Server-Sent-Events transport.
//!
//! `GET {base}/event/streams/{reservation}` with `Accept: text/event-stream`.
//! The backend emits named events:
//!
//! | event          | data                          | handling                    |
//! |----------------|-------------------------------|-----------------------------|
//! | `message`      | raw text (e.g. `connected`)   | [`Frame::Message`]          |
//! | `change-event` | JSON `{action, kind, id}`     | [`Frame::Change`]           |
//! | `close`        | --                            | stream fails                |
//! | `error`        | --                            | stream fails                |
//!
//! Anything else is ignored.

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tracing::{debug, info, trace};

use crate::endpoints::EventEndpoints;
use crate::error::Error;
use crate::event::{CHANGE_EVENT, ChangeEvent, Frame, MESSAGE_EVENT, MessageEvent};
use crate::reservation::Reservation;
use crate::stream::{EventTransport, FrameStream, Protocol};
use crate::transport::TransportConfig;

const CLOSE_EVENT: &str = "close";
const ERROR_EVENT: &str = "error";

// ── SseTransport ─────────────────────────────────────────────────────

/// [`EventTransport`] over Server-Sent-Events.
pub struct SseTransport {
    http: reqwest::Client,
    endpoints: EventEndpoints,
}

impl SseTransport {
    /// Create an SSE transport from a `TransportConfig`.
    pub fn new(endpoints: EventEndpoints, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            endpoints,
        })
    }

    /// Create an SSE transport with a pre-built `reqwest::Client`.
    ///
    /// The client must not carry a total request timeout, or the stream
    /// is cut off when it expires.
    pub fn with_client(http: reqwest::Client, endpoints: EventEndpoints) -> Self {
        Self { http, endpoints }
    }

    async fn connect(&self, reservation: &Reservation) -> Result<FrameStream, Error> {
        let url = self.endpoints.sse_url(reservation)?;
        info!("Connecting to event stream");

        let resp = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::SseStatus {
                status: status.as_u16(),
            });
        }

        info!("Event stream connected");

        let frames = async_stream::stream! {
            let mut body = Box::pin(resp.bytes_stream());
            let mut decoder = SseDecoder::default();
            'read: loop {
                match body.next().await {
                    Some(Ok(chunk)) => {
                        for event in decoder.feed(&chunk) {
                            match classify(event) {
                                Ok(Some(frame)) => yield Ok(frame),
                                Ok(None) => {}
                                Err(e) => {
                                    yield Err(e);
                                    break 'read;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        yield Err(Error::Transport(e));
                        break;
                    }
                    None => {
                        info!("Event stream ended");
                        yield Err(Error::StreamEnded { protocol: Protocol::Sse });
                        break;
                    }
                }
            }
        };

        Ok(frames.boxed())
    }
}

impl EventTransport for SseTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Sse
    }

    fn open<'a>(
        &'a self,
        reservation: &'a Reservation,
    ) -> BoxFuture<'a, Result<FrameStream, Error>> {
        Box::pin(self.connect(reservation))
    }
}

/// Map a dispatched SSE event onto the feed.
///
/// `Ok(None)` drops the event, `Err` ends the stream.
fn classify(event: SseEvent) -> Result<Option<Frame>, Error> {
    match event.event.as_str() {
        MESSAGE_EVENT => Ok(Some(Frame::Message(MessageEvent {
            id: event.id.unwrap_or_default(),
            data: event.data,
            event: event.event,
        }))),
        CHANGE_EVENT => Ok(ChangeEvent::from_payload(&event.data).map(Frame::Change)),
        CLOSE_EVENT | ERROR_EVENT => {
            debug!(event = %event.event, "event stream signalled failure");
            Err(Error::SseSignal { event: event.event })
        }
        other => {
            trace!(event = other, "ignoring SSE event with unknown name");
            Ok(None)
        }
    }
}

// ── SSE decoding ─────────────────────────────────────────────────────

/// One dispatched Server-Sent-Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; `message` when the server sent no `event:` field.
    pub event: String,
    /// `data:` lines joined with `\n`.
    pub data: String,
    /// Last `id:` seen for this event.
    pub id: Option<String>,
}

/// Incremental `text/event-stream` decoder.
///
/// Feed it body chunks as they arrive; it buffers partial lines across
/// chunk boundaries and yields every event terminated by a blank line.
/// Lines may end in `\n`, `\r\n` or `\r`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    /// Consume a chunk, returning the events it completed.
    pub fn feed(&mut self, chunk: &Bytes) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some((line_end, next)) = self.next_line_break() {
            let line = String::from_utf8_lossy(&self.buf[..line_end]).into_owned();
            self.buf.drain(..next);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Locate the first complete line: `(end of content, start of next line)`.
    ///
    /// A trailing lone `\r` waits for the next chunk, since it may be the
    /// first half of `\r\n`.
    fn next_line_break(&self) -> Option<(usize, usize)> {
        let pos = self.buf.iter().position(|b| *b == b'\n' || *b == b'\r')?;
        if self.buf[pos] == b'\n' {
            return Some((pos, pos + 1));
        }
        match self.buf.get(pos + 1) {
            Some(b'\n') => Some((pos, pos + 2)),
            Some(_) => Some((pos, pos + 1)),
            None => None,
        }
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            // comment / keep-alive
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_owned()),
            "data" => self.data.push(value.to_owned()),
            "id" if !value.contains('\0') => self.id = Some(value.to_owned()),
            // `retry` is the browser's reconnect hint; reconnects are ours to schedule
            _ => {}
        }
        None
    }

    /// Blank line: emit the buffered event, if any.
    ///
    /// Events with a name but no data still dispatch, since `close` and
    /// `error` carry no payload.
    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data);
        if event.is_none() && data.is_empty() {
            return None;
        }

        Some(SseEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| MESSAGE_EVENT.to_owned()),
            data: data.join("\n"),
            id: self.id.clone(),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn decode(chunks: &[&str]) -> Vec<SseEvent> {
        let mut decoder = SseDecoder::default();
        chunks
            .iter()
            .flat_map(|c| decoder.feed(&Bytes::copy_from_slice(c.as_bytes())))
            .collect()
    }

    fn event(name: &str, data: &str, id: Option<&str>) -> SseEvent {
        SseEvent {
            event: name.into(),
            data: data.into(),
            id: id.map(String::from),
        }
    }

    #[test]
    fn named_events_are_decoded() {
        let events = decode(&[
            "event: message\ndata: connected\n\n",
            "event: change-event\nid: 7\ndata: {\"action\":\"created\",\"kind\":\"integration\",\"id\":\"1001\"}\n\n",
        ]);

        assert_eq!(
            events,
            vec![
                event("message", "connected", None),
                event(
                    "change-event",
                    r#"{"action":"created","kind":"integration","id":"1001"}"#,
                    Some("7")
                ),
            ]
        );
    }

    #[test]
    fn lines_split_across_chunks() {
        let events = decode(&["event: mess", "age\nda", "ta: conn", "ected\n", "\n"]);
        assert_eq!(events, vec![event("message", "connected", None)]);
    }

    #[test]
    fn crlf_split_between_chunks_is_one_line_break() {
        let events = decode(&["data: a\r", "\ndata: b\r\n\r\n"]);
        assert_eq!(events, vec![event("message", "a\nb", None)]);
    }

    #[test]
    fn bare_cr_line_endings() {
        let events = decode(&["event: close\r\r", ": ping\r"]);
        assert_eq!(events, vec![event("close", "", None)]);
    }

    #[test]
    fn comments_and_empty_blocks_are_skipped() {
        let events = decode(&[": keep-alive\n\n", "\n", "retry: 3000\n\n"]);
        assert!(events.is_empty());
    }

    #[test]
    fn unnamed_event_defaults_to_message() {
        let events = decode(&["data:raw\n\n"]);
        assert_eq!(events, vec![event("message", "raw", None)]);
    }

    #[test]
    fn classify_routes_by_event_name() {
        let msg = classify(event("message", "connected", None)).unwrap();
        assert_eq!(msg, Some(Frame::Message(MessageEvent::connected())));

        let change = classify(event(
            "change-event",
            r#"{"action":"updated","kind":"connection","id":"abc"}"#,
            None,
        ))
        .unwrap();
        assert_eq!(
            change,
            Some(Frame::Change(ChangeEvent::new("updated", "connection", "abc")))
        );

        assert_eq!(classify(event("heartbeat", "", None)).unwrap(), None);
        assert_eq!(classify(event("change-event", "garbage", None)).unwrap(), None);
    }

    #[test]
    fn close_and_error_events_fail_the_stream() {
        for name in ["close", "error"] {
            let result = classify(event(name, "", None));
            assert!(
                matches!(result, Err(Error::SseSignal { ref event }) if event == name),
                "expected failure for {name}"
            );
        }
    }
}
