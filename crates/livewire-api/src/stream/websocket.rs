//! WebSocket transport.
//!
//! Connects to `{base}/event/streams.ws/{reservation}` (base rewritten to
//! `ws`/`wss`) and decodes each text frame. Frames are JSON envelopes:
//!
//! ```json
//! { "event": "message",      "data": "connected" }
//! { "event": "change-event", "data": "{\"action\":\"updated\",\"kind\":\"connection\",\"id\":\"abc\"}" }
//! ```
//!
//! Unknown event names and unparseable frames are dropped. A close frame,
//! a read error, or the socket simply ending all terminate the stream with
//! an error so the caller can reconnect.

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use serde::Deserialize;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tracing::{debug, info, trace};

use crate::endpoints::EventEndpoints;
use crate::error::Error;
use crate::event::{CHANGE_EVENT, ChangeEvent, Frame, MESSAGE_EVENT, MessageEvent};
use crate::reservation::Reservation;
use crate::stream::{EventTransport, FrameStream, Protocol};
use crate::transport::TransportConfig;

// ── WebSocketTransport ───────────────────────────────────────────────

/// [`EventTransport`] over a WebSocket.
pub struct WebSocketTransport {
    endpoints: EventEndpoints,
    transport: TransportConfig,
}

impl WebSocketTransport {
    /// Upgrade requests carry the auth headers and cookies of `transport`.
    pub fn new(endpoints: EventEndpoints, transport: TransportConfig) -> Self {
        Self {
            endpoints,
            transport,
        }
    }

    async fn connect(&self, reservation: &Reservation) -> Result<FrameStream, Error> {
        let url = self.endpoints.websocket_url(reservation)?;
        info!(url = %redacted(&url), "Connecting to WebSocket");

        let uri: tungstenite::http::Uri = url.as_str().parse().map_err(
            |e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()),
        )?;

        let mut request = ClientRequestBuilder::new(uri);
        for (name, value) in self.transport.upgrade_headers(&url) {
            request = request.with_header(name, value);
        }

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        info!("WebSocket connected");

        // Only the read half is used; dropping the stream drops the socket.
        let frames = async_stream::stream! {
            let mut socket = ws_stream;
            loop {
                match socket.next().await {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(frame) = decode_frame(text.as_str()) {
                            yield Ok(frame);
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite answers pings itself
                        trace!("WebSocket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let (code, reason) = frame.map_or_else(
                            || (1005, String::new()),
                            |cf| (u16::from(cf.code), cf.reason.as_str().to_owned()),
                        );
                        info!(code, reason = %reason, "WebSocket close frame received");
                        yield Err(Error::WebSocketClosed { code, reason });
                        break;
                    }
                    Some(Err(e)) => {
                        yield Err(Error::WebSocketConnect(e.to_string()));
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended");
                        yield Err(Error::StreamEnded { protocol: Protocol::WebSocket });
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong, raw Frame -- not part of the feed
                    }
                }
            }
        };

        Ok(frames.boxed())
    }
}

impl EventTransport for WebSocketTransport {
    fn protocol(&self) -> Protocol {
        Protocol::WebSocket
    }

    fn open<'a>(
        &'a self,
        reservation: &'a Reservation,
    ) -> BoxFuture<'a, Result<FrameStream, Error>> {
        Box::pin(self.connect(reservation))
    }
}

// ── Frame decoding ───────────────────────────────────────────────────

/// Envelope the backend sends for every WebSocket message.
#[derive(Debug, Deserialize)]
struct WsEnvelope {
    event: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

/// Decode one text frame. `None` means "drop it".
pub(crate) fn decode_frame(text: &str) -> Option<Frame> {
    let envelope: WsEnvelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            debug!(error = %e, "Failed to parse WebSocket envelope");
            return None;
        }
    };

    match envelope.event.as_str() {
        MESSAGE_EVENT => Some(Frame::Message(MessageEvent {
            id: envelope.id.unwrap_or_default(),
            data: payload_text(envelope.data),
            event: envelope.event,
        })),
        CHANGE_EVENT => {
            let change = match envelope.data {
                serde_json::Value::String(payload) => ChangeEvent::from_payload(&payload),
                other => serde_json::from_value(other)
                    .map_err(|e| debug!(error = %e, "dropping malformed change event"))
                    .ok(),
            };
            change.map(Frame::Change)
        }
        other => {
            trace!(event = other, "ignoring WebSocket frame with unknown event name");
            None
        }
    }
}

/// Message payloads are handed to listeners as text. String payloads
/// (including the `"connected"` sentinel) pass through untouched; structured
/// JSON is re-serialized.
fn payload_text(data: serde_json::Value) -> String {
    match data {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Strip the reservation token (last path segment) for logging.
fn redacted(url: &url::Url) -> String {
    let s = url.as_str();
    s.rsplit_once('/')
        .map_or_else(|| s.to_owned(), |(head, _)| format!("{head}/…"))
}

// ── Tests ────────────────────────────────────────────────────────────
