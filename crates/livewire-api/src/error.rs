use thiserror::Error;

use crate::stream::Protocol;

/// Top-level error type for the `livewire-api` crate.
///
/// Covers every failure mode of the wire layer: HTTP transport, the
/// reservation handshake, and both streaming protocols. `livewire-core`
/// treats all of these as "this attempt failed" and feeds them into the
/// reconnect policy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The backend URL uses a scheme that has no WebSocket equivalent.
    #[error("Unsupported URL scheme '{scheme}' (expected http or https)")]
    UnsupportedScheme { scheme: String },

    /// A connection attempt exceeded the configured time box.
    #[error("Connection attempt timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// A configured header name or value cannot be sent.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    // ── Reservation ─────────────────────────────────────────────────
    /// The reservation endpoint answered with a non-success status.
    #[error("Reservation request rejected (HTTP {status})")]
    Reservation { status: u16, body: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the server.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Server-Sent Events ──────────────────────────────────────────
    /// The SSE endpoint answered with a non-success status.
    #[error("Event stream rejected (HTTP {status})")]
    SseStatus { status: u16 },

    /// The server sent a `close` or `error` event.
    #[error("Event stream signalled '{event}'")]
    SseSignal { event: String },

    // ── Stream lifecycle ────────────────────────────────────────────
    /// The stream ended without an explicit close.
    #[error("{protocol} stream ended")]
    StreamEnded { protocol: Protocol },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the server explicitly refused the request, as
    /// opposed to the network dropping it.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Reservation { .. } | Self::SseStatus { .. } => true,
            Self::Transport(e) => e.status().is_some(),
            _ => false,
        }
    }

    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Reservation { status, .. } | Self::SseStatus { status } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if the error came from a live stream going away
    /// rather than from failing to establish one.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::WebSocketClosed { .. } | Self::SseSignal { .. } | Self::StreamEnded { .. }
        )
    }
}
