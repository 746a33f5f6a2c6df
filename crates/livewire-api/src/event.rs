//! Event payloads carried by the stream.
//!
//! Both transports decode into the same two shapes: [`ChangeEvent`] for
//! resource mutations and [`MessageEvent`] for everything else, including
//! the `"connected"` greeting the backend sends when a stream goes live.

use serde::{Deserialize, Serialize};

/// Event name for generic messages on both transports.
pub const MESSAGE_EVENT: &str = "message";

/// Event name for resource mutations on both transports.
pub const CHANGE_EVENT: &str = "change-event";

// ── ChangeEvent ──────────────────────────────────────────────────────

/// A domain resource was mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened, e.g. `"created"`, `"updated"`, `"deleted"`.
    pub action: String,
    /// Resource kind, e.g. `"connection"`, `"integration"`.
    pub kind: String,
    /// Identifier of the mutated resource.
    pub id: String,
}

impl ChangeEvent {
    pub fn new(action: impl Into<String>, kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Decode a change event from its JSON payload text.
    ///
    /// Returns `None` (after logging) for anything that isn't a JSON object
    /// with `action`, `kind` and `id`.
    pub fn from_payload(payload: &str) -> Option<Self> {
        match serde_json::from_str(payload) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed change event");
                None
            }
        }
    }
}

// ── MessageEvent ─────────────────────────────────────────────────────

/// A generic message on the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Server-assigned event id (empty when the server sent none).
    #[serde(default)]
    pub id: String,
    /// Payload text, passed through unparsed.
    pub data: String,
    /// Event name the message arrived under.
    #[serde(default = "default_event_name")]
    pub event: String,
}

fn default_event_name() -> String {
    MESSAGE_EVENT.into()
}

impl MessageEvent {
    /// Payload the backend sends as soon as a stream is live.
    pub const CONNECTED: &'static str = "connected";

    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
            event: MESSAGE_EVENT.into(),
        }
    }

    /// The liveness greeting. Consumers reconcile (full re-read) on this,
    /// since anything sent while disconnected was lost.
    pub fn connected() -> Self {
        Self::new("", Self::CONNECTED)
    }

    pub fn is_connected(&self) -> bool {
        self.data == Self::CONNECTED
    }
}

// ── Frame ────────────────────────────────────────────────────────────

/// One decoded inbound frame, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Change(ChangeEvent),
    Message(MessageEvent),
}
