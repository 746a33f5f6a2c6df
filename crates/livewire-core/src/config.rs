// ── Runtime stream configuration ──
//
// These types describe *how* the client keeps its stream alive. They
// never touch disk: the CLI (via livewire-config) builds a `StreamConfig`
// and hands it to `EventStreamClient`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which transports the client may use.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProtocolPreference {
    /// Alternate between WebSocket and SSE until one delivers, then stick.
    #[default]
    Auto,
    /// Never try SSE.
    #[serde(rename = "websocket", alias = "ws")]
    #[strum(to_string = "websocket", serialize = "ws")]
    WebSocketOnly,
    /// Never try WebSocket.
    #[serde(rename = "sse")]
    #[strum(to_string = "sse")]
    SseOnly,
}

/// Delay schedule between failed attempts.
///
/// The first `fast_retries` failures restart almost immediately; every
/// failure after that waits `retry_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Failures tolerated before backing off. Default: 3.
    pub fast_retries: u32,
    /// Delay for the fast retries. Default: 1ms.
    pub fast_delay: Duration,
    /// Delay once the fast retries are used up. Default: 5s.
    pub retry_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            fast_retries: 3,
            fast_delay: Duration::from_millis(1),
            retry_delay: Duration::from_millis(5000),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next attempt, given the retry count *before* the
    /// current failure is counted.
    pub fn delay_for(&self, retries: u32) -> Duration {
        if retries < self.fast_retries {
            self.fast_delay
        } else {
            self.retry_delay
        }
    }
}

/// Configuration for one `EventStreamClient`.
#[derive(Debug, Clone, Default)]
pub struct StreamConfig {
    pub reconnect: ReconnectPolicy,
    pub protocol: ProtocolPreference,
    /// Upper bound on reservation plus transport open for one attempt.
    /// `None` waits as long as the network does.
    pub attempt_timeout: Option<Duration>,
}
