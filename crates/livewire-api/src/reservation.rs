// Reservation handshake
//
// Before each streaming attempt the client POSTs to `event/reservations`
// and receives a one-time token wrapped in an event envelope:
//   { "event": "uuid", "data": "6f1c..." }
// The token is embedded in the stream URL of whichever transport is used.

use std::fmt;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use crate::endpoints::EventEndpoints;
use crate::error::Error;
use crate::transport::TransportConfig;

// ── Reservation ──────────────────────────────────────────────────────

/// One-time token authorizing a single streaming connection attempt.
///
/// `Debug` is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Reservation(String);

impl Reservation {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Reservation(..)")
    }
}

// ── ReservationSource ────────────────────────────────────────────────

/// Anything that can hand out stream reservations.
///
/// The stream client only sees this trait, so tests substitute scripted
/// sources for the HTTP-backed [`ReservationClient`].
pub trait ReservationSource: Send + Sync {
    fn reserve(&self) -> BoxFuture<'_, Result<Reservation, Error>>;
}

// ── ReservationClient ────────────────────────────────────────────────

/// Envelope the backend wraps the token in.
#[derive(Debug, Deserialize)]
struct ReservationEnvelope {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// HTTP-backed [`ReservationSource`].
pub struct ReservationClient {
    http: reqwest::Client,
    endpoints: EventEndpoints,
    timeout: Option<Duration>,
}

impl ReservationClient {
    /// Create a reservation client from a `TransportConfig`.
    pub fn new(endpoints: EventEndpoints, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            endpoints,
            timeout: Some(transport.timeout),
        })
    }

    /// Create a reservation client with a pre-built `reqwest::Client`.
    ///
    /// No per-request timeout is applied beyond what the client carries.
    pub fn with_client(http: reqwest::Client, endpoints: EventEndpoints) -> Self {
        Self {
            http,
            endpoints,
            timeout: None,
        }
    }

    /// Request a fresh reservation.
    pub async fn fetch(&self) -> Result<Reservation, Error> {
        let url = self.endpoints.reservations_url()?;
        debug!("POST {}", url);

        let mut request = self.http.post(url);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let resp = request.send().await.map_err(Error::Transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Reservation {
                status: status.as_u16(),
                body,
            });
        }

        parse_envelope(&body)
    }
}

impl ReservationSource for ReservationClient {
    fn reserve(&self) -> BoxFuture<'_, Result<Reservation, Error>> {
        Box::pin(self.fetch())
    }
}

/// Pull the token out of the `{event, data}` envelope.
fn parse_envelope(body: &str) -> Result<Reservation, Error> {
    let envelope: ReservationEnvelope =
        serde_json::from_str(body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.to_owned(),
        })?;

    match envelope.data {
        Some(serde_json::Value::String(token)) if !token.is_empty() => {
            debug!(event = ?envelope.event, "reservation granted");
            Ok(Reservation::new(token))
        }
        _ => Err(Error::Deserialization {
            message: "reservation envelope has no token in `data`".into(),
            body: body.to_owned(),
        }),
    }
}
