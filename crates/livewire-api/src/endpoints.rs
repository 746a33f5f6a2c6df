// Backend URL layout for the event stream.
//
// Everything hangs off one base URL (e.g. `https://console/api/v1`):
//   POST {base}/event/reservations
//   WS   {base with ws scheme}/event/streams.ws/{reservation}
//   GET  {base}/event/streams/{reservation}   (text/event-stream)

use url::Url;

use crate::error::Error;
use crate::reservation::Reservation;

const RESERVATIONS_PATH: [&str; 2] = ["event", "reservations"];
const WEBSOCKET_PATH: [&str; 2] = ["event", "streams.ws"];
const SSE_PATH: [&str; 2] = ["event", "streams"];

/// URL builder for the event endpoints of one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEndpoints {
    base_url: Url,
}

impl EventEndpoints {
    /// The base URL must be `http` or `https`.
    pub fn new(base_url: Url) -> Result<Self, Error> {
        match base_url.scheme() {
            "http" | "https" => Ok(Self { base_url }),
            other => Err(Error::UnsupportedScheme {
                scheme: other.to_owned(),
            }),
        }
    }

    pub fn parse(base_url: &str) -> Result<Self, Error> {
        Self::new(Url::parse(base_url)?)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `POST` target for the reservation handshake.
    pub fn reservations_url(&self) -> Result<Url, Error> {
        self.join(RESERVATIONS_PATH)
    }

    /// WebSocket stream URL: the base URL rewritten to `ws`/`wss`.
    pub fn websocket_url(&self, reservation: &Reservation) -> Result<Url, Error> {
        let mut url = self.join(WEBSOCKET_PATH.into_iter().chain([reservation.as_str()]))?;
        let ws_scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(ws_scheme)
            .map_err(|()| Error::UnsupportedScheme {
                scheme: url.scheme().to_owned(),
            })?;
        Ok(url)
    }

    /// Server-Sent-Events stream URL.
    pub fn sse_url(&self, reservation: &Reservation) -> Result<Url, Error> {
        self.join(SSE_PATH.into_iter().chain([reservation.as_str()]))
    }

    /// Append `segments` to the base path, percent-encoding each one so
    /// a reservation can never add path, query or fragment components.
    fn join<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| Error::UnsupportedScheme {
                scheme: self.base_url.scheme().to_owned(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}
