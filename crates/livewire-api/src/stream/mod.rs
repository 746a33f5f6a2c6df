// ── Streaming transports ──
//
// Two interchangeable ways to receive the same event feed. Each adapter
// turns a reservation into a `FrameStream`:
//   - `Ok(frame)` items are decoded events, in receipt order
//   - an `Err` item means the transport failed; nothing follows it
//   - dropping the stream closes the underlying connection

pub mod sse;
pub mod websocket;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::event::Frame;
use crate::reservation::Reservation;

/// Decoded frames from one open transport.
pub type FrameStream = BoxStream<'static, Result<Frame, Error>>;

/// Wire protocol of a transport.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    #[strum(to_string = "websocket", serialize = "ws")]
    WebSocket,
    Sse,
}

/// A way of opening the event stream for a reservation.
pub trait EventTransport: Send + Sync {
    /// Which protocol this transport speaks.
    fn protocol(&self) -> Protocol;

    /// Connect using `reservation`.
    ///
    /// Resolves once the connection is established (WebSocket upgrade
    /// completed, SSE response headers received). Failing to get that far
    /// is an `Err`; failures afterwards arrive through the stream.
    fn open<'a>(&'a self, reservation: &'a Reservation)
    -> BoxFuture<'a, Result<FrameStream, Error>>;
}
