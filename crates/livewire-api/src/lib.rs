// livewire-api: wire layer for the backend change-notification stream

pub mod endpoints;
pub mod error;
pub mod event;
pub mod reservation;
pub mod stream;
pub mod transport;

pub use endpoints::EventEndpoints;
pub use error::Error;
pub use event::{ChangeEvent, Frame, MessageEvent};
pub use reservation::{Reservation, ReservationClient, ReservationSource};
pub use stream::sse::SseTransport;
pub use stream::websocket::WebSocketTransport;
pub use stream::{EventTransport, FrameStream, Protocol};
pub use transport::{TlsMode, TransportConfig};
