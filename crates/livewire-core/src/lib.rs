// livewire-core: reconnecting event-stream client with listener fan-out.

pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod listeners;
pub mod policy;
pub mod subscription;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{EventStreamClient, StreamState};
pub use config::{ProtocolPreference, ReconnectPolicy, StreamConfig};
pub use error::CoreError;
pub use filter::ChangeFilter;
pub use listeners::ListenerId;
pub use policy::select_protocol;
pub use subscription::EventSubscription;

// Wire types consumers handle directly.
pub use livewire_api::{
    ChangeEvent, EventEndpoints, MessageEvent, Protocol, Reservation, ReservationClient,
    ReservationSource, TlsMode, TransportConfig,
};
