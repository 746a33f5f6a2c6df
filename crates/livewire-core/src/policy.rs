// ── Protocol selection ──
//
// Which transport the next attempt uses. Pure function of the pin, the
// sticky preference, and the retry counter so it can be tested without a
// runtime.

use livewire_api::Protocol;

use crate::config::ProtocolPreference;

/// Pick the protocol for the next attempt.
///
/// A pinned preference always wins. Otherwise the protocol that last
/// delivered a frame is reused; with no such protocol the choice
/// alternates on retry parity (even: WebSocket, odd: SSE).
pub fn select_protocol(
    preference: ProtocolPreference,
    preferred: Option<Protocol>,
    retries: u32,
) -> Protocol {
    match (preference, preferred) {
        (ProtocolPreference::WebSocketOnly, _) => Protocol::WebSocket,
        (ProtocolPreference::SseOnly, _) => Protocol::Sse,
        (ProtocolPreference::Auto, Some(protocol)) => protocol,
        (ProtocolPreference::Auto, None) if retries % 2 == 0 => Protocol::WebSocket,
        (ProtocolPreference::Auto, None) => Protocol::Sse,
    }
}
