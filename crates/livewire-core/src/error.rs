// ── Core error types ──
//
// Errors surfaced to consumers of the stream client. Attempt failures
// (reservation rejected, socket closed, ...) never show up here: the
// session loop absorbs them into the reconnect policy. What remains is
// construction problems and lifecycle misuse.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Construction errors ──────────────────────────────────────────
    #[error("Invalid backend URL {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("TLS setup failed: {message}")]
    Tls { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Event stream has been stopped")]
    Unmounted,

    #[error("Event stream did not start within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<livewire_api::Error> for CoreError {
    fn from(err: livewire_api::Error) -> Self {
        match err {
            livewire_api::Error::InvalidUrl(ref e) => CoreError::InvalidEndpoint {
                url: "<unparsed>".into(),
                reason: e.to_string(),
            },
            livewire_api::Error::UnsupportedScheme { ref scheme } => CoreError::InvalidEndpoint {
                url: format!("{scheme}://"),
                reason: err.to_string(),
            },
            livewire_api::Error::Tls(message) => CoreError::Tls { message },
            livewire_api::Error::InvalidHeader(message) => CoreError::Config { message },
            livewire_api::Error::Timeout { timeout_ms } => CoreError::Timeout {
                timeout_secs: timeout_ms.div_ceil(1000),
            },
            other => CoreError::Api {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}
