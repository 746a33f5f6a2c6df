//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use livewire_config::ConfigError;
use livewire_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Invalid backend URL {url}: {reason}")]
    #[diagnostic(
        code(livewire::invalid_url),
        help("Use an http:// or https:// API base URL, e.g. https://console.example.com/api/v1")
    )]
    InvalidUrl { url: String, reason: String },

    #[error("TLS setup failed: {message}")]
    #[diagnostic(
        code(livewire::tls_error),
        help(
            "Use --insecure (-k) to accept a self-signed certificate,\n\
             or configure ca_cert in your profile."
        )
    )]
    Tls { message: String },

    #[error("Backend request failed: {message}")]
    #[diagnostic(
        code(livewire::connection_failed),
        help("Check that the backend is running and reachable.\nTry: livewire probe -v")
    )]
    ConnectionFailed { message: String },

    #[error("Backend rejected the request ({status})")]
    #[diagnostic(
        code(livewire::rejected),
        help(
            "Verify the bearer token for profile '{profile}'.\n\
             Run: livewire config set-token --profile {profile}"
        )
    )]
    Rejected { status: u16, profile: String },

    #[error("Event stream was stopped before it started")]
    #[diagnostic(code(livewire::stopped))]
    Stopped,

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Event stream did not start within {seconds}s")]
    #[diagnostic(
        code(livewire::timeout),
        help("Increase the wait with --wait, or run with -v to see each attempt.")
    )]
    Timeout { seconds: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(livewire::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(livewire::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No backend configured")]
    #[diagnostic(
        code(livewire::no_config),
        help(
            "Pass --url (or set LIVEWIRE_URL), or add a profile to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(livewire::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode JSON output: {0}")]
    #[diagnostic(code(livewire::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Tls { .. } | Self::Stopped => {
                exit_code::CONNECTION
            }
            Self::Rejected { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::InvalidUrl { .. }
            | Self::Validation { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidEndpoint { url, reason } => CliError::InvalidUrl { url, reason },
            CoreError::Tls { message } => CliError::Tls { message },
            CoreError::Unmounted => CliError::Stopped,
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Api {
                status: Some(status @ (401 | 403)),
                ..
            } => CliError::Rejected {
                status,
                profile: "current".into(),
            },
            CoreError::Api { message, .. } => CliError::ConnectionFailed { message },
            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            other => CliError::Config(other),
        }
    }
}
