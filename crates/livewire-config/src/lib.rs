//! Configuration for the livewire CLI.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to the runtime types `livewire_core` consumes:
//! `EventEndpoints`, `TransportConfig` and `StreamConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use livewire_core::{
    EventEndpoints, ProtocolPreference, ReconnectPolicy, StreamConfig, TlsMode, TransportConfig,
};

/// Keyring service name tokens are stored under.
pub const KEYRING_SERVICE: &str = "livewire";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default)]
    pub insecure: bool,

    /// Connect / handshake timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// A named backend profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// API base URL, e.g. "https://console.example.com/api/v1".
    pub url: String,

    /// Bearer token (plaintext -- prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the bearer token.
    pub token_env: Option<String>,

    /// Extra headers sent on every request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// "auto", "websocket" or "sse".
    pub protocol: Option<ProtocolPreference>,

    /// Failures retried almost immediately before backing off.
    pub fast_retries: Option<u32>,

    pub fast_delay_ms: Option<u64>,

    pub retry_delay_ms: Option<u64>,

    /// Time box for reservation + transport open, per attempt.
    pub attempt_timeout_secs: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "livewire", "livewire").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("livewire");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from `path` + environment.
///
/// A missing file is not an error. Environment variables use the
/// `LIVEWIRE_` prefix with `__` as the nesting separator, e.g.
/// `LIVEWIRE_DEFAULTS__TIMEOUT=5` or `LIVEWIRE_PROFILES__PROD__URL=...`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LIVEWIRE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parent directories.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile selection ───────────────────────────────────────────────

/// Pick a profile: `requested`, else the configured default.
pub fn select_profile<'a>(
    config: &'a Config,
    requested: Option<&str>,
) -> Result<(&'a str, &'a Profile), ConfigError> {
    let name = requested
        .or(config.default_profile.as_deref())
        .unwrap_or("default");

    config
        .profiles
        .get_key_value(name)
        .map(|(k, v)| (k.as_str(), v))
        .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
}

// ── Token resolution ────────────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Resolve the bearer token from the credential chain.
///
/// `token_env` variable, then the system keyring, then plaintext in the
/// profile. `None` when nothing is configured; the backend may accept
/// anonymous reservations.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    profile.token.clone().map(SecretString::from)
}

/// Store a token in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?
        .set_password(token)
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

// ── Translation to runtime types ────────────────────────────────────

/// Everything needed to build an `EventStreamClient`.
#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    pub name: String,
    pub endpoints: EventEndpoints,
    pub transport: TransportConfig,
    pub stream: StreamConfig,
}

/// Build runtime config from a profile -- no CLI flag overrides.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ResolvedProfile, ConfigError> {
    let endpoints = EventEndpoints::parse(&profile.url).map_err(|e| ConfigError::Validation {
        field: "url".into(),
        reason: format!("{}: {e}", profile.url),
    })?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    let mut headers: Vec<(String, String)> = profile
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    headers.sort();

    let transport = TransportConfig {
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        bearer_token: resolve_token(profile, profile_name),
        headers,
        cookie_jar: None,
    };

    let base = ReconnectPolicy::default();
    let reconnect = ReconnectPolicy {
        fast_retries: profile.fast_retries.unwrap_or(base.fast_retries),
        fast_delay: profile
            .fast_delay_ms
            .map_or(base.fast_delay, Duration::from_millis),
        retry_delay: profile
            .retry_delay_ms
            .map_or(base.retry_delay, Duration::from_millis),
    };

    let stream = StreamConfig {
        reconnect,
        protocol: profile.protocol.unwrap_or_default(),
        attempt_timeout: profile.attempt_timeout_secs.map(Duration::from_secs),
    };

    Ok(ResolvedProfile {
        name: profile_name.into(),
        endpoints,
        transport,
        stream,
    })
}

// ── Tests ───────────────────────────────────────────────────────────
