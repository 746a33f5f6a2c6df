//! CLI glue over `livewire_config`: which file, which profile, and how
//! command-line flags override what the profile says.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use livewire_config::{Config, Profile, ResolvedProfile};
use livewire_core::{EventEndpoints, ProtocolPreference, TlsMode};

use crate::cli::{GlobalOpts, ProtocolArg};
use crate::error::CliError;

/// Config file in effect: `--config` / `LIVEWIRE_CONFIG`, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(livewire_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(livewire_config::load_config_from(&config_path(global))?)
}

/// `--profile`, else the configured default, else `"default"`.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    names.sort_unstable();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

impl From<ProtocolArg> for ProtocolPreference {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Auto => Self::Auto,
            ProtocolArg::Websocket => Self::WebSocketOnly,
            ProtocolArg::Sse => Self::SseOnly,
        }
    }
}

/// Resolve the profile to connect with, applying flag overrides.
///
/// Without a matching profile the connection is built from `--url` and
/// friends alone; an explicitly requested profile that doesn't exist is
/// an error either way.
pub fn resolve(
    global: &GlobalOpts,
    cfg: &Config,
    protocol: Option<ProtocolArg>,
) -> Result<ResolvedProfile, CliError> {
    let name = active_profile_name(global, cfg);

    let mut resolved = if let Some(profile) = cfg.profiles.get(&name) {
        livewire_config::resolve_profile(profile, &name, &cfg.defaults)?
    } else if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name,
            available: available_profiles(cfg),
        });
    } else {
        let url = global.url.clone().ok_or_else(|| CliError::NoConfig {
            path: config_path(global).display().to_string(),
        })?;
        let adhoc = Profile {
            url,
            ..Profile::default()
        };
        livewire_config::resolve_profile(&adhoc, &name, &cfg.defaults)?
    };

    apply_overrides(&mut resolved, global, protocol)?;
    Ok(resolved)
}

fn apply_overrides(
    resolved: &mut ResolvedProfile,
    global: &GlobalOpts,
    protocol: Option<ProtocolArg>,
) -> Result<(), CliError> {
    if let Some(ref url) = global.url {
        resolved.endpoints = EventEndpoints::parse(url).map_err(|e| CliError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
    }
    if let Some(ref token) = global.token {
        resolved.transport.bearer_token = Some(SecretString::from(token.clone()));
    }
    if global.insecure {
        resolved.transport.tls = TlsMode::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        resolved.transport.timeout = Duration::from_secs(secs);
    }
    if let Some(protocol) = protocol {
        resolved.stream.protocol = protocol.into();
    }
    Ok(())
}
