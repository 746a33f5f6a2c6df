//! Config subcommand handlers.

use livewire_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

/// Replace plaintext tokens before the config is echoed anywhere.
fn redact(cfg: &mut Config) {
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(REDACTED.into());
        }
    }
}

fn render_config(cfg: &Config, format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Text => toml::to_string_pretty(cfg).map_err(|e| CliError::Validation {
            field: "config".into(),
            reason: format!("failed to serialize config: {e}"),
        }),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(cfg)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(cfg)?),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(global);

    match args.command {
        ConfigCommand::Show => {
            let mut cfg = config::load(global)?;
            redact(&mut cfg);
            let rendered = render_config(&cfg, global.output)?;
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load(global)?;
            let active = config::active_profile_name(global, &cfg);
            let mut names: Vec<&String> = cfg.profiles.keys().collect();
            names.sort();

            let rendered = match global.output {
                OutputFormat::Text => names
                    .iter()
                    .map(|name| {
                        let marker = if **name == active { "*" } else { " " };
                        format!("{marker} {name}")
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
                OutputFormat::Json => serde_json::to_string_pretty(&names)?,
                OutputFormat::JsonCompact => serde_json::to_string(&names)?,
            };
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { ref name } => {
            let mut cfg = config::load(global)?;
            if !cfg.profiles.contains_key(name) {
                return Err(CliError::ProfileNotFound {
                    name: name.clone(),
                    available: config::available_profiles(&cfg),
                });
            }
            cfg.default_profile = Some(name.clone());
            livewire_config::save_config_to(&cfg, &path)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetToken { ref profile } => {
            let cfg = config::load(global)?;
            let name = profile
                .clone()
                .unwrap_or_else(|| config::active_profile_name(global, &cfg));

            let token = rpassword::prompt_password(format!("Bearer token for '{name}': "))?;
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "token cannot be empty".into(),
                });
            }
            livewire_config::store_token(&name, &token)?;
            if !global.quiet {
                eprintln!("Token for '{name}' stored in system keyring");
            }
            Ok(())
        }
    }
}
