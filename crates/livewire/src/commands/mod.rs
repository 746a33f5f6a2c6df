//! Command dispatch: bridges CLI args -> the stream client -> output.

pub mod config_cmd;
pub mod probe;
pub mod reserve;
pub mod tail;

use livewire_config::ResolvedProfile;
use livewire_core::{EventStreamClient, ReservationClient};

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    match cmd {
        Command::Tail(args) => {
            let profile = config::resolve(global, &cfg, args.protocol)?;
            tail::handle(&connect(&profile)?, &args, global).await
        }
        Command::Probe(args) => {
            let profile = config::resolve(global, &cfg, args.protocol)?;
            probe::handle(&connect(&profile)?, &args, global).await
        }
        Command::Reserve => {
            let profile = config::resolve(global, &cfg, None)?;
            let client = ReservationClient::new(profile.endpoints.clone(), &profile.transport)
                .map_err(livewire_core::CoreError::from)?;
            reserve::handle(&client, &profile, global).await
        }
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}

fn connect(profile: &ResolvedProfile) -> Result<EventStreamClient, CliError> {
    tracing::debug!(
        profile = %profile.name,
        url = %profile.endpoints.base_url(),
        protocol = %profile.stream.protocol,
        "building stream client"
    );
    Ok(EventStreamClient::connect_to(
        profile.endpoints.clone(),
        &profile.transport,
        profile.stream.clone(),
    )?)
}
