//! `livewire reserve`: run the reservation handshake on its own.

use serde_json::json;

use livewire_config::ResolvedProfile;
use livewire_core::{CoreError, ReservationClient};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    client: &ReservationClient,
    profile: &ResolvedProfile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let reservation = client.fetch().await.map_err(|e| match e.status() {
        Some(status @ (401 | 403)) if e.is_rejection() => CliError::Rejected {
            status,
            profile: profile.name.clone(),
        },
        _ => CliError::from(CoreError::from(e)),
    })?;
    tracing::info!(profile = %profile.name, "reservation granted");

    let rendered = match global.output {
        OutputFormat::Text => reservation.as_str().to_owned(),
        OutputFormat::Json => serde_json::to_string_pretty(&json!({ "data": reservation.as_str() }))?,
        OutputFormat::JsonCompact => serde_json::to_string(&json!({ "data": reservation.as_str() }))?,
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}
