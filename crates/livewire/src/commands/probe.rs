//! `livewire probe`: bring the stream up once and report how.

use std::time::Duration;

use serde_json::json;

use livewire_core::EventStreamClient;

use crate::cli::{GlobalOpts, OutputFormat, ProbeArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    client: &EventStreamClient,
    args: &ProbeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    client.start();
    let started = client.wait_started(Some(Duration::from_secs(args.wait))).await;
    let retries = client.retries();
    client.stop();
    let protocol = started?;

    let rendered = match global.output {
        OutputFormat::Text => format!("connected over {protocol}"),
        OutputFormat::Json => {
            serde_json::to_string_pretty(&json!({ "protocol": protocol, "retries": retries }))?
        }
        OutputFormat::JsonCompact => {
            serde_json::to_string(&json!({ "protocol": protocol, "retries": retries }))?
        }
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}
