//! Output formatting for stream events: text lines or JSON documents.
//!
//! Text output is one line per event, colored when stdout is a terminal.
//! JSON output tags each record with `type` and a receive timestamp so
//! a stream of compact documents can be piped into `jq`.

use std::io::{self, IsTerminal, Write};

use chrono::{SecondsFormat, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;

use livewire_core::{ChangeEvent, MessageEvent, StreamState};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Renders events for one output format.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    format: OutputFormat,
    color: bool,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Record<'a> {
    Change {
        at: String,
        #[serde(flatten)]
        event: &'a ChangeEvent,
    },
    Message {
        at: String,
        #[serde(flatten)]
        event: &'a MessageEvent,
    },
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Renderer {
    pub fn new(format: OutputFormat, color: bool) -> Self {
        Self { format, color }
    }

    pub fn change(&self, event: &ChangeEvent) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Text => Ok(self.change_text(&now(), event)),
            _ => self.json(&Record::Change { at: now(), event }),
        }
    }

    pub fn message(&self, event: &MessageEvent) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Text => Ok(self.message_text(&now(), event)),
            _ => self.json(&Record::Message { at: now(), event }),
        }
    }

    fn json<T: Serialize>(&self, record: &T) -> Result<String, CliError> {
        let rendered = if self.format == OutputFormat::JsonCompact {
            serde_json::to_string(record)?
        } else {
            serde_json::to_string_pretty(record)?
        };
        Ok(rendered)
    }

    fn change_text(&self, at: &str, event: &ChangeEvent) -> String {
        let target = format!("{}/{}", event.kind, event.id);
        if !self.color {
            return format!("{at}  {:<8} {target}", event.action);
        }
        let action = format!("{:<8}", event.action);
        let action = match event.action.as_str() {
            "created" => action.green().to_string(),
            "deleted" => action.red().to_string(),
            _ => action.yellow().to_string(),
        };
        format!("{}  {action} {}", at.dimmed(), target.bold())
    }

    fn message_text(&self, at: &str, event: &MessageEvent) -> String {
        let label = if event.is_connected() { "connected" } else { "message" };
        let body = if event.is_connected() { "" } else { event.data.as_str() };
        let line = if self.color {
            format!("{}  {} {body}", at.dimmed(), format!("{label:<8}").cyan())
        } else {
            format!("{at}  {label:<8} {body}")
        };
        line.trim_end().to_owned()
    }
}

/// One-line description of a lifecycle transition, for stderr.
pub fn describe_state(state: &StreamState) -> String {
    match state {
        StreamState::Idle => "idle".into(),
        StreamState::Starting { attempt, protocol } => {
            format!("connecting over {protocol} (attempt {attempt})")
        }
        StreamState::Started { protocol } => format!("streaming over {protocol}"),
        StreamState::Failed { attempt, retry_in } => {
            format!("attempt {attempt} failed, retrying in {}ms", retry_in.as_millis())
        }
        StreamState::Unmounted => "stopped".into(),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    // Broken pipe (e.g. `| head`) is not worth reporting.
    let _ = writeln!(stdout, "{output}");
    let _ = stdout.flush();
}
