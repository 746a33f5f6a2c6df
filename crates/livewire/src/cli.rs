//! Clap derive structures for the `livewire` CLI.
//!
//! Kept free of workspace crates so `build.rs` can include it for man
//! page generation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// livewire -- follow a backend change-notification stream
#[derive(Debug, Parser)]
#[command(
    name = "livewire",
    version,
    about = "Follow a backend change-notification stream from the command line",
    long_about = "Reserves a stream on the backend and follows it over WebSocket or\n\
        Server-Sent Events, reconnecting and switching protocols as needed.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "LIVEWIRE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API base URL (overrides profile)
    #[arg(long, short = 'u', env = "LIVEWIRE_URL", global = true)]
    pub url: Option<String>,

    /// Bearer token (overrides profile)
    #[arg(long, env = "LIVEWIRE_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Config file to read instead of the default location
    #[arg(long, env = "LIVEWIRE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LIVEWIRE_OUTPUT",
        default_value = "text",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "LIVEWIRE_INSECURE", global = true)]
    pub insecure: bool,

    /// Connect timeout in seconds (overrides profile)
    #[arg(long, env = "LIVEWIRE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One human-readable line per event (default)
    Text,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON, one document per line
    JsonCompact,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Transport selection from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProtocolArg {
    /// Alternate between WebSocket and SSE, sticking with what works
    Auto,
    /// WebSocket only
    #[value(alias = "ws")]
    Websocket,
    /// Server-Sent Events only
    Sse,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow the stream and print events as they arrive
    #[command(alias = "watch")]
    Tail(TailArgs),

    /// Connect once, report which protocol came up, and exit
    Probe(ProbeArgs),

    /// Request a stream reservation and print its token
    Reserve,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Stream commands ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TailArgs {
    /// Transport to use (overrides profile)
    #[arg(long, short = 'P')]
    pub protocol: Option<ProtocolArg>,

    /// Only show changes to these resource kinds (comma-separated)
    #[arg(long, short = 'K', value_delimiter = ',')]
    pub kind: Vec<String>,

    /// Only show changes with this action (created, updated, deleted, ...)
    #[arg(long, short = 'a')]
    pub action: Option<String>,

    /// Only show changes to the resource with this id
    #[arg(long)]
    pub id: Option<String>,

    /// Also print generic messages, including the connected greeting
    #[arg(long, short = 'm')]
    pub messages: bool,

    /// Print connection state transitions to stderr
    #[arg(long)]
    pub state: bool,

    /// Exit after this many events
    #[arg(long, short = 'n')]
    pub count: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Transport to use (overrides profile)
    #[arg(long, short = 'P')]
    pub protocol: Option<ProtocolArg>,

    /// Seconds to wait for the stream to come up
    #[arg(long, short = 'w', default_value = "15")]
    pub wait: u64,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a bearer token in the system keyring
    SetToken {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
