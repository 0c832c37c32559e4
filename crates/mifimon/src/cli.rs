//! Clap derive structures for the `mifimon` CLI.
//!
//! Kept free of crate-internal imports so `build.rs` can include it to
//! render man pages.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// mifimon -- watch who is on your mobile hotspot and how fast they pull
#[derive(Debug, Parser)]
#[command(
    name = "mifimon",
    version,
    about = "Monitor devices connected to a mobile hotspot router",
    long_about = "Polls a mobile hotspot router over its local web interface and reports\n\
        connected devices, per-device transfer speeds, latency and usage totals.",
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
    /// Router profile to use
    #[arg(long, short = 'p', env = "MIFIMON_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Router address (overrides profile)
    #[arg(long, env = "MIFIMON_HOST", global = true)]
    pub host: Option<String>,

    /// Router HTTP port (overrides profile)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Login name (overrides profile)
    #[arg(long, env = "MIFIMON_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "MIFIMON_OUTPUT",
        default_value = "table",
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Request timeout in seconds [default: 5]
    #[arg(long, env = "MIFIMON_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    JsonCompact,
    Yaml,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List connected devices with live transfer speeds
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Show carrier, signal, battery and uptime
    Status,

    /// Usage totals per device for the current day, week or month
    Usage(UsageArgs),

    /// Measure round-trip latency to the router
    #[command(alias = "ping")]
    Latency,

    /// Reboot the router
    Reboot,

    /// Manage CLI configuration and profiles
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Keep polling and redraw on every change (Ctrl-C to stop)
    #[arg(long, short = 'w')]
    pub watch: bool,

    /// Seconds between polls
    #[arg(long, short = 'i', default_value = "2", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,
}

// ── Usage ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct UsageArgs {
    /// Only report this device (MAC address, any case)
    #[arg(long, short = 'm')]
    pub mac: Option<String>,

    /// Calendar window to aggregate over
    #[arg(long, short = 'w', default_value = "day")]
    pub window: WindowArg,

    /// Number of polls to take before summarizing
    #[arg(long, short = 'n', default_value = "3", value_parser = clap::value_parser!(u32).range(1..))]
    pub samples: u32,

    /// Seconds between polls
    #[arg(long, short = 'i', default_value = "2", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WindowArg {
    Day,
    Week,
    Month,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive configuration wizard
    Init,

    /// Display the resolved configuration (passwords masked)
    Show,

    /// Store the router password for a profile in the system keyring
    SetPassword,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
