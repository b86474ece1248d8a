//! Clap derive structures for the `systemon` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// systemon -- poll and control Shure devices behind a SystemOn gateway
#[derive(Debug, Parser)]
#[command(
    name = "systemon",
    version,
    about = "Monitor and control Shure SystemOn fleets from the command line",
    long_about = "Discovers devices behind a Shure SystemOn gateway, maps their\n\
        properties through per-model tables, and drives controls such as\n\
        mute, Dante encryption, reboot and factory reset.",
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
    /// Gateway profile to use
    #[arg(long, short = 'p', env = "SYSTEMON_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Gateway host (overrides profile)
    #[arg(long, short = 'H', env = "SYSTEMON_HOST", global = true)]
    pub host: Option<String>,

    /// Gateway port (overrides profile)
    #[arg(long, env = "SYSTEMON_PORT", global = true)]
    pub port: Option<u16>,

    /// Gateway API key
    #[arg(long, env = "SYSTEMON_API_KEY", global = true, hide_env = true)]
    pub api_key: Option<String>,

    /// Comma-separated device-model filter (overrides profile)
    #[arg(long, env = "SYSTEMON_MODELS", global = true)]
    pub models: Option<String>,

    /// Comma-separated hardware-id filter (overrides profile)
    #[arg(long, env = "SYSTEMON_HARDWARE_IDS", global = true)]
    pub hardware_ids: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SYSTEMON_OUTPUT",
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

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "SYSTEMON_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "SYSTEMON_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect devices behind the gateway
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Apply a control to a device
    #[command(alias = "ctl")]
    Control(ControlArgs),

    /// Show adapter diagnostics after one poll cycle
    #[command(alias = "diag")]
    Diagnostics,

    /// Keep polling and print fleet changes until interrupted
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List discovered devices
    #[command(alias = "ls")]
    List {
        /// Only show devices reported online
        #[arg(long)]
        online: bool,
    },

    /// Show one device with its properties and controls
    Get {
        /// Hardware id
        device: String,
    },
}

// ── Control ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ControlArgs {
    /// Hardware id
    pub device: String,

    /// Control name (Mute, DanteEncryption, BypassAllEq, Reboot, Reset)
    pub property: String,

    /// Value for toggle controls (true/false, on/off, 1/0)
    pub value: Option<String>,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// How often to read the cache, which also keeps polling awake
    #[arg(long, short = 'i', default_value = "5s", value_parser = humantime::parse_duration)]
    pub interval: std::time::Duration,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// Set a value on the active profile
    Set {
        /// Profile key (e.g., "host", "device_models", "metadata_refresh")
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store an API key in the system keyring
    SetKey {
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
