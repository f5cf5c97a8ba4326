//! CLI argument definitions using clap.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use contracts::StartMarker;
use std::path::PathBuf;

/// Export Stream - bounded-concurrency dispatcher for build-export feeds
#[derive(Parser, Debug)]
#[command(
    name = "export-stream",
    author,
    version,
    about = "Build-export event stream dispatcher",
    long_about = "A bounded-concurrency dispatcher for build-export event streams.\n\n\
                  Subscribes to a server's build announcement feed, opens a filtered \n\
                  per-build event feed for each announced build, and routes typed events \n\
                  to the configured handlers."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EXPORT_STREAM_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EXPORT_STREAM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the stream subscription
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "EXPORT_STREAM_CONFIG"
    )]
    pub config: PathBuf,

    /// Override export server base URL from configuration
    #[arg(long, env = "EXPORT_STREAM_SERVER_URL")]
    pub server_url: Option<String>,

    /// Override start marker ("now", epoch milliseconds, or RFC 3339)
    #[arg(long, env = "EXPORT_STREAM_SINCE")]
    pub since: Option<String>,

    /// Override the concurrency ceiling from configuration
    #[arg(long, env = "EXPORT_STREAM_MAX_CONCURRENT")]
    pub max_concurrent: Option<usize>,

    /// Stop after this many builds reach terminal state (0 = unlimited)
    #[arg(long, default_value = "0", env = "EXPORT_STREAM_MAX_BUILDS")]
    pub max_builds: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "EXPORT_STREAM_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without subscribing
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "EXPORT_STREAM_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show detailed handler capability information
    #[arg(long)]
    pub handlers: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Parse a start marker from CLI input.
///
/// Accepts the config-file forms ("now", epoch milliseconds) plus RFC 3339
/// instants for convenience.
pub fn parse_start_marker(s: &str) -> Result<StartMarker> {
    if let Ok(marker) = s.parse::<StartMarker>() {
        return Ok(marker);
    }

    let instant = chrono::DateTime::parse_from_rfc3339(s).map_err(|e| {
        anyhow::anyhow!(
            "invalid start marker '{s}': expected 'now', epoch milliseconds or RFC 3339 ({e})"
        )
    })?;
    Ok(StartMarker::Millis(instant.timestamp_millis()))
}
