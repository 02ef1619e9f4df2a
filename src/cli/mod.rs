//! Command-line interface definitions

use crate::logging::LogFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Network Checker - ping, traceroute, interface inspection and speed testing
#[derive(Parser, Debug, Clone)]
#[command(name = "netcheck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log file path (truncated at start)
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Console log format: console, json or compact
    #[arg(long, global = true, value_name = "FORMAT", value_parser = parse_log_format)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

/// Diagnostic to run
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Send echo probes and report latency, loss and quality
    Ping(PingArgs),
    /// Trace the route to a host, streaming hops as they arrive
    Trace(TraceArgs),
    /// Show hostname, addresses, DNS resolvers and interfaces
    Info,
    /// Measure latency, download and upload throughput
    Speed(SpeedArgs),
    /// List speed-test endpoints and their availability
    Servers(ServersArgs),
    /// Show the effective configuration or write an example .env file
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PingArgs {
    /// IP address or host name
    pub target: String,

    /// Number of probes
    #[arg(short, long)]
    pub count: Option<u32>,

    /// Seconds between probes
    #[arg(short, long, value_parser = parse_interval)]
    pub interval: Option<u64>,

    /// Use TCP connect probes instead of the system ping utility
    #[arg(long)]
    pub tcp: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TraceArgs {
    /// IP address or host name
    pub target: String,

    /// Maximum number of hops
    #[arg(short = 'm', long)]
    pub max_hops: Option<u32>,

    /// Overall timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct SpeedArgs {
    /// Endpoint name as listed by `servers`
    #[arg(short, long)]
    pub server: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ServersArgs {
    /// Check every endpoint before listing
    #[arg(short, long)]
    pub refresh: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Write an example .env file to PATH
    #[arg(long, value_name = "PATH")]
    pub write_example: Option<PathBuf>,

    /// Describe supported environment variables
    #[arg(long)]
    pub env_help: bool,
}

impl Cli {
    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.no_color {
            false
        } else {
            supports_color()
        }
    }

    /// Short name of the selected subcommand, for logging
    pub fn command_name(&self) -> &'static str {
        match self.command {
            Command::Ping(_) => "ping",
            Command::Trace(_) => "trace",
            Command::Info => "info",
            Command::Speed(_) => "speed",
            Command::Servers(_) => "servers",
            Command::Config(_) => "config",
        }
    }
}

/// Parse a probe interval in whole seconds
fn parse_interval(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid interval: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid interval: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Interval must be at least 1 second".to_string())
            } else if secs > 10 {
                Err("Interval cannot exceed 10 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    s.parse::<LogFormat>().map_err(|e| e.to_string())
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
