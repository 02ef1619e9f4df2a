//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::{Cli, Command},
    config::env::EnvManager,
    error::Result,
    models::Config,
    types::ProbeMethod,
};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        if self.cli.no_color {
            config.enable_color = false;
        }

        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;

        if let Some(path) = &self.cli.log_file {
            config.log_file = path.to_string_lossy().into_owned();
        }

        if let Some(format) = self.cli.log_format {
            config.log_format = format;
        }

        match &self.cli.command {
            Command::Ping(args) => {
                if let Some(count) = args.count {
                    config.ping_count = count;
                }
                if let Some(interval) = args.interval {
                    config.ping_interval_secs = interval;
                }
                if args.tcp {
                    config.probe_method = ProbeMethod::Tcp;
                }
            }
            Command::Trace(args) => {
                if let Some(max_hops) = args.max_hops {
                    config.max_hops = max_hops;
                }
                if let Some(timeout) = args.timeout {
                    config.trace_timeout_seconds = timeout;
                }
            }
            Command::Speed(args) => {
                if let Some(server) = &args.server {
                    config.speedtest_server = server.clone();
                }
            }
            Command::Info | Command::Servers(_) | Command::Config(_) => {}
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Ping Count: {}", config.ping_count));
    summary.push(format!("Ping Interval: {}s", config.ping_interval_secs));
    summary.push(format!("Probe Method: {}", config.probe_method));
    summary.push(format!("Max Hops: {}", config.max_hops));
    summary.push(format!("Trace Timeout: {}s", config.trace_timeout_seconds));
    summary.push(format!("Speed Test Server: {}", config.speedtest_server));
    summary.push(format!("HTTP Timeout: {}s", config.http_timeout_seconds));
    summary.push(format!("Workers: {}", config.workers));
    summary.push(format!("Log File: {}", config.log_file));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Log Format: {}", config.log_format));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use clap::Parser;

    #[test]
    fn test_cli_overrides_for_ping() {
        let cli = Cli::parse_from(["netcheck", "--no-color", "--verbose", "ping", "1.1.1.1", "-c", "7", "--tcp"]);
        let mut config = Config::default();
        ConfigParser::new(cli).apply_cli_overrides(&mut config);

        assert_eq!(config.ping_count, 7);
        assert_eq!(config.probe_method, ProbeMethod::Tcp);
        assert!(!config.enable_color);
        assert!(config.verbose);
        assert!(!config.debug);
    }

    #[test]
    fn test_cli_overrides_for_trace_and_log_file() {
        let cli = Cli::parse_from(["netcheck", "--log-file", "trace.log", "trace", "example.com", "-m", "8", "-t", "20"]);
        let mut config = Config::default();
        ConfigParser::new(cli).apply_cli_overrides(&mut config);

        assert_eq!(config.max_hops, 8);
        assert_eq!(config.trace_timeout_seconds, 20);
        assert_eq!(config.log_file, "trace.log");
        assert_eq!(config.log_format, LogFormat::Console);
    }

    #[test]
    fn test_log_format_override() {
        let cli = Cli::parse_from(["netcheck", "--log-format", "compact", "info"]);
        let mut config = Config { log_format: LogFormat::Json, ..Default::default() };
        ConfigParser::new(cli).apply_cli_overrides(&mut config);

        assert_eq!(config.log_format, LogFormat::Compact);
    }

    #[test]
    fn test_absent_flags_keep_existing_values() {
        let cli = Cli::parse_from(["netcheck", "ping", "1.1.1.1"]);
        let mut config = Config { ping_count: 9, ..Default::default() };
        ConfigParser::new(cli).apply_cli_overrides(&mut config);

        assert_eq!(config.ping_count, 9);
        assert_eq!(config.probe_method, ProbeMethod::System);
    }

    #[test]
    fn test_speed_server_override() {
        let cli = Cli::parse_from(["netcheck", "speed", "--server", "Google (Global CDN)"]);
        let mut config = Config::default();
        ConfigParser::new(cli).apply_cli_overrides(&mut config);

        assert_eq!(config.speedtest_server, "Google (Global CDN)");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_summary() {
        let summary = display_config_summary(&Config::default());

        assert!(summary.contains("Ping Count: 4"));
        assert!(summary.contains("Max Hops: 30"));
        assert!(summary.contains("Speed Test Server: Automatic (Recommended)"));
        assert!(summary.contains("Log File: network_checker.log"));
    }
}
