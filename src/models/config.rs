//! Configuration data model and validation

use crate::error::{AppError, Result};
use crate::logging::LogFormat;
use crate::types::ProbeMethod;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of echo probes per ping run
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,

    /// Seconds between echo probes
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// How echo probes are sent
    #[serde(default)]
    pub probe_method: ProbeMethod,

    /// Hop limit passed to the route tracer
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,

    /// Overall deadline for a trace run
    #[serde(default = "default_trace_timeout_secs")]
    pub trace_timeout_seconds: u64,

    /// Selected speed-test endpoint name
    #[serde(default = "default_speedtest_server")]
    pub speedtest_server: String,

    /// Read timeout for download/upload transfers
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_seconds: u64,

    /// Worker pool size
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Path of the text log file (truncated at start)
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Format of log lines echoed to the console
    #[serde(default)]
    pub log_format: LogFormat,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ping_count: default_ping_count(),
            ping_interval_secs: default_ping_interval_secs(),
            probe_method: ProbeMethod::default(),
            max_hops: default_max_hops(),
            trace_timeout_seconds: default_trace_timeout_secs(),
            speedtest_server: default_speedtest_server(),
            http_timeout_seconds: default_http_timeout_secs(),
            workers: default_workers(),
            log_file: default_log_file(),
            enable_color: default_enable_color(),
            log_format: LogFormat::default(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn trace_timeout(&self) -> Duration {
        Duration::from_secs(self.trace_timeout_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.ping_count) {
            return Err(AppError::config(format!(
                "ping_count must be between 1 and 100, got {}",
                self.ping_count
            )));
        }

        if !(1..=10).contains(&self.ping_interval_secs) {
            return Err(AppError::config(format!(
                "ping_interval_secs must be between 1 and 10, got {}",
                self.ping_interval_secs
            )));
        }

        if !(1..=64).contains(&self.max_hops) {
            return Err(AppError::config(format!(
                "max_hops must be between 1 and 64, got {}",
                self.max_hops
            )));
        }

        if !(1..=600).contains(&self.trace_timeout_seconds) {
            return Err(AppError::config(format!(
                "trace_timeout_seconds must be between 1 and 600, got {}",
                self.trace_timeout_seconds
            )));
        }

        if !(1..=300).contains(&self.http_timeout_seconds) {
            return Err(AppError::config(format!(
                "http_timeout_seconds must be between 1 and 300, got {}",
                self.http_timeout_seconds
            )));
        }

        if !(1..=32).contains(&self.workers) {
            return Err(AppError::config(format!(
                "workers must be between 1 and 32, got {}",
                self.workers
            )));
        }

        if self.log_file.trim().is_empty() {
            return Err(AppError::config("log_file cannot be empty"));
        }

        if !crate::speedtest::endpoints::is_known_endpoint(&self.speedtest_server) {
            return Err(AppError::config(format!(
                "speedtest_server '{}' is not a known endpoint",
                self.speedtest_server
            )));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("PING_COUNT") {
            self.ping_count = value.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PING_COUNT value '{}': {}", value, e)))?;
        }

        if let Ok(value) = std::env::var("PING_INTERVAL") {
            self.ping_interval_secs = value.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PING_INTERVAL value '{}': {}", value, e)))?;
        }

        if let Ok(value) = std::env::var("PROBE_METHOD") {
            self.probe_method = value.parse()
                .map_err(|e: AppError| AppError::config(format!("Invalid PROBE_METHOD value '{}': {}", value, e)))?;
        }

        if let Ok(value) = std::env::var("MAX_HOPS") {
            self.max_hops = value.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid MAX_HOPS value '{}': {}", value, e)))?;
        }

        if let Ok(value) = std::env::var("TRACE_TIMEOUT_SECONDS") {
            self.trace_timeout_seconds = value.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid TRACE_TIMEOUT_SECONDS value '{}': {}", value, e)))?;
        }

        if let Ok(value) = std::env::var("SPEEDTEST_SERVER") {
            self.speedtest_server = value.trim().to_string();
        }

        if let Ok(value) = std::env::var("HTTP_TIMEOUT_SECONDS") {
            self.http_timeout_seconds = value.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid HTTP_TIMEOUT_SECONDS value '{}': {}", value, e)))?;
        }

        if let Ok(value) = std::env::var("WORKERS") {
            self.workers = value.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid WORKERS value '{}': {}", value, e)))?;
        }

        if let Ok(value) = std::env::var("LOG_FILE") {
            self.log_file = value.trim().to_string();
        }

        if let Ok(value) = std::env::var("ENABLE_COLOR") {
            self.enable_color = value.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
        }

        if let Ok(value) = std::env::var("LOG_FORMAT") {
            self.log_format = value.parse()
                .map_err(|e: AppError| AppError::config(format!("Invalid LOG_FORMAT value '{}': {}", value, e)))?;
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_ping_count() -> u32 {
    crate::defaults::DEFAULT_PING_COUNT
}

fn default_ping_interval_secs() -> u64 {
    crate::defaults::DEFAULT_PING_INTERVAL_SECS
}

fn default_max_hops() -> u32 {
    crate::defaults::DEFAULT_MAX_HOPS
}

fn default_trace_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_TRACE_TIMEOUT.as_secs()
}

fn default_speedtest_server() -> String {
    crate::defaults::DEFAULT_SPEEDTEST_SERVER.to_string()
}

fn default_http_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_HTTP_TIMEOUT.as_secs()
}

fn default_workers() -> usize {
    crate::defaults::DEFAULT_WORKERS
}

fn default_log_file() -> String {
    crate::defaults::DEFAULT_LOG_FILE.to_string()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ping_count, 4);
        assert_eq!(config.max_hops, 30);
        assert_eq!(config.trace_timeout(), Duration::from_secs(60));
        assert_eq!(config.workers, 4);
        assert_eq!(config.log_file, "network_checker.log");
    }

    #[test]
    fn test_zero_ping_count_invalid() {
        let config = Config { ping_count: 0, ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ping_count"));
    }

    #[test]
    fn test_hop_limit_bounds() {
        assert!(Config { max_hops: 64, ..Default::default() }.validate().is_ok());
        assert!(Config { max_hops: 65, ..Default::default() }.validate().is_err());
    }

    #[test]
    fn test_unknown_speedtest_server_invalid() {
        let config = Config {
            speedtest_server: "Nowhere CDN".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.category(), "CONFIG");
        assert!(err.to_string().contains("Nowhere CDN"));
    }

    #[test]
    fn test_empty_log_file_invalid() {
        let config = Config { log_file: "  ".to_string(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"ping_count": 10, "probe_method": "tcp"}"#).unwrap();
        assert_eq!(config.ping_count, 10);
        assert_eq!(config.probe_method, ProbeMethod::Tcp);
        assert_eq!(config.speedtest_server, crate::defaults::DEFAULT_SPEEDTEST_SERVER);
        assert!(config.enable_color);
    }
}
