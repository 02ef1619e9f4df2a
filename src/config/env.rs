//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::logging::LogFormat;
use crate::types::ProbeMethod;
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        if Path::new(".env").exists() {
            dotenv::from_filename(".env")
                .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;

            if debug {
                eprintln!("Loaded configuration from .env file");
            }
        } else if debug {
            eprintln!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Network Checker Configuration
#
# Values here are used as defaults and can be overridden by
# environment variables and command-line arguments.

# Echo probes per ping run (1-100)
# PING_COUNT=4

# Seconds between echo probes (1-10)
# PING_INTERVAL=1

# Probe method: system (ping utility) or tcp (connect handshake)
# PROBE_METHOD=system

# Hop limit for traceroute (1-64)
# MAX_HOPS=30

# Overall traceroute deadline in seconds (1-600)
# TRACE_TIMEOUT_SECONDS=60

# Speed-test endpoint, as listed by `netcheck servers`
# SPEEDTEST_SERVER=Automatic (Recommended)

# Download/upload read timeout in seconds (1-300)
# HTTP_TIMEOUT_SECONDS=15

# Background worker count (1-32)
# WORKERS=4

# Log file, truncated at every start
# LOG_FILE=network_checker.log

# Enable colored output (true/false)
# ENABLE_COLOR=true

# Console log format: console, json or compact
# LOG_FORMAT=console
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))?;

        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        fn bounded(key: &str, value: &str, min: u64, max: u64) -> Result<()> {
            let parsed: u64 = value.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            if parsed < min || parsed > max {
                return Err(AppError::config(format!(
                    "{} must be between {} and {}, got: {}",
                    key, min, max, parsed
                )));
            }
            Ok(())
        }

        match key {
            "PING_COUNT" => bounded(key, value, 1, 100)?,
            "PING_INTERVAL" => bounded(key, value, 1, 10)?,
            "MAX_HOPS" => bounded(key, value, 1, 64)?,
            "TRACE_TIMEOUT_SECONDS" => bounded(key, value, 1, 600)?,
            "HTTP_TIMEOUT_SECONDS" => bounded(key, value, 1, 300)?,
            "WORKERS" => bounded(key, value, 1, 32)?,
            "PROBE_METHOD" => {
                value.parse::<ProbeMethod>()
                    .map_err(|e| AppError::config(format!("Invalid PROBE_METHOD value '{}': {}", value, e)))?;
            }
            "SPEEDTEST_SERVER" => {
                if !crate::speedtest::endpoints::is_known_endpoint(value.trim()) {
                    return Err(AppError::config(format!("Unknown SPEEDTEST_SERVER '{}'", value)));
                }
            }
            "LOG_FILE" => {
                if value.trim().is_empty() {
                    return Err(AppError::config("LOG_FILE cannot be empty"));
                }
            }
            "ENABLE_COLOR" => {
                value.trim().parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            "LOG_FORMAT" => {
                value.parse::<LogFormat>()
                    .map_err(|e| AppError::config(format!("Invalid LOG_FORMAT value '{}': {}", value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("PING_COUNT", "Echo probes per ping run (1-100)", "4"),
            ("PING_INTERVAL", "Seconds between probes (1-10)", "1"),
            ("PROBE_METHOD", "system or tcp", "system"),
            ("MAX_HOPS", "Traceroute hop limit (1-64)", "30"),
            ("TRACE_TIMEOUT_SECONDS", "Traceroute deadline in seconds (1-600)", "60"),
            ("SPEEDTEST_SERVER", "Speed-test endpoint name", "Cloudflare (Global CDN)"),
            ("HTTP_TIMEOUT_SECONDS", "Transfer read timeout in seconds (1-300)", "15"),
            ("WORKERS", "Background worker count (1-32)", "4"),
            ("LOG_FILE", "Log file path", "network_checker.log"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
            ("LOG_FORMAT", "Console log format: console, json or compact", "json"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<22} {}\n", var, description));
            help.push_str(&format!("  {:<22} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        let mut warnings = Vec::new();

        for (var_name, _, _) in Self::get_supported_env_vars() {
            if let Ok(value) = std::env::var(var_name) {
                if let Err(e) = Self::validate_env_var(var_name, &value) {
                    warnings.push(format!("Warning: {}", e));
                }
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_example_content_lists_every_variable() {
        let content = EnvManager::create_example_env_content();
        for (var, _, _) in EnvManager::get_supported_env_vars() {
            assert!(content.contains(&format!("{}=", var)), "missing {}", var);
        }
    }

    #[test]
    fn test_save_example_file() {
        let temp_file = NamedTempFile::new().unwrap();
        EnvManager::save_example_env_file(temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("Network Checker Configuration"));
    }

    #[test]
    fn test_validate_env_var() {
        assert!(EnvManager::validate_env_var("PING_COUNT", "4").is_ok());
        assert!(EnvManager::validate_env_var("PING_INTERVAL", "10").is_ok());
        assert!(EnvManager::validate_env_var("PROBE_METHOD", "tcp").is_ok());
        assert!(EnvManager::validate_env_var("MAX_HOPS", "64").is_ok());
        assert!(EnvManager::validate_env_var("SPEEDTEST_SERVER", "Fast.com (Netflix CDN)").is_ok());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "false").is_ok());
        assert!(EnvManager::validate_env_var("SOMETHING_ELSE", "whatever").is_ok());

        assert!(EnvManager::validate_env_var("PING_COUNT", "0").is_err());
        assert!(EnvManager::validate_env_var("PING_COUNT", "101").is_err());
        assert!(EnvManager::validate_env_var("PING_INTERVAL", "0").is_err());
        assert!(EnvManager::validate_env_var("PROBE_METHOD", "udp").is_err());
        assert!(EnvManager::validate_env_var("LOG_FORMAT", "json").is_ok());
        assert!(EnvManager::validate_env_var("LOG_FORMAT", "syslog").is_err());
        assert!(EnvManager::validate_env_var("MAX_HOPS", "65").is_err());
        assert!(EnvManager::validate_env_var("TRACE_TIMEOUT_SECONDS", "601").is_err());
        assert!(EnvManager::validate_env_var("WORKERS", "abc").is_err());
        assert!(EnvManager::validate_env_var("SPEEDTEST_SERVER", "Nowhere").is_err());
        assert!(EnvManager::validate_env_var("LOG_FILE", "").is_err());
        assert!(EnvManager::validate_env_var("ENABLE_COLOR", "maybe").is_err());
    }

    #[test]
    fn test_display_env_help() {
        let help = EnvManager::display_env_help();

        assert!(help.contains("Supported Environment Variables:"));
        assert!(help.contains("PING_COUNT"));
        assert!(help.contains("SPEEDTEST_SERVER"));
        assert!(help.contains("Configuration Priority"));
    }
}
