//! Network Checker
//!
//! A network diagnostics toolkit: ping with packet-loss accounting, streamed
//! traceroute, interface inspection and a multi-stage throughput test that
//! falls back across public endpoints. The measurement engine reports progress
//! through channels and never lets a failure escape as a panic or error; the
//! terminal front-end in [`app`] is just one consumer of it.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod dns;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod netinfo;
pub mod output;
pub mod probe;
pub mod quality;
pub mod speedtest;
pub mod stats;
pub mod trace;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, PingReport, ProbeSample, SpeedTestOutcome};
pub use quality::{QualityAssessment, QualityTier, QualityVerdict};
pub use speedtest::{EndpointStore, SpeedTester};
pub use trace::{RouteTracer, TraceOutcome};
pub use types::{ProgressEvent, ProgressSender};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_PING_COUNT: u32 = 4;
    pub const DEFAULT_PING_INTERVAL_SECS: u64 = 1;
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
    pub const DEFAULT_MAX_HOPS: u32 = 30;
    pub const DEFAULT_TRACE_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);
    pub const DEFAULT_WORKERS: usize = 4;
    pub const DEFAULT_LOG_FILE: &str = "network_checker.log";
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    pub const DEFAULT_SPEEDTEST_SERVER: &str = "Automatic (Recommended)";
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";

    /// Hosts used for the HTTP latency stage of the speed test
    pub const LATENCY_URLS: &[&str] = &[
        "https://www.google.com",
        "https://www.cloudflare.com",
        "https://www.amazon.com",
    ];

    /// Download candidates, in priority order
    pub const DOWNLOAD_URLS: &[&str] = &[
        "https://speed.cloudflare.com/__down?bytes=10000000",
        "https://ftp.halifax.rwth-aachen.de/random/10MB.dat",
        "https://speed.hetzner.de/10MB.bin",
    ];

    /// Upload candidates, in priority order
    pub const UPLOAD_URLS: &[&str] = &[
        "https://httpbin.org/post",
        "https://postman-echo.com/post",
    ];

    pub const PUBLIC_IP_URL: &str = "https://api.ipify.org";
    pub const CONNECTIVITY_HOSTS: &[&str] = &["www.google.com", "www.cloudflare.com", "1.1.1.1"];
    pub const CONNECTIVITY_HTTP_URL: &str = "https://www.google.com";

    pub const MIB: u64 = 1024 * 1024;
    pub const KIB: u64 = 1024;
    pub const DOWNLOAD_EARLY_STOP_BYTES: u64 = 4 * MIB;
    pub const DOWNLOAD_MIN_BYTES: u64 = 100 * KIB;
    pub const DOWNLOAD_MIN_BYTES_AFTER_ERROR: u64 = MIB;
    pub const DOWNLOAD_MIN_ELAPSED: Duration = Duration::from_millis(100);
    pub const UPLOAD_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;
    pub const LATENCY_STAGE_TIMEOUT: Duration = Duration::from_secs(2);
    pub const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(1);
    pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);
    pub const HIGH_LATENCY_HOP_MS: u64 = 100;
}
