//! Data models for the network checker

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::Config;
pub use metrics::{PingReport, ProbeSample, SpeedTestOutcome, SpeedTestReport, TransferSample};
