//! Measurement result data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Outcome of one echo probe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProbeSample {
    /// Round-trip time in milliseconds
    Reply(f64),
    /// No reply within the probe timeout
    Lost,
}

impl ProbeSample {
    /// RTT in milliseconds, with `0.0` standing in for a lost probe
    pub fn as_ms(&self) -> f64 {
        match self {
            ProbeSample::Reply(ms) => *ms,
            ProbeSample::Lost => 0.0,
        }
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, ProbeSample::Lost)
    }
}

/// Result of a ping run against one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingReport {
    /// Target as entered by the user
    pub target: String,
    /// Address actually probed; `None` when resolution failed
    pub resolved: Option<IpAddr>,
    /// One entry per probe sent
    pub samples: Vec<ProbeSample>,
    /// Lost / sent x 100
    pub loss_percent: f64,
    /// True when the shutdown signal stopped the run early
    pub cancelled: bool,
}

impl PingReport {
    /// Report for a target that could not be resolved: nothing probed, total loss
    pub fn unreachable(target: &str) -> Self {
        Self {
            target: target.to_string(),
            resolved: None,
            samples: Vec::new(),
            loss_percent: 100.0,
            cancelled: false,
        }
    }

    /// Build a report from collected samples, computing loss over what was sent
    pub fn from_samples(target: &str, resolved: IpAddr, samples: Vec<ProbeSample>, cancelled: bool) -> Self {
        let loss_percent = loss_percent(&samples);
        Self {
            target: target.to_string(),
            resolved: Some(resolved),
            samples,
            loss_percent,
            cancelled,
        }
    }

    /// The sample series with lost probes as `0.0` placeholders
    pub fn latencies_ms(&self) -> Vec<f64> {
        self.samples.iter().map(ProbeSample::as_ms).collect()
    }

    /// True when no probe got a reply
    pub fn is_disconnected(&self) -> bool {
        self.samples.iter().all(ProbeSample::is_lost)
    }
}

/// Loss percentage over a sample series; an empty series counts as total loss
pub fn loss_percent(samples: &[ProbeSample]) -> f64 {
    if samples.is_empty() {
        return 100.0;
    }
    let lost = samples.iter().filter(|s| s.is_lost()).count();
    lost as f64 / samples.len() as f64 * 100.0
}

/// The three headline numbers of a speed test. `None` means the stage failed
/// on every candidate; it is never reported as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeedTestOutcome {
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub ping_ms: Option<f64>,
}

impl SpeedTestOutcome {
    /// True when neither throughput stage produced a measurement
    pub fn is_total_failure(&self) -> bool {
        self.download_mbps.is_none() && self.upload_mbps.is_none()
    }

    /// Final status line reported at 100 %
    pub fn summary(&self) -> String {
        if self.is_total_failure() {
            return "Unable to complete speed test. Please check your connection.".to_string();
        }

        format!(
            "Results: Download {}, Upload {}, Ping {}",
            figure(self.download_mbps, 2, "Mbps"),
            figure(self.upload_mbps, 2, "Mbps"),
            figure(self.ping_ms, 1, "ms")
        )
    }
}

/// A measured value with its unit, or a bare "Unknown"
fn figure(value: Option<f64>, precision: usize, unit: &str) -> String {
    value.map_or_else(|| "Unknown".to_string(), |v| format!("{:.*} {}", precision, v, unit))
}

/// Convert a byte count over an elapsed time to megabits per second
pub fn mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / (secs * 1_000_000.0)
}

/// Detail of the transfer that produced a throughput figure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSample {
    pub url: String,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl TransferSample {
    pub fn mbps(&self) -> f64 {
        mbps(self.bytes, self.elapsed)
    }
}

/// Full speed-test result handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedTestReport {
    pub outcome: SpeedTestOutcome,
    /// Endpoint selection the run was started with
    pub endpoint: String,
    pub latency_samples_ms: Vec<f64>,
    pub download: Option<TransferSample>,
    pub upload: Option<TransferSample>,
    /// The shutdown signal stopped the run before every stage finished
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
