//! Connection quality classification
//!
//! Pure mappings from measured metrics to a [`QualityTier`] and a
//! human-readable description. Missing measurements never reach these
//! functions; callers report them as [`QualityVerdict::NoData`] instead.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Packet loss above this percentage is always poor
pub const LOSS_POOR_THRESHOLD: f64 = 20.0;

/// Latency tier boundaries in milliseconds (exclusive upper bounds)
pub const PING_EXCELLENT_BELOW_MS: f64 = 50.0;
pub const PING_GOOD_BELOW_MS: f64 = 100.0;
pub const PING_MODERATE_BELOW_MS: f64 = 200.0;

/// Throughput tier boundaries in Mbps (inclusive lower bounds)
pub const SPEED_EXCELLENT_MBPS: f64 = 50.0;
pub const SPEED_GOOD_MBPS: f64 = 20.0;
pub const SPEED_MODERATE_MBPS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Excellent,
    Good,
    Moderate,
    Poor,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Excellent => "excellent",
            QualityTier::Good => "good",
            QualityTier::Moderate => "moderate",
            QualityTier::Poor => "poor",
        }
    }

    /// Capitalized label for cards
    pub fn title(&self) -> &'static str {
        match self {
            QualityTier::Excellent => "Excellent",
            QualityTier::Good => "Good",
            QualityTier::Moderate => "Moderate",
            QualityTier::Poor => "Poor",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub tier: QualityTier,
    pub description: String,
}

impl QualityAssessment {
    fn new(tier: QualityTier, description: &str) -> Self {
        Self {
            tier,
            description: description.to_string(),
        }
    }
}

/// Either a computed assessment or the reason none could be computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QualityVerdict {
    Measured(QualityAssessment),
    NoData(String),
}

/// Message shown when every echo probe was lost or the target never resolved
pub const DISCONNECTED_MESSAGE: &str = "Network is disconnected. Check your internet connection.";

/// Classify latency and loss. Loss dominates latency.
pub fn classify_ping(avg_ms: f64, loss_percent: f64) -> QualityAssessment {
    if loss_percent > LOSS_POOR_THRESHOLD {
        return QualityAssessment::new(
            QualityTier::Poor,
            "Network quality is poor! High packet loss indicates connection issues.",
        );
    }

    if avg_ms < PING_EXCELLENT_BELOW_MS {
        QualityAssessment::new(
            QualityTier::Excellent,
            "Network quality is excellent (Low latency). Suitable for gaming, video calls, and streaming.",
        )
    } else if avg_ms < PING_GOOD_BELOW_MS {
        QualityAssessment::new(
            QualityTier::Good,
            "Network quality is good. Should support most online activities with minimal delay.",
        )
    } else if avg_ms < PING_MODERATE_BELOW_MS {
        QualityAssessment::new(
            QualityTier::Moderate,
            "Network quality is moderate! Video calls and gaming may experience noticeable delay.",
        )
    } else {
        QualityAssessment::new(
            QualityTier::Poor,
            "Network quality is poor! High latency may disrupt real-time applications.",
        )
    }
}

/// Classify throughput. Only the download figure selects the tier; the
/// upload figure is accepted for display symmetry and ignored.
pub fn classify_throughput(download_mbps: f64, _upload_mbps: f64) -> QualityAssessment {
    if download_mbps >= SPEED_EXCELLENT_MBPS {
        QualityAssessment::new(
            QualityTier::Excellent,
            "Excellent internet speed. Suitable for 4K streaming, large file transfers, and online gaming.",
        )
    } else if download_mbps >= SPEED_GOOD_MBPS {
        QualityAssessment::new(
            QualityTier::Good,
            "Good internet speed. Suitable for HD streaming and most online activities.",
        )
    } else if download_mbps >= SPEED_MODERATE_MBPS {
        QualityAssessment::new(
            QualityTier::Moderate,
            "Moderate internet speed. Suitable for standard definition streaming and general web browsing.",
        )
    } else {
        QualityAssessment::new(
            QualityTier::Poor,
            "Poor internet speed. May experience buffering during streaming and slow file transfers.",
        )
    }
}

/// Ping verdict: no data when nothing came back
pub fn ping_verdict(avg_ms: Option<f64>, loss_percent: f64) -> QualityVerdict {
    match avg_ms {
        Some(avg) => QualityVerdict::Measured(classify_ping(avg, loss_percent)),
        None => QualityVerdict::NoData(DISCONNECTED_MESSAGE.to_string()),
    }
}

/// Throughput verdict: requires both directions, otherwise reports `no_data_message`
pub fn throughput_verdict(
    download_mbps: Option<f64>,
    upload_mbps: Option<f64>,
    no_data_message: &str,
) -> QualityVerdict {
    match (download_mbps, upload_mbps) {
        (Some(down), Some(up)) => QualityVerdict::Measured(classify_throughput(down, up)),
        _ => QualityVerdict::NoData(no_data_message.to_string()),
    }
}
