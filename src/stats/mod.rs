//! Latency statistics over probe series

use crate::models::{PingReport, ProbeSample};
use serde::{Deserialize, Serialize};

/// Summary statistics of a ping run.
///
/// Only replies count towards the latency figures; lost probes (and their
/// `0.0` placeholders) affect the loss percentage alone. A run without a
/// single reply reports zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingStatistics {
    pub sent: usize,
    pub received: usize,
    pub loss_percent: f64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub median_ms: f64,
    pub std_dev_ms: f64,
    /// Mean absolute difference between consecutive replies
    pub jitter_ms: f64,
}

impl PingStatistics {
    /// Compute statistics for a finished report
    pub fn from_report(report: &PingReport) -> Self {
        let mut stats = Self::from_samples(&report.samples);
        stats.loss_percent = report.loss_percent;
        stats
    }

    /// Compute statistics for a raw sample series
    pub fn from_samples(samples: &[ProbeSample]) -> Self {
        let replies: Vec<f64> = samples
            .iter()
            .filter_map(|s| match s {
                ProbeSample::Reply(ms) if *ms > 0.0 => Some(*ms),
                _ => None,
            })
            .collect();

        let sent = samples.len();
        let received = replies.len();
        let loss_percent = crate::models::metrics::loss_percent(samples);

        if replies.is_empty() {
            return Self {
                sent,
                received,
                loss_percent,
                avg_ms: 0.0,
                min_ms: 0.0,
                max_ms: 0.0,
                median_ms: 0.0,
                std_dev_ms: 0.0,
                jitter_ms: 0.0,
            };
        }

        let avg_ms = mean(&replies);
        let min_ms = replies.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = replies.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut sorted = replies.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Self {
            sent,
            received,
            loss_percent,
            avg_ms,
            min_ms,
            max_ms,
            median_ms: percentile(&sorted, 50.0),
            std_dev_ms: standard_deviation(&replies, avg_ms),
            jitter_ms: jitter(&replies),
        }
    }

    /// Average latency, or `None` when nothing came back
    pub fn average(&self) -> Option<f64> {
        if self.received == 0 {
            None
        } else {
            Some(self.avg_ms)
        }
    }
}

/// Arithmetic mean; zero for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear-interpolated percentile over already sorted values
pub fn percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_values.len() as f64 - 1.0);
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        sorted_values[lower_index]
    } else {
        let lower_value = sorted_values[lower_index];
        let upper_value = sorted_values[upper_index];
        let weight = index - lower_index as f64;
        lower_value + weight * (upper_value - lower_value)
    }
}

/// Population standard deviation around `mean`
pub fn standard_deviation(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Mean absolute difference between consecutive values
pub fn jitter(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let total: f64 = values.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    total / (values.len() - 1) as f64
}
