//! Colored formatter with ANSI colors
//!
//! Layout comes from [`PlainFormatter`]; this layer only decides colors.

use super::formatter::{progress_bar, FormattingOptions, OutputFormatter, PlainFormatter};
use crate::{
    models::{PingReport, ProbeSample, SpeedTestReport},
    netinfo::NetworkInfo,
    quality::{QualityTier, QualityVerdict},
    speedtest::{EndpointCandidate, EndpointStatus},
    stats::PingStatistics,
    trace::{TraceLine, TraceVerdict},
    types::ProgressEvent,
};
use colored::*;

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Color for a quality tier
pub fn tier_color(tier: QualityTier) -> Color {
    match tier {
        QualityTier::Excellent => Color::Green,
        QualityTier::Good => Color::Cyan,
        QualityTier::Moderate => Color::Yellow,
        QualityTier::Poor => Color::Red,
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain: PlainFormatter,
    scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self {
            plain: PlainFormatter::new(options),
            scheme: ColorScheme::default(),
        }
    }

    fn status_color(&self, status: EndpointStatus) -> Color {
        match status {
            EndpointStatus::Available => self.scheme.success,
            EndpointStatus::Unavailable => self.scheme.error,
            EndpointStatus::Unknown => self.scheme.muted,
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> String {
        self.plain
            .format_header(title)
            .lines()
            .map(|line| line.color(self.scheme.header).bold().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_progress(&self, event: &ProgressEvent) -> String {
        let bar = progress_bar(event.percent, self.plain.options().progress_width).color(self.scheme.info);
        let percent = format!("{:>3.0}%", event.percent).bold();
        match &event.message {
            Some(message) => format!("{} {} {}", bar, percent, message),
            None => format!("{} {}", bar, percent),
        }
    }

    fn format_ping_sample(&self, target: &str, seq: usize, sample: &ProbeSample) -> String {
        let line = self.plain.format_ping_sample(target, seq, sample);
        match sample {
            ProbeSample::Reply(_) => line,
            ProbeSample::Lost => line.color(self.scheme.warning).to_string(),
        }
    }

    fn format_ping_summary(&self, report: &PingReport, stats: &PingStatistics) -> String {
        let text = self.plain.format_ping_summary(report, stats);
        if stats.received == 0 {
            text.color(self.scheme.error).to_string()
        } else {
            text
        }
    }

    fn format_verdict(&self, verdict: &QualityVerdict) -> String {
        match verdict {
            QualityVerdict::Measured(assessment) => format!(
                "{} {}\n{}",
                "Connection Quality:".bold(),
                assessment.tier.title().color(tier_color(assessment.tier)).bold(),
                assessment.description
            ),
            QualityVerdict::NoData(message) => format!(
                "{} {}\n{}",
                "Connection Quality:".bold(),
                "No Data".color(self.scheme.error).bold(),
                message
            ),
        }
    }

    fn format_trace_line(&self, line: &TraceLine) -> String {
        if line.high_latency {
            line.text.color(self.scheme.error).bold().to_string()
        } else {
            line.text.clone()
        }
    }

    fn format_trace_verdict(&self, verdict: &TraceVerdict) -> String {
        let message = verdict.message();
        match verdict {
            TraceVerdict::Healthy => message.color(self.scheme.success).to_string(),
            TraceVerdict::HighLatency | TraceVerdict::Cancelled => message.color(self.scheme.warning).to_string(),
            TraceVerdict::TimedOut | TraceVerdict::Failed(_) => message.color(self.scheme.error).to_string(),
        }
    }

    fn format_speed_report(&self, report: &SpeedTestReport) -> String {
        let text = self.plain.format_speed_report(report);
        text.lines()
            .map(|line| {
                if line.contains("Unknown") {
                    line.color(self.scheme.warning).to_string()
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_endpoints(&self, endpoints: &[EndpointCandidate]) -> String {
        // Color whole rows after layout so padding stays aligned
        let table = self.plain.format_endpoints(endpoints);
        table
            .lines()
            .map(|line| {
                match endpoints.iter().find(|e| line.starts_with(&format!("| {}", e.name))) {
                    Some(endpoint) => line.color(self.status_color(endpoint.status)).to_string(),
                    None => line.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_network_info(&self, info: &NetworkInfo) -> String {
        let text = self.plain.format_network_info(info);
        text.lines()
            .map(|line| match line.split_once(':') {
                Some((label, value)) if !line.starts_with('|') && !line.starts_with('+') => {
                    format!("{}:{}", label.bold(), value)
                }
                _ => line.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_error(&self, error: &str) -> String {
        format!("{} {}", "ERROR:".color(self.scheme.error).bold(), error)
    }

    fn format_warning(&self, warning: &str) -> String {
        format!("{} {}", "WARNING:".color(self.scheme.warning).bold(), warning)
    }

    fn format_success(&self, message: &str) -> String {
        format!("{} {}", "OK:".color(self.scheme.success).bold(), message)
    }
}
