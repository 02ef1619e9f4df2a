//! Core formatting trait and the plain text implementation
//!
//! Every renderer returns a `String`; the caller decides where it goes.

use crate::{
    models::{PingReport, ProbeSample, SpeedTestReport},
    netinfo::NetworkInfo,
    quality::QualityVerdict,
    speedtest::EndpointCandidate,
    stats::PingStatistics,
    trace::{TraceLine, TraceVerdict},
    types::ProgressEvent,
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> String;

    /// Progress bar plus status line
    fn format_progress(&self, event: &ProgressEvent) -> String;

    /// One probe of a ping run
    fn format_ping_sample(&self, target: &str, seq: usize, sample: &ProbeSample) -> String;

    /// Ping statistics block
    fn format_ping_summary(&self, report: &PingReport, stats: &PingStatistics) -> String;

    /// Quality card for a ping or speed verdict
    fn format_verdict(&self, verdict: &QualityVerdict) -> String;

    /// One streamed line of tracer output
    fn format_trace_line(&self, line: &TraceLine) -> String;

    /// Notification after a trace finished
    fn format_trace_verdict(&self, verdict: &TraceVerdict) -> String;

    /// Speed-test results card
    fn format_speed_report(&self, report: &SpeedTestReport) -> String;

    /// Endpoint table with availability
    fn format_endpoints(&self, endpoints: &[EndpointCandidate]) -> String;

    /// Host network information
    fn format_network_info(&self, info: &NetworkInfo) -> String;

    /// Format error messages
    fn format_error(&self, error: &str) -> String;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> String;

    /// Format success messages
    fn format_success(&self, message: &str) -> String;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Show per-sample detail
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
    /// Width of the progress bar in cells
    pub progress_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
            progress_width: 30,
        }
    }
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
    pub max_width: usize,
}

impl Column {
    pub fn left(header: &str, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment: Alignment::Left,
            min_width: 4,
            max_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Render rows under the given columns
pub fn create_table(columns: &[Column], rows: &[RowData], borders: bool) -> String {
    let widths = column_widths(columns, rows);
    let mut output = String::new();

    let border = horizontal_border(&widths);
    if borders {
        output.push_str(&border);
        output.push('\n');
    }
    let headers: Vec<String> = columns.iter().map(|c| c.header.clone()).collect();
    output.push_str(&create_row(&headers, &widths, columns, borders));
    output.push('\n');
    if borders {
        output.push_str(&border);
        output.push('\n');
    }

    for row in rows {
        output.push_str(&create_row(row, &widths, columns, borders));
        output.push('\n');
    }

    if borders {
        output.push_str(&border);
        output.push('\n');
    }
    output
}

fn column_widths(columns: &[Column], rows: &[RowData]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let content = rows
                .iter()
                .filter_map(|r| r.get(idx))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0);
            content
                .max(col.header.chars().count())
                .max(col.min_width)
                .min(col.max_width)
        })
        .collect()
}

fn create_row(data: &[String], widths: &[usize], columns: &[Column], borders: bool) -> String {
    let mut row = String::new();
    if borders {
        row.push('|');
    }

    for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
        let alignment = columns.get(idx).map_or(&Alignment::Left, |c| &c.alignment);
        if borders {
            row.push(' ');
        }
        row.push_str(&align_text(cell, width, alignment));
        if borders {
            row.push_str(" |");
        } else {
            row.push_str("  ");
        }
    }

    row.trim_end().to_string()
}

fn horizontal_border(widths: &[usize]) -> String {
    let mut border = String::from("+");
    for &width in widths {
        border.push_str(&"-".repeat(width + 2));
        border.push('+');
    }
    border
}

/// Align text within `width`, truncating with `...` when too long
pub fn align_text(text: &str, width: usize, alignment: &Alignment) -> String {
    let len = text.chars().count();
    if len > width {
        if width <= 3 {
            return text.chars().take(width).collect();
        }
        let truncated: String = text.chars().take(width - 3).collect();
        return format!("{}...", truncated);
    }

    match alignment {
        Alignment::Left => format!("{:<width$}", text, width = width),
        Alignment::Right => format!("{:>width$}", text, width = width),
        Alignment::Center => format!("{:^width$}", text, width = width),
    }
}

/// `[#####.....]` for a percentage in 0..=100
pub fn progress_bar(percent: f64, width: usize) -> String {
    let clamped = percent.clamp(0.0, 100.0);
    let filled = ((clamped / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled.min(width)))
}

fn optional(value: Option<f64>, precision: usize, unit: &str) -> String {
    value.map_or_else(
        || "Unknown".to_string(),
        |v| format!("{:.*} {}", precision, v, unit),
    )
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> String {
        let rule = "=".repeat(title.chars().count().max(20));
        format!("{}\n{}\n{}", rule, title, rule)
    }

    fn format_progress(&self, event: &ProgressEvent) -> String {
        let bar = progress_bar(event.percent, self.options.progress_width);
        match &event.message {
            Some(message) => format!("{} {:>3.0}% {}", bar, event.percent, message),
            None => format!("{} {:>3.0}%", bar, event.percent),
        }
    }

    fn format_ping_sample(&self, target: &str, seq: usize, sample: &ProbeSample) -> String {
        match sample {
            ProbeSample::Reply(ms) => format!("Reply from {}: seq={} time={:.1} ms", target, seq, ms),
            ProbeSample::Lost => format!("Request to {} timed out: seq={}", target, seq),
        }
    }

    fn format_ping_summary(&self, report: &PingReport, stats: &PingStatistics) -> String {
        let mut out = String::new();
        let resolved = report.resolved.map(|ip| format!(" ({})", ip)).unwrap_or_default();
        let _ = writeln!(out, "--- {}{} ping statistics ---", report.target, resolved);
        let _ = writeln!(
            out,
            "{} probes sent, {} received, {:.1}% packet loss",
            stats.sent, stats.received, stats.loss_percent
        );
        if stats.received > 0 {
            let _ = writeln!(
                out,
                "Average: {:.1} ms  Minimum: {:.1} ms  Maximum: {:.1} ms",
                stats.avg_ms, stats.min_ms, stats.max_ms
            );
            if self.options.verbose_mode {
                let _ = writeln!(
                    out,
                    "Median: {:.1} ms  Std dev: {:.1} ms  Jitter: {:.1} ms",
                    stats.median_ms, stats.std_dev_ms, stats.jitter_ms
                );
            }
        }
        if report.cancelled {
            let _ = writeln!(out, "Ping cancelled after {} probes", report.samples.len());
        }
        out.trim_end().to_string()
    }

    fn format_verdict(&self, verdict: &QualityVerdict) -> String {
        match verdict {
            QualityVerdict::Measured(assessment) => {
                format!("Connection Quality: {}\n{}", assessment.tier.title(), assessment.description)
            }
            QualityVerdict::NoData(message) => format!("Connection Quality: No Data\n{}", message),
        }
    }

    fn format_trace_line(&self, line: &TraceLine) -> String {
        if line.high_latency {
            format!("{}  [high latency]", line.text)
        } else {
            line.text.clone()
        }
    }

    fn format_trace_verdict(&self, verdict: &TraceVerdict) -> String {
        verdict.message()
    }

    fn format_speed_report(&self, report: &SpeedTestReport) -> String {
        let outcome = &report.outcome;
        let mut out = String::new();
        let _ = writeln!(out, "Download: {}", optional(outcome.download_mbps, 2, "Mbps"));
        let _ = writeln!(out, "Upload:   {}", optional(outcome.upload_mbps, 2, "Mbps"));
        let _ = writeln!(out, "Ping:     {}", optional(outcome.ping_ms, 1, "ms"));
        if self.options.verbose_mode {
            if let Some(download) = &report.download {
                let _ = writeln!(out, "Download source: {} ({} bytes)", download.url, download.bytes);
            }
            if let Some(upload) = &report.upload {
                let _ = writeln!(out, "Upload target:   {} ({} bytes)", upload.url, upload.bytes);
            }
            let elapsed = report.finished_at - report.started_at;
            let _ = writeln!(out, "Duration: {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
        }
        if report.cancelled {
            let _ = writeln!(out, "Speed test cancelled");
        }
        out.trim_end().to_string()
    }

    fn format_endpoints(&self, endpoints: &[EndpointCandidate]) -> String {
        let columns = [
            Column::left("Server", 30),
            Column::left("Location", 20),
            Column::left("Provider", 16),
            Column::left("Status", 12),
        ];
        let rows: Vec<RowData> = endpoints
            .iter()
            .map(|e| vec![e.name.clone(), e.location.clone(), e.provider.clone(), e.status.to_string()])
            .collect();
        create_table(&columns, &rows, self.options.table_borders)
            .trim_end()
            .to_string()
    }

    fn format_network_info(&self, info: &NetworkInfo) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Hostname:        {}", info.hostname);
        let _ = writeln!(out, "Local IP:        {}", info.local_ip);
        let _ = writeln!(out, "Public IP:       {}", info.public_ip);
        let _ = writeln!(out, "Default Gateway: {}", info.default_gateway);
        if info.dns_resolvers.is_empty() {
            let _ = writeln!(out, "DNS Resolvers:   none found");
        } else {
            let _ = writeln!(out, "DNS Resolvers:   {}", info.dns_resolvers.join(", "));
        }

        let columns = [Column::left("Interface", 24), Column::left("IPv4 Addresses", 60)];
        let rows: Vec<RowData> = info
            .interfaces
            .iter()
            .map(|(name, addrs)| vec![name.clone(), if addrs.is_empty() { "-".to_string() } else { addrs.join(", ") }])
            .collect();
        out.push('\n');
        out.push_str(&create_table(&columns, &rows, self.options.table_borders));

        if let Some(error) = &info.error {
            let _ = writeln!(out, "Error: {}", error);
        }
        out.trim_end().to_string()
    }

    fn format_error(&self, error: &str) -> String {
        format!("ERROR: {}", error)
    }

    fn format_warning(&self, warning: &str) -> String {
        format!("WARNING: {}", warning)
    }

    fn format_success(&self, message: &str) -> String {
        format!("OK: {}", message)
    }
}
