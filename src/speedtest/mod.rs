//! Throughput tester: latency, download and upload stages with per-stage
//! fallback across candidate endpoints.
//!
//! Stages run strictly in order and candidates strictly in priority order.
//! The first valid sample of a stage wins. A stage that exhausts its
//! candidates yields `None` and the next stage still runs.

pub mod download;
pub mod endpoints;
pub mod latency;
pub mod upload;

pub use endpoints::{EndpointCandidate, EndpointStatus, EndpointStore};

use crate::{
    defaults,
    logging::NetworkLogger,
    models::{SpeedTestOutcome, SpeedTestReport, TransferSample},
    stats,
    types::ProgressSender,
};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Candidate lists and acceptance thresholds for one run
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedTestPlan {
    pub latency_urls: Vec<String>,
    pub download_urls: Vec<String>,
    pub upload_urls: Vec<String>,
    pub latency_timeout: Duration,
    pub transfer_timeout: Duration,
    pub early_stop_bytes: u64,
    pub min_bytes: u64,
    pub min_bytes_after_error: u64,
    pub min_elapsed: Duration,
    pub upload_bytes: usize,
}

impl Default for SpeedTestPlan {
    fn default() -> Self {
        let owned = |urls: &[&str]| -> Vec<String> { urls.iter().map(|u| u.to_string()).collect() };
        Self {
            latency_urls: owned(defaults::LATENCY_URLS),
            download_urls: owned(defaults::DOWNLOAD_URLS),
            upload_urls: owned(defaults::UPLOAD_URLS),
            latency_timeout: defaults::LATENCY_STAGE_TIMEOUT,
            transfer_timeout: defaults::DEFAULT_HTTP_TIMEOUT,
            early_stop_bytes: defaults::DOWNLOAD_EARLY_STOP_BYTES,
            min_bytes: defaults::DOWNLOAD_MIN_BYTES,
            min_bytes_after_error: defaults::DOWNLOAD_MIN_BYTES_AFTER_ERROR,
            min_elapsed: defaults::DOWNLOAD_MIN_ELAPSED,
            upload_bytes: defaults::UPLOAD_PAYLOAD_BYTES,
        }
    }
}

impl SpeedTestPlan {
    pub fn with_latency_urls(mut self, urls: Vec<String>) -> Self {
        self.latency_urls = urls;
        self
    }

    pub fn with_download_urls(mut self, urls: Vec<String>) -> Self {
        self.download_urls = urls;
        self
    }

    pub fn with_upload_urls(mut self, urls: Vec<String>) -> Self {
        self.upload_urls = urls;
        self
    }

    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn with_min_elapsed(mut self, min_elapsed: Duration) -> Self {
        self.min_elapsed = min_elapsed;
        self
    }

    pub fn with_upload_bytes(mut self, bytes: usize) -> Self {
        self.upload_bytes = bytes;
        self
    }
}

/// Runs speed tests with a shared HTTP client
#[derive(Clone)]
pub struct SpeedTester {
    client: reqwest::Client,
    plan: SpeedTestPlan,
    logger: Option<NetworkLogger>,
}

impl SpeedTester {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            plan: SpeedTestPlan::default(),
            logger: None,
        }
    }

    pub fn with_plan(mut self, plan: SpeedTestPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_logger(mut self, logger: NetworkLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn plan(&self) -> &SpeedTestPlan {
        &self.plan
    }

    /// Run latency, download and upload stages and report progress on the way.
    ///
    /// `selected_url` (the URL of a non-automatic endpoint) is tried first in
    /// the latency stage. Nothing here returns an error: a stage that fails on
    /// every candidate leaves its figure absent. When `cancel` fires the
    /// remaining stages are skipped and the report is marked cancelled.
    pub async fn run_speed_test(
        &self,
        progress: &ProgressSender,
        selected_url: Option<&str>,
        cancel: &CancellationToken,
    ) -> SpeedTestReport {
        let started_at = Utc::now();
        let mut report = SpeedTestReport {
            outcome: SpeedTestOutcome::default(),
            endpoint: selected_url.unwrap_or(endpoints::AUTO_URL).to_string(),
            latency_samples_ms: Vec::new(),
            download: None,
            upload: None,
            cancelled: false,
            started_at,
            finished_at: started_at,
        };

        self.info("Starting speed test...").await;
        progress.status(5.0, "Starting speed test...");

        // Latency
        progress.status(10.0, "Testing network latency...");
        let urls = self.latency_urls(selected_url);
        let Some(samples) = guarded(
            cancel,
            latency::measure_latency(&self.client, &urls, self.plan.latency_timeout, self.logger.as_ref()),
        )
        .await
        else {
            return self.cancelled(report, progress).await;
        };
        if samples.is_empty() {
            progress.status(15.0, "Unable to measure network latency");
            self.warn("Could not measure ping latency to any server").await;
        } else {
            let avg = stats::mean(&samples);
            report.outcome.ping_ms = Some(avg);
            progress.status(15.0, format!("Network latency: {:.1} ms", avg));
        }
        report.latency_samples_ms = samples;

        // Download
        progress.status(20.0, "Testing download speed...");
        let Some(download) = guarded(cancel, self.download_stage(progress, cancel)).await else {
            return self.cancelled(report, progress).await;
        };
        match &download {
            Some(sample) => {
                let rate = sample.mbps();
                report.outcome.download_mbps = Some(rate);
                progress.status(50.0, format!("Download speed: {:.2} Mbps", rate));
                self.info(&format!(
                    "Download test completed: {:.2} Mbps, {:.1}MB in {:.1}s",
                    rate,
                    sample.bytes as f64 / defaults::MIB as f64,
                    sample.elapsed.as_secs_f64()
                ))
                .await;
            }
            None => {
                progress.status(50.0, "Unable to calculate download speed");
                self.warn("Could not calculate download speed - no successful tests").await;
            }
        }
        report.download = download;

        // Upload
        progress.status(60.0, "Testing upload speed...");
        let Some(upload) = guarded(cancel, self.upload_stage(progress, cancel)).await else {
            return self.cancelled(report, progress).await;
        };
        match &upload {
            Some(sample) => {
                let rate = sample.mbps();
                report.outcome.upload_mbps = Some(rate);
                progress.status(90.0, format!("Upload speed: {:.2} Mbps", rate));
                self.info(&format!("Upload test completed: {:.2} Mbps to {}", rate, sample.url)).await;
            }
            None => {
                progress.status(90.0, "Unable to calculate upload speed");
                self.warn("Could not calculate upload speed - no successful tests").await;
            }
        }
        report.upload = upload;

        progress.status(95.0, "Processing results...");
        let summary = report.outcome.summary();
        if report.outcome.is_total_failure() {
            self.error("Speed test failed to complete").await;
        } else {
            self.info(&format!("Speed test complete: {}", summary)).await;
        }
        progress.status(100.0, summary);

        report.finished_at = Utc::now();
        report
    }

    fn latency_urls(&self, selected_url: Option<&str>) -> Vec<String> {
        let mut urls = self.plan.latency_urls.clone();
        if let Some(url) = selected_url.filter(|u| *u != endpoints::AUTO_URL) {
            if !urls.iter().any(|u| u == url) {
                urls.insert(0, url.to_string());
            }
        }
        urls
    }

    async fn download_stage(&self, progress: &ProgressSender, cancel: &CancellationToken) -> Option<TransferSample> {
        for url in &self.plan.download_urls {
            if cancel.is_cancelled() {
                return None;
            }
            progress.status(25.0, "Testing download server...");
            match download::download_sample(&self.client, url, &self.plan, progress).await {
                Ok(sample) => return Some(sample),
                Err(e) => self.candidate_failed("download", url, &e.to_string()).await,
            }
        }
        None
    }

    async fn upload_stage(&self, progress: &ProgressSender, cancel: &CancellationToken) -> Option<TransferSample> {
        if self.plan.upload_urls.is_empty() {
            return None;
        }
        let payload = upload::generate_payload(self.plan.upload_bytes);

        for url in &self.plan.upload_urls {
            if cancel.is_cancelled() {
                return None;
            }
            progress.status(70.0, "Testing upload server...");
            match upload::upload_sample(&self.client, url, &payload, self.plan.transfer_timeout).await {
                Ok(sample) => return Some(sample),
                Err(e) => self.candidate_failed("upload", url, &e.to_string()).await,
            }
        }
        None
    }

    async fn cancelled(&self, mut report: SpeedTestReport, progress: &ProgressSender) -> SpeedTestReport {
        self.info("Speed test cancelled").await;
        progress.status(100.0, "Speed test cancelled");
        report.cancelled = true;
        report.finished_at = Utc::now();
        report
    }

    async fn candidate_failed(&self, stage: &str, url: &str, reason: &str) {
        if let Some(logger) = &self.logger {
            logger.log_candidate_failure(stage, url, reason).await;
        }
    }

    async fn info(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.logger().info(message).log().await;
        }
    }

    async fn warn(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.logger().warn(message).log().await;
        }
    }

    async fn error(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.logger().error(message).log().await;
        }
    }
}

/// Run `fut` unless `cancel` fires first
async fn guarded<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::KIB;
    use crate::types::ProgressEvent;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> reqwest::Client {
        crate::client::HttpClientFactory::default().create().unwrap()
    }

    async fn mock_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/small"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 10 * KIB as usize]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/file"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 512 * KIB as usize]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/post"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        server
    }

    fn plan_for(server: &MockServer) -> SpeedTestPlan {
        SpeedTestPlan::default()
            .with_latency_urls(vec![server.uri()])
            .with_download_urls(vec![format!("{}/file", server.uri())])
            .with_upload_urls(vec![format!("{}/post", server.uri())])
            .with_min_elapsed(Duration::ZERO)
            .with_upload_bytes(64 * KIB as usize)
    }

    #[tokio::test]
    async fn test_all_stages_succeed() {
        let server = mock_server().await;
        let tester = SpeedTester::new(client()).with_plan(plan_for(&server));
        let (progress, mut rx) = ProgressSender::channel();

        let report = tester.run_speed_test(&progress, None, &CancellationToken::new()).await;
        drop(progress);

        assert!(report.outcome.download_mbps.is_some());
        assert!(report.outcome.upload_mbps.is_some());
        assert!(report.outcome.ping_ms.is_some());
        assert_eq!(report.latency_samples_ms.len(), 1);
        assert!(!report.cancelled);

        let mut events: Vec<ProgressEvent> = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        let staged: Vec<f64> = events
            .iter()
            .map(|e| e.percent)
            .filter(|p| *p != download::LIVE_PROGRESS)
            .collect();
        assert_eq!(staged, vec![5.0, 10.0, 15.0, 20.0, 25.0, 50.0, 60.0, 70.0, 90.0, 95.0, 100.0]);

        let last = events.last().unwrap();
        assert!(last.message.as_deref().unwrap().starts_with("Results: Download"));
    }

    #[tokio::test]
    async fn test_download_falls_back_past_small_sample() {
        let server = mock_server().await;
        let plan = plan_for(&server).with_download_urls(vec![
            "http://127.0.0.1:1/refused".to_string(),
            format!("{}/small", server.uri()),
            format!("{}/file", server.uri()),
        ]);
        let tester = SpeedTester::new(client()).with_plan(plan);

        let report = tester
            .run_speed_test(&ProgressSender::disabled(), None, &CancellationToken::new())
            .await;

        let download = report.download.expect("third candidate succeeds");
        assert!(download.url.ends_with("/file"));
        assert_eq!(download.bytes, 512 * KIB);
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let server = mock_server().await;
        Mock::given(method("GET"))
            .and(path("/second"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 512 * KIB as usize]))
            .expect(0)
            .mount(&server)
            .await;

        let plan = plan_for(&server).with_download_urls(vec![
            format!("{}/file", server.uri()),
            format!("{}/second", server.uri()),
        ]);
        let report = SpeedTester::new(client())
            .with_plan(plan)
            .run_speed_test(&ProgressSender::disabled(), None, &CancellationToken::new())
            .await;

        assert!(report.download.unwrap().url.ends_with("/file"));
    }

    #[tokio::test]
    async fn test_all_endpoints_unreachable_yields_absent() {
        let dead = "http://127.0.0.1:1".to_string();
        let plan = SpeedTestPlan::default()
            .with_latency_urls(vec![dead.clone()])
            .with_download_urls(vec![format!("{}/a", dead), format!("{}/b", dead)])
            .with_upload_urls(vec![format!("{}/post", dead)])
            .with_transfer_timeout(Duration::from_secs(2));
        let (progress, mut rx) = ProgressSender::channel();

        let report = SpeedTester::new(client())
            .with_plan(plan)
            .run_speed_test(&progress, None, &CancellationToken::new())
            .await;
        drop(progress);

        assert_eq!(report.outcome, SpeedTestOutcome { download_mbps: None, upload_mbps: None, ping_ms: None });
        assert!(report.outcome.is_total_failure());

        let mut messages = Vec::new();
        while let Some(event) = rx.recv().await {
            messages.extend(event.message);
        }
        assert!(messages.contains(&"Unable to measure network latency".to_string()));
        assert!(messages.contains(&"Unable to calculate download speed".to_string()));
        assert!(messages.contains(&"Unable to calculate upload speed".to_string()));
        assert_eq!(
            messages.last().map(String::as_str),
            Some("Unable to complete speed test. Please check your connection.")
        );
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_download() {
        let server = mock_server().await;
        let plan = plan_for(&server).with_upload_urls(vec![format!("{}/missing", server.uri())]);

        let report = SpeedTester::new(client())
            .with_plan(plan)
            .run_speed_test(&ProgressSender::disabled(), None, &CancellationToken::new())
            .await;

        assert!(report.outcome.download_mbps.is_some());
        assert_eq!(report.outcome.upload_mbps, None);
        assert!(report.outcome.summary().contains("Upload Unknown,"));
        assert!(!report.outcome.summary().contains("Unknown Mbps"));
    }

    #[tokio::test]
    async fn test_selected_endpoint_probed_first() {
        let server = mock_server().await;
        let tester = SpeedTester::new(client()).with_plan(plan_for(&server));

        let urls = tester.latency_urls(Some("https://fast.com"));
        assert_eq!(urls[0], "https://fast.com");
        assert_eq!(tester.latency_urls(Some(endpoints::AUTO_URL)), vec![server.uri()]);
        assert_eq!(tester.latency_urls(None), vec![server.uri()]);
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_stages() {
        let server = mock_server().await;
        let tester = SpeedTester::new(client()).with_plan(plan_for(&server));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = tester.run_speed_test(&ProgressSender::disabled(), None, &cancel).await;

        assert!(report.cancelled);
        assert!(report.outcome.is_total_failure());
        assert!(report.latency_samples_ms.is_empty());
    }
}
