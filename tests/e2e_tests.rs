//! End-to-end tests of the diagnostics engine
//!
//! Everything runs against local listeners and mock HTTP servers; nothing
//! here needs internet access.

use async_trait::async_trait;
use network_checker::{
    client::HttpClientFactory,
    dns::AddressResolver,
    executor::{ShutdownOutcome, WorkerPool},
    models::ProbeSample,
    output::{OutputFormatter, OutputFormatterFactory},
    probe::{EchoProber, LatencyProber, TcpConnectProber},
    quality::{ping_verdict, throughput_verdict, QualityTier, QualityVerdict, DISCONNECTED_MESSAGE},
    speedtest::{EndpointCandidate, EndpointStatus, EndpointStore, SpeedTestPlan, SpeedTester},
    stats::PingStatistics,
    types::ProgressSender,
};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KIB: usize = 1024;

fn client() -> reqwest::Client {
    HttpClientFactory::default().create().unwrap()
}

/// Replies to odd-numbered probes only
struct AlternatingProber {
    calls: AtomicU32,
}

#[async_trait]
impl EchoProber for AlternatingProber {
    async fn echo(&self, _addr: IpAddr, _timeout: Duration) -> Option<f64> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        (call % 2 == 0).then_some(20.0)
    }

    fn name(&self) -> &'static str {
        "alternating"
    }
}

async fn speed_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/payload"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'z'; 768 * KIB]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_ping_local_listener_over_tcp() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    let prober = LatencyProber::new(AddressResolver::from_system(), Arc::new(TcpConnectProber::new(vec![port])));
    let report = prober
        .probe(
            "127.0.0.1",
            3,
            Duration::from_millis(10),
            &CancellationToken::new(),
            &ProgressSender::disabled(),
        )
        .await;

    assert_eq!(report.samples.len(), 3);
    assert_eq!(report.loss_percent, 0.0);
    assert!(report.samples.iter().all(|s| matches!(s, ProbeSample::Reply(_))));

    let stats = PingStatistics::from_report(&report);
    match ping_verdict(stats.average(), report.loss_percent) {
        QualityVerdict::Measured(assessment) => assert_eq!(assessment.tier, QualityTier::Excellent),
        other => panic!("expected a measured verdict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ping_loss_drives_poor_verdict() {
    let prober = LatencyProber::new(
        AddressResolver::from_system(),
        Arc::new(AlternatingProber {
            calls: AtomicU32::new(0),
        }),
    );
    let report = prober
        .probe(
            "10.0.0.1",
            4,
            Duration::from_millis(1),
            &CancellationToken::new(),
            &ProgressSender::disabled(),
        )
        .await;

    assert_eq!(
        report.samples,
        vec![ProbeSample::Reply(20.0), ProbeSample::Lost, ProbeSample::Reply(20.0), ProbeSample::Lost]
    );
    assert_eq!(report.loss_percent, 50.0);

    let stats = PingStatistics::from_report(&report);
    assert_eq!(stats.average(), Some(20.0));
    match ping_verdict(stats.average(), report.loss_percent) {
        QualityVerdict::Measured(assessment) => assert_eq!(assessment.tier, QualityTier::Poor),
        other => panic!("expected a measured verdict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ping_cancelled_before_start() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let prober = LatencyProber::new(
        AddressResolver::from_system(),
        Arc::new(AlternatingProber {
            calls: AtomicU32::new(0),
        }),
    );

    let report = prober
        .probe("10.0.0.1", 4, Duration::from_secs(1), &cancel, &ProgressSender::disabled())
        .await;

    assert!(report.cancelled);
    assert!(report.samples.is_empty());
    assert_eq!(report.loss_percent, 100.0);
    assert_eq!(
        ping_verdict(None, report.loss_percent),
        QualityVerdict::NoData(DISCONNECTED_MESSAGE.to_string())
    );
}

#[tokio::test]
async fn test_speed_test_on_worker_pool() {
    let server = speed_server().await;
    let plan = SpeedTestPlan::default()
        .with_latency_urls(vec![server.uri()])
        .with_download_urls(vec![
            "http://127.0.0.1:1/refused".to_string(),
            format!("{}/payload", server.uri()),
        ])
        .with_upload_urls(vec![format!("{}/upload", server.uri())])
        .with_min_elapsed(Duration::ZERO)
        .with_upload_bytes(128 * KIB);
    let tester = SpeedTester::new(client()).with_plan(plan);

    let pool = WorkerPool::new(2);
    let (progress, mut events) = ProgressSender::channel();
    let handle = pool
        .submit(async move {
            tester
                .run_speed_test(&progress, None, &CancellationToken::new())
                .await
        })
        .unwrap();

    let mut messages = Vec::new();
    while let Some(event) = events.recv().await {
        if let Some(message) = event.message {
            messages.push(message);
        }
    }
    let report = handle.await.unwrap();

    assert_eq!(report.download.as_ref().unwrap().bytes, 768 * KIB as u64);
    assert!(report.outcome.upload_mbps.is_some());
    assert!(messages.iter().any(|m| m == "Testing download speed..."));
    assert!(messages.last().unwrap().starts_with("Results: Download"));

    let verdict = throughput_verdict(report.outcome.download_mbps, report.outcome.upload_mbps, "unused");
    assert!(matches!(verdict, QualityVerdict::Measured(_)));

    let card = OutputFormatterFactory::create_plain_formatter().format_speed_report(&report);
    assert!(card.contains("Download:"));
    assert!(!card.contains("Unknown"));

    assert_eq!(pool.shutdown(Duration::from_secs(1)).await, ShutdownOutcome::Drained);
}

#[tokio::test]
async fn test_speed_test_offline_leaves_figures_absent() {
    let plan = SpeedTestPlan::default()
        .with_latency_urls(vec!["http://127.0.0.1:1".to_string()])
        .with_download_urls(vec!["http://127.0.0.1:1/file".to_string()])
        .with_upload_urls(vec!["http://127.0.0.1:1/post".to_string()])
        .with_upload_bytes(KIB);
    let tester = SpeedTester::new(client()).with_plan(plan);

    let report = tester
        .run_speed_test(&ProgressSender::disabled(), None, &CancellationToken::new())
        .await;

    assert_eq!(report.outcome.ping_ms, None);
    assert_eq!(report.outcome.download_mbps, None);
    assert_eq!(report.outcome.upload_mbps, None);

    let card = OutputFormatterFactory::create_plain_formatter().format_speed_report(&report);
    assert!(card.contains("Unknown"));
}

#[tokio::test]
async fn test_endpoint_refresh_and_selection() {
    let server = speed_server().await;
    let live = server.uri().replace("127.0.0.1", "localhost");
    let endpoints = vec![
        EndpointCandidate::new("Automatic (Recommended)", "auto", "Nearest", "Auto"),
        EndpointCandidate::new("Mock Live", live.clone(), "Local", "Test"),
        EndpointCandidate::new("Mock Dead", "http://localhost:1", "Nowhere", "Test"),
    ];
    let store = EndpointStore::with_endpoints(client(), endpoints).with_timeout(Duration::from_secs(2));

    store.refresh_all().await;

    let statuses: Vec<EndpointStatus> = store.list().await.into_iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![EndpointStatus::Available, EndpointStatus::Available, EndpointStatus::Unavailable]
    );
    assert!(!store.all_remote_unavailable().await);

    assert_eq!(store.resolve_selection("mock live").await, Some(live));
    assert_eq!(store.resolve_selection("Automatic (Recommended)").await, None);
    assert_eq!(store.resolve_selection("Not Listed").await, None);
}

#[tokio::test]
async fn test_all_remote_endpoints_down() {
    let endpoints = vec![
        EndpointCandidate::new("Local Connection", "http://127.0.0.1", "Local", "Loopback"),
        EndpointCandidate::new("Dead A", "http://localhost:1", "Nowhere", "Test"),
        EndpointCandidate::new("Dead B", "http://localhost:2", "Nowhere", "Test"),
    ];
    let store = EndpointStore::with_endpoints(client(), endpoints).with_timeout(Duration::from_secs(1));

    store.refresh_all().await;

    assert_eq!(store.get("Local Connection").await.unwrap().status, EndpointStatus::Available);
    assert!(store.all_remote_unavailable().await);
}
