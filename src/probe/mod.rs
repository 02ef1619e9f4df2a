//! Latency prober: a bounded sequence of echo probes against one target

pub mod system;
pub mod tcp;

pub use system::SystemPingProber;
pub use tcp::TcpConnectProber;

use crate::{
    dns::AddressResolver,
    logging::NetworkLogger,
    models::{PingReport, ProbeSample},
    types::{ProbeMethod, ProgressSender},
};
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sends a single echo request and reports its round-trip time
#[async_trait]
pub trait EchoProber: Send + Sync {
    /// RTT in milliseconds, or `None` when no reply arrived within `timeout`
    async fn echo(&self, addr: IpAddr, timeout: Duration) -> Option<f64>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Create the prober for a configured method
pub fn create_prober(method: ProbeMethod) -> Arc<dyn EchoProber> {
    match method {
        ProbeMethod::System => Arc::new(SystemPingProber::new()),
        ProbeMethod::Tcp => Arc::new(TcpConnectProber::default()),
    }
}

/// Runs ping sequences: resolve, probe `count` times, account for loss
#[derive(Clone)]
pub struct LatencyProber {
    resolver: AddressResolver,
    prober: Arc<dyn EchoProber>,
    probe_timeout: Duration,
    logger: Option<NetworkLogger>,
}

impl LatencyProber {
    pub fn new(resolver: AddressResolver, prober: Arc<dyn EchoProber>) -> Self {
        Self {
            resolver,
            prober,
            probe_timeout: crate::defaults::DEFAULT_PROBE_TIMEOUT,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: NetworkLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Probe `target` `count` times, one probe per `interval`.
    ///
    /// An unresolvable target yields an empty series with 100 % loss and no
    /// probe is sent. Progress is reported as `index / count * 100` before
    /// each probe and `100` at the end. When `cancel` fires the run stops at
    /// the next probe boundary and the report carries the probes completed
    /// so far with `cancelled` set.
    pub async fn probe(
        &self,
        target: &str,
        count: u32,
        interval: Duration,
        cancel: &CancellationToken,
        progress: &ProgressSender,
    ) -> PingReport {
        let Some(addr) = self.resolver.resolve_target(target).await else {
            if let Some(logger) = &self.logger {
                logger
                    .logger()
                    .warn(&format!("Could not resolve {}", target))
                    .field("target", target)
                    .log()
                    .await;
            }
            progress.percent(100.0);
            return PingReport::unreachable(target);
        };

        let mut samples = Vec::with_capacity(count as usize);
        let mut cancelled = false;

        for index in 0..count {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            progress.percent(index as f64 / count as f64 * 100.0);

            let rtt = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                rtt = self.prober.echo(addr, self.probe_timeout) => rtt,
            };

            if let Some(logger) = &self.logger {
                logger.log_probe(target, index + 1, rtt).await;
            }
            samples.push(rtt.map_or(ProbeSample::Lost, ProbeSample::Reply));

            if index + 1 < count {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        progress.percent(100.0);

        let report = PingReport::from_samples(target, addr, samples, cancelled);
        if let Some(logger) = &self.logger {
            logger
                .logger()
                .info(&format!(
                    "Ping {} ({}) finished: {} probes via {}, {:.1}% loss{}",
                    target,
                    addr,
                    report.samples.len(),
                    self.prober.name(),
                    report.loss_percent,
                    if cancelled { ", cancelled" } else { "" }
                ))
                .log()
                .await;
        }
        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::ProgressEvent;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a scripted sequence of RTTs, cycling when exhausted
    pub(crate) struct ScriptedProber {
        script: Vec<Option<f64>>,
        calls: AtomicUsize,
        delay: Duration,
        addrs: Mutex<Vec<IpAddr>>,
    }

    impl ScriptedProber {
        pub(crate) fn new(script: Vec<Option<f64>>) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                addrs: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EchoProber for ScriptedProber {
        async fn echo(&self, addr: IpAddr, _timeout: Duration) -> Option<f64> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.addrs.lock().unwrap().push(addr);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.script.is_empty() {
                return None;
            }
            self.script[n % self.script.len()]
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn prober_with(script: Vec<Option<f64>>) -> (LatencyProber, Arc<ScriptedProber>) {
        let scripted = Arc::new(ScriptedProber::new(script));
        let prober = LatencyProber::new(
            AddressResolver::from_system().with_timeout(Duration::from_secs(2)),
            scripted.clone(),
        );
        (prober, scripted)
    }

    #[tokio::test]
    async fn test_probe_counts_and_loss() {
        let (prober, scripted) = prober_with(vec![Some(12.0), None, Some(18.0), None]);
        let cancel = CancellationToken::new();

        let report = prober
            .probe("127.0.0.1", 4, Duration::from_millis(1), &cancel, &ProgressSender::disabled())
            .await;

        assert_eq!(scripted.calls(), 4);
        assert_eq!(report.samples.len(), 4);
        assert_eq!(report.latencies_ms(), vec![12.0, 0.0, 18.0, 0.0]);
        assert_eq!(report.loss_percent, 50.0);
        assert_eq!(report.resolved, Some("127.0.0.1".parse().unwrap()));
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_progress_before_each_probe_then_complete() {
        let (prober, _) = prober_with(vec![Some(5.0)]);
        let (progress, mut rx) = ProgressSender::channel();
        let cancel = CancellationToken::new();

        prober
            .probe("127.0.0.1", 4, Duration::from_millis(1), &cancel, &progress)
            .await;
        drop(progress);

        let mut percents = Vec::new();
        while let Some(ProgressEvent { percent, .. }) = rx.recv().await {
            percents.push(percent);
        }
        assert_eq!(percents, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    }

    #[tokio::test]
    async fn test_empty_target_short_circuits() {
        let (prober, scripted) = prober_with(vec![Some(5.0)]);
        let cancel = CancellationToken::new();

        let report = prober
            .probe("", 4, Duration::from_millis(1), &cancel, &ProgressSender::disabled())
            .await;

        assert_eq!(scripted.calls(), 0);
        assert!(report.samples.is_empty());
        assert_eq!(report.loss_percent, 100.0);
    }

    #[tokio::test]
    async fn test_unresolvable_host_short_circuits() {
        let (prober, scripted) = prober_with(vec![Some(5.0)]);
        let cancel = CancellationToken::new();

        let report = prober
            .probe("no-such-host.invalid", 3, Duration::from_millis(1), &cancel, &ProgressSender::disabled())
            .await;

        assert_eq!(scripted.calls(), 0);
        assert!(report.samples.is_empty());
        assert_eq!(report.loss_percent, 100.0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (prober, scripted) = prober_with(vec![Some(5.0)]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = prober
            .probe("127.0.0.1", 10, Duration::from_millis(1), &cancel, &ProgressSender::disabled())
            .await;

        assert_eq!(scripted.calls(), 0);
        assert!(report.cancelled);
        assert!(report.samples.is_empty());
        assert_eq!(report.loss_percent, 100.0);
    }

    #[tokio::test]
    async fn test_cancel_mid_sequence_stops_within_one_interval() {
        let (prober, scripted) = prober_with(vec![Some(1.0)]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let report = prober
            .probe("127.0.0.1", 100, Duration::from_millis(50), &cancel, &ProgressSender::disabled())
            .await;

        assert!(report.cancelled);
        assert!(!report.samples.is_empty());
        assert!(report.samples.len() < 100);
        assert_eq!(report.samples.len(), scripted.calls());
        assert_eq!(report.loss_percent, 0.0);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_in_flight_probe() {
        let scripted = Arc::new(ScriptedProber::new(vec![Some(1.0)]).with_delay(Duration::from_secs(30)));
        let prober = LatencyProber::new(AddressResolver::from_system(), scripted.clone());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            prober.probe("127.0.0.1", 3, Duration::from_millis(1), &cancel, &ProgressSender::disabled()),
        )
        .await
        .expect("cancellation must interrupt the probe");

        assert!(report.cancelled);
        assert!(report.samples.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_series_length_matches_count(
            script in proptest::collection::vec(proptest::option::of(0.5f64..500.0), 1..8),
            count in 1u32..20,
        ) {
            let report = tokio_test::block_on(async {
                let (prober, _) = prober_with(script);
                let cancel = CancellationToken::new();
                prober
                    .probe("127.0.0.1", count, Duration::ZERO, &cancel, &ProgressSender::disabled())
                    .await
            });

            prop_assert_eq!(report.samples.len(), count as usize);
            prop_assert!(report.loss_percent >= 0.0 && report.loss_percent <= 100.0);
        }
    }
}
