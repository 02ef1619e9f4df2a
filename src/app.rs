//! Main application orchestration and execution
//!
//! [`App`] owns the long-lived pieces (configuration, loggers, the worker
//! pool, the HTTP client and the shutdown token) and drives one subcommand
//! at a time. Measurements run on the pool; this side only renders the
//! progress and result messages they send back.

use crate::{
    cli::{Cli, Command, ConfigArgs, ServersArgs},
    client::HttpClientFactory,
    config::{display_config_summary, EnvManager},
    defaults,
    dns::AddressResolver,
    error::{AppError, Result},
    executor::{processes::terminate_child_processes, ShutdownOutcome, WorkerPool},
    log_debug, log_info, log_warn,
    logging::{ErrorEventLogger, LogSink, Logger, LoggerFactory},
    models::Config,
    netinfo::{connectivity_failure_message, ConnectivityChecker, NetworkInspector},
    output::{OutputFormatter, OutputFormatterFactory},
    probe::{create_prober, LatencyProber},
    quality::{ping_verdict, throughput_verdict},
    speedtest::{
        download::LIVE_PROGRESS,
        endpoints::{EndpointStore, OFFLINE_WARNING},
        SpeedTestPlan, SpeedTester,
    },
    stats::PingStatistics,
    trace::{RouteTracer, TraceOutcome, TraceVerdict},
    types::{ProgressEvent, ProgressSender},
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How long the `speed` command waits for the background availability
/// refresh before listing endpoints
const REFRESH_WAIT: Duration = Duration::from_secs(5);

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
    config: Config,
    loggers: LoggerFactory,
    logger: Logger,
    errors: ErrorEventLogger,
    pool: WorkerPool,
    client: reqwest::Client,
    formatter: Box<dyn OutputFormatter>,
    shutdown: CancellationToken,
}

impl App {
    /// Build the application for an already loaded configuration
    pub async fn new(cli: Cli, config: Config, sink: Option<LogSink>) -> Result<Self> {
        let loggers = LoggerFactory::new(config.clone(), sink);
        let logger = loggers.create_logger("APP").await;
        let errors = loggers.create_error_logger().await;
        let client = HttpClientFactory::new(&config).create()?;
        let formatter = OutputFormatterFactory::create_formatter(config.enable_color, config.verbose);

        Ok(Self {
            pool: WorkerPool::new(config.workers),
            cli,
            config,
            loggers,
            logger,
            errors,
            client,
            formatter,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token cancelled on Ctrl-C and at shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the selected subcommand, then shut the pool down
    pub async fn run(&self) -> Result<()> {
        log_info!(
            self.logger,
            "{} v{} starting '{}' (session {})",
            crate::PKG_NAME,
            crate::VERSION,
            self.cli.command_name(),
            self.loggers.session_id()
        );
        if self.config.debug {
            log_debug!(
                self.logger,
                "Built {} from {}",
                crate::BUILD_TIME,
                crate::GIT_COMMIT.unwrap_or("unknown commit")
            );
            log_debug!(self.logger, "Effective configuration:\n{}", display_config_summary(&self.config));
        }

        let watcher = self.watch_interrupt();

        let result = match &self.cli.command {
            Command::Ping(args) => self.run_ping(&args.target).await,
            Command::Trace(args) => self.run_trace(&args.target).await,
            Command::Info => self.run_info().await,
            Command::Speed(_) => self.run_speed().await,
            Command::Servers(args) => self.run_servers(args).await,
            Command::Config(args) => self.run_config(args),
        };

        if let Err(error) = &result {
            self.errors.log_error(error, Some(self.cli.command_name()), None).await;
        }

        watcher.abort();
        self.shutdown().await;
        result
    }

    /// Cancel outstanding work, drain the pool and kill leftover children
    pub async fn shutdown(&self) {
        log_info!(self.logger, "Shutting down application");
        self.shutdown.cancel();

        match self.pool.shutdown(defaults::SHUTDOWN_GRACE).await {
            ShutdownOutcome::Drained => log_debug!(self.logger, "Worker pool drained"),
            ShutdownOutcome::Aborted(count) => {
                log_warn!(self.logger, "Aborted {} task(s) still running after the grace period", count)
            }
        }

        let killed = terminate_child_processes(Some(&self.logger)).await;
        if !killed.is_empty() {
            log_info!(self.logger, "Terminated {} child process(es)", killed.len());
        }
    }

    fn watch_interrupt(&self) -> tokio::task::JoinHandle<()> {
        let token = self.shutdown.clone();
        let logger = self.logger.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log_warn!(logger, "Interrupt received, cancelling running diagnostics");
                token.cancel();
            }
        })
    }

    async fn run_ping(&self, target: &str) -> Result<()> {
        let prober = LatencyProber::new(AddressResolver::from_system(), create_prober(self.config.probe_method))
            .with_logger(self.loggers.create_network_logger().await);
        let count = self.config.ping_count;
        let interval = self.config.ping_interval();

        println!(
            "{}",
            self.formatter.format_header(&format!(
                "Pinging {} with {} probes via {}",
                target, count, self.config.probe_method
            ))
        );

        let (progress, events) = ProgressSender::channel();
        let cancel = self.shutdown.clone();
        let owned_target = target.to_string();
        let handle = self.pool.submit(async move {
            prober.probe(&owned_target, count, interval, &cancel, &progress).await
        })?;
        self.render_progress(events).await;
        let report = handle.await?;

        if report.resolved.is_none() {
            println!("{}", self.formatter.format_warning(&format!("Could not resolve {}", target)));
        }
        for (index, sample) in report.samples.iter().enumerate() {
            println!("{}", self.formatter.format_ping_sample(target, index + 1, sample));
        }

        let stats = PingStatistics::from_report(&report);
        println!();
        println!("{}", self.formatter.format_ping_summary(&report, &stats));
        println!();
        println!("{}", self.formatter.format_verdict(&ping_verdict(stats.average(), report.loss_percent)));

        if report.cancelled {
            return Err(AppError::cancelled("ping interrupted"));
        }
        Ok(())
    }

    async fn run_trace(&self, target: &str) -> Result<()> {
        let tracer =
            RouteTracer::new(self.config.trace_timeout()).with_logger(self.loggers.create_logger("TRACE").await);
        let max_hops = self.config.max_hops;

        println!(
            "{}",
            self.formatter
                .format_header(&format!("Tracing route to {} (max {} hops)", target, max_hops))
        );

        let (lines_tx, mut lines_rx) = mpsc::unbounded_channel();
        let cancel = self.shutdown.clone();
        let owned_target = target.to_string();
        let handle = self.pool.submit(async move {
            tracer.trace(&owned_target, max_hops, &cancel, Some(&lines_tx)).await
        })?;

        let mut lines = Vec::new();
        while let Some(line) = lines_rx.recv().await {
            println!("{}", self.formatter.format_trace_line(&line));
            lines.push(line);
        }
        let outcome = handle.await?;

        let verdict = TraceVerdict::from_outcome(&outcome, &lines);
        println!();
        println!("{}", self.formatter.format_trace_verdict(&verdict));

        match outcome {
            TraceOutcome::Completed(_) => Ok(()),
            TraceOutcome::Cancelled => Err(AppError::cancelled("trace interrupted")),
            TraceOutcome::TimedOut(limit) => Err(AppError::timeout(format!(
                "trace to {} exceeded {} seconds",
                target,
                limit.as_secs()
            ))),
            TraceOutcome::Errored(message) => Err(AppError::subprocess(message)),
        }
    }

    async fn run_info(&self) -> Result<()> {
        let inspector =
            NetworkInspector::new(self.client.clone()).with_logger(self.loggers.create_logger("INFO").await);

        println!("{}", self.formatter.format_header("Network Information"));
        let info = self.pool.submit(async move { inspector.collect().await })?.await?;
        println!("{}", self.formatter.format_network_info(&info));
        Ok(())
    }

    async fn run_speed(&self) -> Result<()> {
        let store = EndpointStore::new(self.client.clone());
        let selected_url = store.resolve_selection(&self.config.speedtest_server).await;
        let refresh = store.spawn_refresh();

        println!(
            "{}",
            self.formatter.format_header(&format!(
                "Speed Test ({})",
                if selected_url.is_some() {
                    self.config.speedtest_server.as_str()
                } else {
                    defaults::DEFAULT_SPEEDTEST_SERVER
                }
            ))
        );

        let tester = SpeedTester::new(self.client.clone())
            .with_plan(SpeedTestPlan::default().with_transfer_timeout(self.config.http_timeout()))
            .with_logger(self.loggers.create_network_logger().await);
        let (progress, events) = ProgressSender::channel();
        let cancel = self.shutdown.clone();
        let handle = self.pool.submit(async move {
            tester.run_speed_test(&progress, selected_url.as_deref(), &cancel).await
        })?;
        self.render_progress(events).await;
        let report = handle.await?;

        println!();
        println!("{}", self.formatter.format_speed_report(&report));
        if report.cancelled {
            return Err(AppError::cancelled("speed test interrupted"));
        }

        let outcome = &report.outcome;
        let message = if outcome.download_mbps.is_some() && outcome.upload_mbps.is_some() {
            ""
        } else {
            let connected = ConnectivityChecker::default()
                .check(&self.client, Some(&self.logger))
                .await;
            connectivity_failure_message(connected)
        };
        println!();
        println!(
            "{}",
            self.formatter
                .format_verdict(&throughput_verdict(outcome.download_mbps, outcome.upload_mbps, message))
        );

        if tokio::time::timeout(REFRESH_WAIT, refresh).await.is_err() {
            log_debug!(self.logger, "Endpoint refresh still running, listing last known status");
        }
        self.print_endpoints(&store).await;
        Ok(())
    }

    async fn run_servers(&self, args: &ServersArgs) -> Result<()> {
        let store = EndpointStore::new(self.client.clone());
        if args.refresh {
            println!("Checking endpoint availability...");
            store.refresh_all().await;
        }
        self.print_endpoints(&store).await;
        Ok(())
    }

    fn run_config(&self, args: &ConfigArgs) -> Result<()> {
        if args.env_help {
            println!("{}", EnvManager::display_env_help());
            return Ok(());
        }

        if let Some(path) = &args.write_example {
            EnvManager::save_example_env_file(path)?;
            println!(
                "{}",
                self.formatter
                    .format_success(&format!("Example configuration written to {}", path.display()))
            );
            return Ok(());
        }

        println!("{}", self.formatter.format_header("Effective Configuration"));
        println!("{}", display_config_summary(&self.config));
        for warning in EnvManager::validate_current_env() {
            println!("{}", self.formatter.format_warning(&warning));
        }
        Ok(())
    }

    async fn print_endpoints(&self, store: &EndpointStore) {
        println!();
        println!("{}", self.formatter.format_endpoints(&store.list().await));
        if store.all_remote_unavailable().await {
            println!("{}", self.formatter.format_warning(OFFLINE_WARNING));
        }
    }

    /// Print progress on stderr until the sending task finishes
    async fn render_progress(&self, mut events: mpsc::UnboundedReceiver<ProgressEvent>) {
        let mut view = ProgressView::new(self.formatter.as_ref());
        while let Some(event) = events.recv().await {
            view.show(&event);
        }
        view.finish();
    }
}

/// Stage messages get their own line; bare percentages and live rates
/// overwrite the current one
struct ProgressView<'a> {
    formatter: &'a dyn OutputFormatter,
    open_line: bool,
}

impl<'a> ProgressView<'a> {
    fn new(formatter: &'a dyn OutputFormatter) -> Self {
        Self {
            formatter,
            open_line: false,
        }
    }

    fn show(&mut self, event: &ProgressEvent) {
        let text = self.formatter.format_progress(event);
        if Self::overwrites(event) {
            eprint!("\r{}", text);
            self.open_line = true;
        } else {
            self.finish();
            eprintln!("{}", text);
        }
    }

    fn finish(&mut self) {
        if self.open_line {
            eprintln!();
            self.open_line = false;
        }
    }

    fn overwrites(event: &ProgressEvent) -> bool {
        event.message.is_none() || event.percent == LIVE_PROGRESS
    }
}
