//! Route tracing through the native `traceroute` / `tracert` utility
//!
//! The tracer owns the subprocess for its whole lifetime. Output is streamed
//! line by line over a channel as it arrives, and every exit path (completion,
//! cancellation, timeout, read failure) leaves no tracer process behind.

use crate::logging::Logger;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Stdio;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn less_than_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<\d+").expect("static pattern"))
}

/// Replace "less than N" tokens such as `<1` with `0`
pub fn normalize_line(line: &str) -> String {
    less_than_pattern().replace_all(line, "0").into_owned()
}

/// A hop line is high latency when it mentions `ms` and any integer token
/// exceeds the threshold. Decimal values directly followed by `ms` (the Unix
/// `12.345 ms` form) are judged the same way.
pub fn is_high_latency(line: &str) -> bool {
    if !line.contains("ms") {
        return false;
    }

    let threshold = crate::defaults::HIGH_LATENCY_HOP_MS;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    tokens.iter().enumerate().any(|(i, token)| {
        if token.chars().all(|c| c.is_ascii_digit()) {
            return token.parse::<u64>().is_ok_and(|v| v > threshold);
        }
        if tokens.get(i + 1) == Some(&"ms") {
            return token.parse::<f64>().is_ok_and(|v| v > threshold as f64);
        }
        false
    })
}

/// One line of tracer output, already normalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceLine {
    pub text: String,
    pub high_latency: bool,
}

impl TraceLine {
    pub fn new(raw: &str) -> Self {
        let text = normalize_line(raw);
        let high_latency = is_high_latency(&text);
        Self { text, high_latency }
    }
}

/// Terminal state of a trace run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceOutcome {
    /// Full normalized output
    Completed(String),
    /// The shutdown signal stopped the run
    Cancelled,
    /// The overall deadline passed
    TimedOut(Duration),
    /// Launch failure, read failure or non-zero exit (with stderr)
    Errored(String),
}

impl fmt::Display for TraceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceOutcome::Completed(output) => f.write_str(output),
            TraceOutcome::Cancelled => f.write_str("Trace route cancelled due to application shutdown"),
            TraceOutcome::TimedOut(after) => {
                write!(f, "Trace route timed out after {} seconds", after.as_secs())
            }
            TraceOutcome::Errored(message) => write!(f, "Error: {}", message),
        }
    }
}

/// Summary of a finished trace for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceVerdict {
    Failed(String),
    TimedOut,
    Cancelled,
    HighLatency,
    Healthy,
}

impl TraceVerdict {
    /// Judge an outcome, using the streamed lines for latency
    pub fn from_outcome(outcome: &TraceOutcome, lines: &[TraceLine]) -> Self {
        match outcome {
            TraceOutcome::Errored(message) => TraceVerdict::Failed(message.clone()),
            TraceOutcome::TimedOut(_) => TraceVerdict::TimedOut,
            TraceOutcome::Cancelled => TraceVerdict::Cancelled,
            TraceOutcome::Completed(output) => {
                let high = if lines.is_empty() {
                    output.lines().any(is_high_latency)
                } else {
                    lines.iter().any(|l| l.high_latency)
                };
                if high {
                    TraceVerdict::HighLatency
                } else {
                    TraceVerdict::Healthy
                }
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            TraceVerdict::Failed(message) => format!("Trace route failed: {}", message),
            TraceVerdict::TimedOut => "Trace route timed out. The target may be unreachable.".to_string(),
            TraceVerdict::Cancelled => "Trace route cancelled.".to_string(),
            TraceVerdict::HighLatency => "High-latency hops detected in the route. They are highlighted above.".to_string(),
            TraceVerdict::Healthy => "Trace route completed successfully with good latency.".to_string(),
        }
    }
}

/// Program and arguments of a tracer invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TraceCommand {
    /// Native tracer for this platform with a bounded hop count
    pub fn for_target(target: &str, max_hops: u32) -> Self {
        if cfg!(target_os = "windows") {
            Self {
                program: "tracert".to_string(),
                args: vec!["-h".to_string(), max_hops.to_string(), target.to_string()],
            }
        } else {
            Self {
                program: "traceroute".to_string(),
                args: vec!["-m".to_string(), max_hops.to_string(), target.to_string()],
            }
        }
    }

    /// Arbitrary command, used for alternative tracers
    pub fn custom<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// Runs tracer subprocesses
#[derive(Debug, Clone)]
pub struct RouteTracer {
    timeout: Duration,
    logger: Option<Logger>,
    last_pid: Arc<Mutex<Option<u32>>>,
}

impl RouteTracer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            logger: None,
            last_pid: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// PID of the most recently launched tracer
    pub fn last_pid(&self) -> Option<u32> {
        self.last_pid.lock().ok().and_then(|pid| *pid)
    }

    /// Trace the route to `target`, streaming each line into `lines`
    pub async fn trace(
        &self,
        target: &str,
        max_hops: u32,
        cancel: &CancellationToken,
        lines: Option<&mpsc::UnboundedSender<TraceLine>>,
    ) -> TraceOutcome {
        let Some(target) = crate::dns::normalize_target(target) else {
            return TraceOutcome::Errored("target cannot be empty".to_string());
        };
        if target.starts_with('-') {
            return TraceOutcome::Errored(format!("invalid target '{}'", target));
        }

        self.run(TraceCommand::for_target(target, max_hops), cancel, lines).await
    }

    /// Run a tracer command to completion, cancellation or timeout
    pub async fn run(
        &self,
        command: TraceCommand,
        cancel: &CancellationToken,
        lines: Option<&mpsc::UnboundedSender<TraceLine>>,
    ) -> TraceOutcome {
        if cancel.is_cancelled() {
            return self.finish(TraceOutcome::Cancelled).await;
        }

        let mut child = match Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return self
                    .finish(TraceOutcome::Errored(format!("failed to start {}: {}", command.program, e)))
                    .await
            }
        };

        if let Ok(mut pid) = self.last_pid.lock() {
            *pid = child.id();
        }
        if let Some(logger) = &self.logger {
            logger
                .info(&format!("Started {} {}", command.program, command.args.join(" ")))
                .field("pid", child.id())
                .log()
                .await;
        }

        let (Some(stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
            terminate(&mut child).await;
            return self
                .finish(TraceOutcome::Errored("tracer output is not available".to_string()))
                .await;
        };

        // Drain stderr concurrently so a chatty tracer cannot block on a full pipe
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).into_owned()
        });

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        let mut output = String::new();

        loop {
            buf.clear();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    terminate(&mut child).await;
                    stderr_task.abort();
                    return self.finish(TraceOutcome::Cancelled).await;
                }
                _ = &mut deadline => {
                    terminate(&mut child).await;
                    stderr_task.abort();
                    return self.finish(TraceOutcome::TimedOut(self.timeout)).await;
                }
                read = reader.read_until(b'\n', &mut buf) => match read {
                    Ok(0) => break,
                    Ok(_) => {
                        let raw = String::from_utf8_lossy(&buf);
                        let line = TraceLine::new(raw.trim_end_matches(['\r', '\n']));
                        output.push_str(&line.text);
                        output.push('\n');
                        if let Some(tx) = lines {
                            let _ = tx.send(line);
                        }
                    }
                    Err(e) => {
                        terminate(&mut child).await;
                        stderr_task.abort();
                        return self.finish(TraceOutcome::Errored(format!("failed to read tracer output: {}", e))).await;
                    }
                }
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                terminate(&mut child).await;
                stderr_task.abort();
                return self.finish(TraceOutcome::Cancelled).await;
            }
            _ = &mut deadline => {
                terminate(&mut child).await;
                stderr_task.abort();
                return self.finish(TraceOutcome::TimedOut(self.timeout)).await;
            }
            status = child.wait() => status,
        };

        let outcome = match status {
            Ok(status) if status.success() => TraceOutcome::Completed(output),
            Ok(status) => {
                let stderr = stderr_task.await.unwrap_or_default();
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    TraceOutcome::Errored(format!("tracer exited with {}", status))
                } else {
                    TraceOutcome::Errored(stderr.to_string())
                }
            }
            Err(e) => {
                terminate(&mut child).await;
                TraceOutcome::Errored(format!("failed to wait for tracer: {}", e))
            }
        };

        self.finish(outcome).await
    }

    async fn finish(&self, outcome: TraceOutcome) -> TraceOutcome {
        if let Some(logger) = &self.logger {
            match &outcome {
                TraceOutcome::Completed(output) => {
                    logger
                        .info(&format!("Trace completed with {} lines", output.lines().count()))
                        .log()
                        .await
                }
                TraceOutcome::Cancelled => logger.info("Trace cancelled").log().await,
                TraceOutcome::TimedOut(after) => {
                    logger
                        .warn(&format!("Trace timed out after {}s", after.as_secs()))
                        .log()
                        .await
                }
                TraceOutcome::Errored(message) => {
                    logger.error(&format!("Trace failed: {}", message)).log().await
                }
            }
        }
        outcome
    }
}

/// Kill the tracer and reap it
async fn terminate(child: &mut Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}
