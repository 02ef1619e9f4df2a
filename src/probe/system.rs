//! Echo probes through the operating system `ping` utility

use super::EchoProber;
use async_trait::async_trait;
use regex::Regex;
use std::net::IpAddr;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

fn rtt_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)time\s*([=<])\s*([0-9]+(?:[.,][0-9]+)?)\s*ms").expect("static RTT pattern")
    })
}

/// Extract the round-trip time of a single-reply `ping` run.
///
/// Handles the Unix (`time=14.2 ms`) and Windows (`time=14ms`, `time<1ms`)
/// forms; `time<1ms` maps to `0.5`.
pub fn parse_ping_rtt(output: &str) -> Option<f64> {
    let caps = rtt_pattern().captures(output)?;
    let value: f64 = caps.get(2)?.as_str().replace(',', ".").parse().ok()?;
    if caps.get(1)?.as_str() == "<" {
        Some(value / 2.0)
    } else {
        Some(value)
    }
}

/// Arguments for one echo request with the given timeout
pub fn ping_args(addr: IpAddr, timeout: Duration) -> Vec<String> {
    let secs = timeout.as_secs().max(1);
    let mut args = Vec::new();

    if cfg!(target_os = "windows") {
        args.extend(["-n".to_string(), "1".to_string()]);
        args.extend(["-w".to_string(), timeout.as_millis().max(1).to_string()]);
        if addr.is_ipv6() {
            args.push("-6".to_string());
        }
    } else if cfg!(target_os = "macos") {
        args.extend(["-c".to_string(), "1".to_string()]);
        args.extend(["-W".to_string(), timeout.as_millis().max(1).to_string()]);
    } else {
        args.extend(["-c".to_string(), "1".to_string()]);
        args.extend(["-W".to_string(), secs.to_string()]);
        if addr.is_ipv6() {
            args.push("-6".to_string());
        }
    }

    args.push(addr.to_string());
    args
}

/// Runs `ping` once per probe
#[derive(Debug, Clone)]
pub struct SystemPingProber {
    program: String,
}

impl SystemPingProber {
    pub fn new() -> Self {
        Self {
            program: "ping".to_string(),
        }
    }

    /// Use a different executable (for example `ping6`)
    pub fn with_program<S: Into<String>>(program: S) -> Self {
        Self { program: program.into() }
    }
}

impl Default for SystemPingProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EchoProber for SystemPingProber {
    async fn echo(&self, addr: IpAddr, timeout: Duration) -> Option<f64> {
        let started = Instant::now();
        let child = tokio::process::Command::new(&self.program)
            .args(ping_args(addr, timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        // The utility enforces its own timeout; the outer bound covers a hung process
        let output = tokio::time::timeout(timeout + Duration::from_secs(1), child)
            .await
            .ok()?
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Some(parse_ping_rtt(&stdout).unwrap_or_else(|| started.elapsed().as_secs_f64() * 1000.0))
    }

    fn name(&self) -> &'static str {
        "ping"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unix_output() {
        let output = "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.\n\
64 bytes from 8.8.8.8: icmp_seq=1 ttl=118 time=15.2 ms\n\n\
--- 8.8.8.8 ping statistics ---\n\
1 packets transmitted, 1 received, 0% packet loss, time 0ms";
        assert_eq!(parse_ping_rtt(output), Some(15.2));
    }

    #[test]
    fn test_parse_windows_output() {
        let output = "Reply from 1.1.1.1: bytes=32 time=14ms TTL=57";
        assert_eq!(parse_ping_rtt(output), Some(14.0));

        let output = "Reply from 192.168.1.1: bytes=32 time<1ms TTL=64";
        assert_eq!(parse_ping_rtt(output), Some(0.5));
    }

    #[test]
    fn test_parse_no_reply() {
        let output = "PING 10.255.255.1 (10.255.255.1) 56(84) bytes of data.\n\n\
--- 10.255.255.1 ping statistics ---\n1 packets transmitted, 0 received, 100% packet loss, time 0ms";
        assert_eq!(parse_ping_rtt(output), None);
    }

    #[test]
    fn test_args_end_with_address() {
        let args = ping_args("192.0.2.1".parse().unwrap(), Duration::from_secs(2));
        assert_eq!(args.last().map(String::as_str), Some("192.0.2.1"));
        assert!(args.contains(&"1".to_string()));
    }

    #[tokio::test]
    async fn test_missing_program_counts_as_lost() {
        let prober = SystemPingProber::with_program("definitely-not-a-ping-binary");
        let rtt = prober.echo("127.0.0.1".parse().unwrap(), Duration::from_secs(1)).await;
        assert_eq!(rtt, None);
    }
}
