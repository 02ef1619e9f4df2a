//! Echo probes timed from a TCP connect handshake

use super::EchoProber;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Measures the time to complete (or be refused by) a TCP handshake.
///
/// A refused connection still proves the host answered, so it counts as a
/// reply. Ports are tried in order until one answers.
#[derive(Debug, Clone)]
pub struct TcpConnectProber {
    ports: Vec<u16>,
}

impl TcpConnectProber {
    pub fn new(ports: Vec<u16>) -> Self {
        Self { ports }
    }
}

impl Default for TcpConnectProber {
    fn default() -> Self {
        Self::new(vec![443, 80])
    }
}

#[async_trait]
impl EchoProber for TcpConnectProber {
    async fn echo(&self, addr: IpAddr, timeout: Duration) -> Option<f64> {
        let deadline = Instant::now() + timeout;

        for &port in &self.ports {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }

            let started = Instant::now();
            match tokio::time::timeout(remaining, TcpStream::connect(SocketAddr::new(addr, port))).await {
                Ok(Ok(_stream)) => return Some(started.elapsed().as_secs_f64() * 1000.0),
                Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                    return Some(started.elapsed().as_secs_f64() * 1000.0)
                }
                Ok(Err(_)) => continue,
                Err(_) => return None,
            }
        }

        None
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}
