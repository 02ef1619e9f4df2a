//! Host network information and internet connectivity checks

use crate::logging::Logger;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;
use sysinfo::{Networks, System};
use tokio::net::TcpStream;

pub const LOCAL_IP_NOT_FOUND: &str = "Local IP not found";
pub const PUBLIC_IP_NOT_ACCESSIBLE: &str = "Public IP not accessible";
pub const GATEWAY_NOT_FOUND: &str = "Default gateway not found";
pub const PUBLIC_IP_TIMEOUT: Duration = Duration::from_secs(5);
pub const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(2);

/// Shown when a speed test fails although the connection looks alive
pub const UNRELIABLE_MESSAGE: &str =
    "Speed test failed. Your internet connection appears to be active but unreliable. Try again or select a different server.";
/// Shown when a speed test fails and no connection could be found
pub const OFFLINE_MESSAGE: &str =
    "Speed test failed. No internet connection detected. Check your network settings and connection.";

/// Failure message for a speed test given the connectivity check result
pub fn connectivity_failure_message(connected: bool) -> &'static str {
    if connected {
        UNRELIABLE_MESSAGE
    } else {
        OFFLINE_MESSAGE
    }
}

/// Snapshot of the host's network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub hostname: String,
    pub local_ip: String,
    pub public_ip: String,
    pub dns_resolvers: Vec<String>,
    /// IPv4 addresses per interface name
    pub interfaces: BTreeMap<String, Vec<String>>,
    pub default_gateway: String,
    pub error: Option<String>,
}

/// Interface-derived part of [`NetworkInfo`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterfaceSummary {
    pub interfaces: BTreeMap<String, Vec<String>>,
    pub local_ip: Option<String>,
    pub default_interface: Option<String>,
}

/// Reduce raw interface addresses to IPv4 lists, the first non-loopback IPv4
/// address and the first interface carrying one
pub fn summarize_interfaces<I>(raw: I) -> InterfaceSummary
where
    I: IntoIterator<Item = (String, Vec<IpAddr>)>,
{
    let mut summary = InterfaceSummary::default();
    let sorted: BTreeMap<String, Vec<IpAddr>> = raw.into_iter().collect();

    for (name, addrs) in sorted {
        let v4: Vec<String> = addrs
            .iter()
            .filter(|a| a.is_ipv4())
            .map(|a| a.to_string())
            .collect();

        if summary.local_ip.is_none() {
            if let Some(addr) = addrs.iter().find(|a| a.is_ipv4() && !a.is_loopback()) {
                summary.local_ip = Some(addr.to_string());
                summary.default_interface = Some(name.clone());
            }
        }
        summary.interfaces.insert(name, v4);
    }

    summary
}

fn read_interfaces() -> InterfaceSummary {
    let networks = Networks::new_with_refreshed_list();
    summarize_interfaces(networks.iter().map(|(name, data)| {
        (
            name.to_string(),
            data.ip_networks().iter().map(|net| net.addr).collect::<Vec<_>>(),
        )
    }))
}

/// Collects [`NetworkInfo`]
#[derive(Debug, Clone)]
pub struct NetworkInspector {
    client: reqwest::Client,
    public_ip_url: String,
    public_ip_timeout: Duration,
    logger: Option<Logger>,
}

impl NetworkInspector {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            public_ip_url: crate::defaults::PUBLIC_IP_URL.to_string(),
            public_ip_timeout: PUBLIC_IP_TIMEOUT,
            logger: None,
        }
    }

    pub fn with_public_ip_url<S: Into<String>>(mut self, url: S) -> Self {
        self.public_ip_url = url.into();
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Gather everything; individual failures fall back to placeholders
    pub async fn collect(&self) -> NetworkInfo {
        let mut error = None;

        let summary = match tokio::task::spawn_blocking(read_interfaces).await {
            Ok(summary) => summary,
            Err(e) => {
                let message = format!("Error retrieving network info: {}", e);
                self.log_error(&message).await;
                error = Some(e.to_string());
                InterfaceSummary::default()
            }
        };

        let hostname = tokio::task::spawn_blocking(System::host_name)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| "unknown".to_string());

        let public_ip = self.public_ip().await;
        let dns_resolvers = crate::dns::system_dns_servers().await;

        NetworkInfo {
            hostname,
            local_ip: summary.local_ip.unwrap_or_else(|| LOCAL_IP_NOT_FOUND.to_string()),
            public_ip,
            dns_resolvers,
            interfaces: summary.interfaces,
            default_gateway: summary
                .default_interface
                .unwrap_or_else(|| GATEWAY_NOT_FOUND.to_string()),
            error,
        }
    }

    /// Public address as reported by the lookup service
    pub async fn public_ip(&self) -> String {
        let result = async {
            let response = self
                .client
                .get(&self.public_ip_url)
                .timeout(self.public_ip_timeout)
                .send()
                .await?
                .error_for_status()?;
            response.text().await
        }
        .await;

        match result {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => PUBLIC_IP_NOT_ACCESSIBLE.to_string(),
            Err(e) => {
                self.log_error(&format!("Error retrieving public IP: {}", e)).await;
                PUBLIC_IP_NOT_ACCESSIBLE.to_string()
            }
        }
    }

    async fn log_error(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.error(message).log().await;
        }
    }
}

/// Decides whether the internet is reachable at all: TCP connects to a few
/// well-known hosts first, one HTTP GET as a last resort.
#[derive(Debug, Clone)]
pub struct ConnectivityChecker {
    hosts: Vec<(String, u16)>,
    http_url: String,
    timeout: Duration,
}

impl Default for ConnectivityChecker {
    fn default() -> Self {
        Self {
            hosts: crate::defaults::CONNECTIVITY_HOSTS
                .iter()
                .map(|h| (h.to_string(), 80))
                .collect(),
            http_url: crate::defaults::CONNECTIVITY_HTTP_URL.to_string(),
            timeout: CONNECTIVITY_TIMEOUT,
        }
    }
}

impl ConnectivityChecker {
    pub fn new(hosts: Vec<(String, u16)>, http_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            hosts,
            http_url: http_url.into(),
            timeout,
        }
    }

    pub async fn check(&self, client: &reqwest::Client, logger: Option<&Logger>) -> bool {
        for (host, port) in &self.hosts {
            let connect = TcpStream::connect((host.as_str(), *port));
            if let Ok(Ok(_)) = tokio::time::timeout(self.timeout, connect).await {
                if let Some(logger) = logger {
                    logger
                        .info(&format!("Internet connection available (connected to {})", host))
                        .log()
                        .await;
                }
                return true;
            }
        }

        let http_ok = crate::client::timed_request(client, reqwest::Method::GET, &self.http_url, self.timeout)
            .await
            .is_ok_and(|r| r.is_ok());

        if let Some(logger) = logger {
            if http_ok {
                logger.info("Internet connection available (HTTP request succeeded)").log().await;
            } else {
                logger
                    .warn("Internet connection unavailable - all connectivity checks failed")
                    .log()
                    .await;
            }
        }
        http_ok
    }
}
