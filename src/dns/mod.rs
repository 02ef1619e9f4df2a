//! Target address resolution and DNS resolver discovery

pub mod platform;

use crate::error::{AppError, Result};
use std::net::IpAddr;
use std::time::Duration;
use trust_dns_resolver::{system_conf, TokioAsyncResolver};

/// Upper bound on a single hostname resolution
pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves user-entered targets (IP literals or host names) to addresses
#[derive(Clone)]
pub struct AddressResolver {
    /// System resolver; `None` when the system configuration could not be read
    resolver: Option<TokioAsyncResolver>,
    timeout: Duration,
}

impl AddressResolver {
    /// Build a resolver from the system DNS configuration
    pub fn from_system() -> Self {
        let resolver = match system_conf::read_system_conf() {
            Ok((config, opts)) => Some(TokioAsyncResolver::tokio(config, opts)),
            Err(_) => None,
        };

        Self {
            resolver,
            timeout: RESOLVE_TIMEOUT,
        }
    }

    /// Override the resolution deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve a target to a single address, preferring IPv4.
    ///
    /// Returns `None` for an empty target or when no address can be found;
    /// callers treat that as an unreachable target.
    pub async fn resolve_target(&self, target: &str) -> Option<IpAddr> {
        let addrs = self.resolve_all(target).await.ok()?;
        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
    }

    /// Resolve a target to every address the resolver returns
    pub async fn resolve_all(&self, target: &str) -> Result<Vec<IpAddr>> {
        let target = normalize_target(target)
            .ok_or_else(|| AppError::validation("Target cannot be empty"))?;

        if let Ok(ip) = target.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        match tokio::time::timeout(self.timeout, self.lookup(target)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout(format!(
                "Resolving {} took longer than {}s",
                target,
                self.timeout.as_secs()
            ))),
        }
    }

    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>> {
        if let Some(resolver) = &self.resolver {
            let response = resolver
                .lookup_ip(host)
                .await
                .map_err(|e| AppError::dns_resolution(format!("DNS lookup failed for {}: {}", host, e)))?;
            let ips: Vec<IpAddr> = response.iter().collect();
            if ips.is_empty() {
                return Err(AppError::dns_resolution(format!("No addresses found for {}", host)));
            }
            return Ok(ips);
        }

        // No usable resolver configuration; fall back to the OS resolver
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| AppError::dns_resolution(format!("DNS lookup failed for {}: {}", host, e)))?;
        let ips: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
        if ips.is_empty() {
            return Err(AppError::dns_resolution(format!("No addresses found for {}", host)));
        }
        Ok(ips)
    }
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self::from_system()
    }
}

/// Trim a user-entered target; IPv6 literals may be wrapped in brackets
pub fn normalize_target(target: &str) -> Option<&str> {
    let trimmed = target.trim();
    let trimmed = trimmed
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(trimmed);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// DNS servers configured on this machine.
///
/// Reads the platform source first (`/etc/resolv.conf`, or `ipconfig /all` on
/// Windows) and falls back to the resolver's own view of the system
/// configuration.
pub async fn system_dns_servers() -> Vec<String> {
    let servers = platform::read_platform_dns_servers().await;
    if !servers.is_empty() {
        return servers;
    }

    match system_conf::read_system_conf() {
        Ok((config, _)) => {
            let mut servers: Vec<String> = Vec::new();
            for ns in config.name_servers() {
                let ip = ns.socket_addr.ip().to_string();
                if !servers.contains(&ip) {
                    servers.push(ip);
                }
            }
            servers
        }
        Err(_) => Vec::new(),
    }
}
