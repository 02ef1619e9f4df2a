//! Platform-specific DNS resolver discovery

use std::net::IpAddr;

/// Read configured DNS servers from the platform's native source
pub async fn read_platform_dns_servers() -> Vec<String> {
    #[cfg(target_os = "windows")]
    {
        match tokio::process::Command::new("ipconfig").arg("/all").output().await {
            Ok(output) => parse_ipconfig(&String::from_utf8_lossy(&output.stdout)),
            Err(_) => Vec::new(),
        }
    }
    #[cfg(not(target_os = "windows"))]
    {
        match tokio::fs::read_to_string("/etc/resolv.conf").await {
            Ok(content) => parse_resolv_conf(&content),
            Err(_) => Vec::new(),
        }
    }
}

/// Extract `nameserver` entries from resolv.conf content
pub fn parse_resolv_conf(content: &str) -> Vec<String> {
    let mut servers = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let mut parts = line.split_whitespace();
        if parts.next() != Some("nameserver") {
            continue;
        }
        if let Some(server) = parts.next() {
            push_unique(&mut servers, server);
        }
    }
    servers
}

/// Extract DNS server addresses from `ipconfig /all` output.
///
/// Matches the English ("DNS Servers") and German ("DNS-Server") labels and
/// the indented continuation lines that list further servers.
pub fn parse_ipconfig(output: &str) -> Vec<String> {
    let mut servers = Vec::new();
    let mut in_dns_block = false;

    for line in output.lines() {
        if line.contains("DNS Servers") || line.contains("DNS-Server") {
            in_dns_block = true;
            if let Some((_, value)) = line.rsplit_once(" : ") {
                push_if_address(&mut servers, value);
            } else if let Some((_, value)) = line.rsplit_once(": ") {
                push_if_address(&mut servers, value);
            }
            continue;
        }

        if in_dns_block {
            let trimmed = line.trim();
            if !line.starts_with(char::is_whitespace) || trimmed.contains(" : ") || trimmed.is_empty() {
                in_dns_block = false;
                continue;
            }
            push_if_address(&mut servers, trimmed);
        }
    }

    servers
}

fn push_if_address(servers: &mut Vec<String>, value: &str) {
    let value = value.trim();
    // Strip a zone suffix such as `fec0:0:0:ffff::1%1`
    let candidate = value.split('%').next().unwrap_or(value);
    if candidate.parse::<IpAddr>().is_ok() {
        push_unique(servers, value);
    }
}

fn push_unique(servers: &mut Vec<String>, server: &str) {
    if !servers.iter().any(|s| s == server) {
        servers.push(server.to_string());
    }
}

/// Get the current platform name
pub fn get_platform_name() -> String {
    #[cfg(target_os = "windows")]
    {
        "Windows".to_string()
    }
    #[cfg(target_os = "macos")]
    {
        "macOS".to_string()
    }
    #[cfg(target_os = "linux")]
    {
        "Linux".to_string()
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        "Unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolv_conf() {
        let content = "\
# Generated by NetworkManager
search lan
nameserver 192.168.1.1
nameserver   1.1.1.1
; nameserver 9.9.9.9
nameserver 192.168.1.1
options edns0
";
        assert_eq!(parse_resolv_conf(content), vec!["192.168.1.1", "1.1.1.1"]);
    }

    #[test]
    fn test_parse_resolv_conf_empty() {
        assert!(parse_resolv_conf("").is_empty());
        assert!(parse_resolv_conf("search example.com\n").is_empty());
    }

    #[test]
    fn test_parse_ipconfig_english() {
        let output = "\
Ethernet adapter Ethernet:

   Connection-specific DNS Suffix  . : lan
   IPv4 Address. . . . . . . . . . . : 192.168.1.20(Preferred)
   Default Gateway . . . . . . . . . : 192.168.1.1
   DNS Servers . . . . . . . . . . . : 192.168.1.1
                                       8.8.8.8
   NetBIOS over Tcpip. . . . . . . . : Enabled
";
        assert_eq!(parse_ipconfig(output), vec!["192.168.1.1", "8.8.8.8"]);
    }

    #[test]
    fn test_parse_ipconfig_german_and_ipv6() {
        let output = "\
   DNS-Server  . . . . . . . . . . . : fec0:0:0:ffff::1%1
                                       10.0.0.1
   NetBIOS über TCP/IP . . . . . . . : Aktiviert
";
        assert_eq!(parse_ipconfig(output), vec!["fec0:0:0:ffff::1%1", "10.0.0.1"]);
    }

    #[test]
    fn test_parse_ipconfig_without_dns() {
        let output = "Windows IP Configuration\n\n   Host Name . . . . . : desk\n";
        assert!(parse_ipconfig(output).is_empty());
    }

    #[test]
    fn test_platform_name() {
        let name = get_platform_name();
        assert!(["Windows", "macOS", "Linux", "Unknown"].contains(&name.as_str()));
    }
}
