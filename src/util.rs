use std::net::{IpAddr, Ipv4Addr};
use anyhow::{Context, Result};

/// Resolves `host` to the first IPv4 address it maps to.
pub async fn resolve_host_to_ipv4(host: &str) -> Result<Ipv4Addr> {
    // First try to parse as IP address
    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => Ok(v4),
            IpAddr::V6(_) => Err(anyhow::anyhow!("IPv6 is not supported: {}", host)),
        };
    }

    // If parsing fails, resolve via DNS
    let addr = format!("{}:0", host);
    let addrs = tokio::net::lookup_host(&addr)
        .await
        .with_context(|| format!("Could not resolve hostname: {}", host))?;
    addrs
        .filter_map(|sa| match sa.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| anyhow::anyhow!("No IPv4 address found for hostname: {}", host))
}

/// Raw sockets need root; CAP_NET_RAW holders are caught later by the
/// socket probe in `main`.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}
