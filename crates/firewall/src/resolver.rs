//! Hostname resolution for egress selectors.
//!
//! The [`HostnameResolver`] trait abstracts forward DNS lookups so the
//! policy compiler can be tested without network I/O. Resolution is lazy:
//! the compiler resolves each distinct hostname selector once per
//! compilation pass and never caches across passes, so DNS changes are
//! picked up on the next container start.
//!
//! A name that resolves to nothing yields an empty set rather than an
//! error — one dead egress hostname must not block the rest of the policy.

use std::future::Future;
use std::net::IpAddr;

use tracing::debug;

/// Trait abstracting forward hostname lookups.
pub trait HostnameResolver: Send + Sync + 'static {
    /// Resolves a hostname to its current set of addresses.
    ///
    /// Returns an empty vector when the name does not resolve (NXDOMAIN,
    /// resolver failure, or genuinely empty answer); the caller logs the
    /// empty result as a warning. Addresses are deduplicated,
    /// order-preserving.
    fn resolve(&self, host: &str) -> impl Future<Output = Vec<IpAddr>> + Send;
}

/// System resolver backed by the OS (getaddrinfo via tokio).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl SystemResolver {
    /// Creates a system resolver.
    pub fn new() -> Self {
        Self
    }
}

impl HostnameResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Vec<IpAddr> {
        // lookup_host needs a port; it is discarded from the answer.
        match tokio::net::lookup_host((host, 0u16)).await {
            Ok(addrs) => {
                let mut seen = Vec::new();
                for addr in addrs {
                    let ip = addr.ip();
                    if !seen.contains(&ip) {
                        seen.push(ip);
                    }
                }
                seen
            }
            Err(e) => {
                debug!(host, error = %e, "hostname lookup failed, treating as empty");
                Vec::new()
            }
        }
    }
}

/// Test resolver with a fixed hostname table.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockResolver {
    entries: std::collections::HashMap<String, Vec<IpAddr>>,
}

#[cfg(test)]
impl MockResolver {
    /// Creates an empty mock resolver (every lookup yields no addresses).
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers addresses for a hostname.
    pub fn with_host(mut self, host: &str, addrs: &[&str]) -> Self {
        self.entries.insert(
            host.to_owned(),
            addrs.iter().map(|a| a.parse().unwrap()).collect(),
        );
        self
    }
}

#[cfg(test)]
impl HostnameResolver for MockResolver {
    async fn resolve(&self, host: &str) -> Vec<IpAddr> {
        self.entries.get(host).cloned().unwrap_or_default()
    }
}
