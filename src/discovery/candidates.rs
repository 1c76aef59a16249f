//! Candidate address lists for a discovery sweep.

use super::DiscoveryError;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::ops::RangeInclusive;
use tracing::{debug, warn};

/// Prefix used when the local subnet cannot be determined.
pub const FALLBACK_NETWORK: &str = "192.168.1";

/// Default host numbers swept in a /24.
pub const DEFAULT_HOSTS: RangeInclusive<u8> = 1..=254;

/// Where to look for instruments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    /// One specific address.
    Single(String),
    /// A /24 given by its first three octets, e.g. `192.168.68`.
    Subnet {
        prefix: String,
        hosts: RangeInclusive<u8>,
    },
    /// The /24 of the interface carrying the default route.
    LocalSubnet { hosts: RangeInclusive<u8> },
}

impl Candidates {
    /// Sweep `prefix.start` through `prefix.end`.
    pub fn subnet(prefix: impl Into<String>, hosts: RangeInclusive<u8>) -> Self {
        Self::Subnet {
            prefix: prefix.into(),
            hosts,
        }
    }

    /// Expand into concrete addresses, in probe order.
    pub fn addresses(&self) -> Result<Vec<String>, DiscoveryError> {
        match self {
            Self::Single(host) => Ok(vec![host.trim().to_string()]),
            Self::Subnet { prefix, hosts } => expand(prefix, hosts),
            Self::LocalSubnet { hosts } => {
                let prefix = local_subnet_prefix().unwrap_or_else(|| {
                    warn!(
                        "Could not determine local subnet, falling back to {}",
                        FALLBACK_NETWORK
                    );
                    FALLBACK_NETWORK.to_string()
                });
                expand(&prefix, hosts)
            }
        }
    }
}

fn expand(prefix: &str, hosts: &RangeInclusive<u8>) -> Result<Vec<String>, DiscoveryError> {
    let prefix = normalize_prefix(prefix)?;
    if hosts.is_empty() || *hosts.start() == 0 {
        return Err(DiscoveryError::InvalidHostRange {
            start: *hosts.start(),
            end: *hosts.end(),
        });
    }
    Ok(hosts.clone().map(|h| format!("{prefix}.{h}")).collect())
}

/// Validate a three-octet prefix, tolerating a trailing dot.
pub fn normalize_prefix(prefix: &str) -> Result<String, DiscoveryError> {
    let trimmed = prefix.trim().trim_end_matches('.');
    let octets: Vec<&str> = trimmed.split('.').collect();
    let valid = octets.len() == 3
        && octets
            .iter()
            .all(|o| !o.is_empty() && o.len() <= 3 && o.parse::<u8>().is_ok());
    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(DiscoveryError::InvalidNetwork(prefix.to_string()))
    }
}

/// First three octets of the local address used for outbound traffic.
///
/// Connecting a UDP socket sends no packets; it only asks the OS to pick the
/// outgoing interface.
pub fn local_subnet_prefix() -> Option<String> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect(("8.8.8.8", 80)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() && !ip.is_loopback() => {
            let [a, b, c, _] = ip.octets();
            let prefix = format!("{a}.{b}.{c}");
            debug!("Local subnet is {}.0/24", prefix);
            Some(prefix)
        }
        _ => None,
    }
}
