//! Network discovery of DP800/DP700 instruments.
//!
//! Builds a list of candidate IPv4 addresses and probes each one in turn.
//! The sweep is sequential, so worst-case latency is the candidate count
//! times the probe timeout.

pub mod candidates;
pub mod scanner;

pub use candidates::{
    local_subnet_prefix, normalize_prefix, Candidates, DEFAULT_HOSTS, FALLBACK_NETWORK,
};
pub use scanner::{ConnectorProber, Discovery, IdentityMatcher, Prober};

use crate::error::DeviceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Network prefix is not three dotted octets.
    #[error("Invalid network prefix '{0}': expected three octets such as 192.168.1")]
    InvalidNetwork(String),

    #[error("Invalid host range {start}..={end}")]
    InvalidHostRange { start: u8, end: u8 },

    /// A host answered, but not in a way discovery can skip.
    #[error("Probe of {ip} failed: {source}")]
    Probe {
        ip: String,
        #[source]
        source: DeviceError,
    },
}
