//! Sequential network sweep.
//!
//! Each candidate is probed in turn with `*IDN?` and a short timeout. Hosts
//! that refuse the connection or stay silent are skipped; anything else that
//! goes wrong aborts the sweep.

use super::{Candidates, DiscoveryError};
use crate::config::DiscoveryConfig;
use crate::device::{DeviceIdentity, DiscoveredDevice, Dp800, Model};
use crate::error::{DeviceError, ErrorKind};
use crate::transport::{ConnectionTarget, Connector, TcpConnector, DEFAULT_PORT};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Asks one address who it is.
#[cfg_attr(test, mockall::automock)]
pub trait Prober: Send + Sync {
    fn probe(&self, target: &ConnectionTarget) -> Result<DeviceIdentity, DeviceError>;
}

/// `Prober` that opens a connection through a `Connector`, sends `*IDN?`
/// and closes again.
#[derive(Clone)]
pub struct ConnectorProber {
    connector: Arc<dyn Connector>,
}

impl ConnectorProber {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }
}

impl Default for ConnectorProber {
    fn default() -> Self {
        Self::new(Arc::new(TcpConnector))
    }
}

impl Prober for ConnectorProber {
    fn probe(&self, target: &ConnectionTarget) -> Result<DeviceIdentity, DeviceError> {
        let transport = self.connector.open(target)?;
        let mut device = Dp800::new(transport, Model::Dp832);
        let result = device.identify();
        let _ = device.close();
        result
    }
}

/// Decides whether an identity belongs to a supported instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMatcher {
    vendor: String,
    models: Vec<String>,
}

impl IdentityMatcher {
    /// Match the manufacturer against `vendor` (case-insensitive substring)
    /// and, when `models` is non-empty, the model against one of `models`.
    pub fn new(vendor: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            vendor: vendor.into().to_ascii_uppercase(),
            models: models.into_iter().map(|m| m.to_ascii_uppercase()).collect(),
        }
    }

    pub fn matches(&self, identity: &DeviceIdentity) -> bool {
        if !identity.manufacturer.to_ascii_uppercase().contains(&self.vendor) {
            return false;
        }
        let model = identity.model.to_ascii_uppercase();
        self.models.is_empty() || self.models.iter().any(|m| model.starts_with(m.as_str()))
    }
}

impl Default for IdentityMatcher {
    fn default() -> Self {
        Self::new("RIGOL", crate::config::supported_models())
    }
}

/// Sweeps candidate addresses for instruments.
pub struct Discovery<P: Prober> {
    prober: P,
    matcher: IdentityMatcher,
    port: u16,
    timeout: Duration,
}

impl Discovery<ConnectorProber> {
    /// Real TCP sweep configured from the `[discovery]` section.
    pub fn from_config(config: &DiscoveryConfig, port: u16) -> Self {
        Self::new(ConnectorProber::default())
            .with_matcher(IdentityMatcher::new(&config.vendor, config.models.clone()))
            .with_port(port)
            .with_timeout(config.probe_timeout())
    }
}

impl<P: Prober> Discovery<P> {
    pub fn new(prober: P) -> Self {
        Self {
            prober,
            matcher: IdentityMatcher::default(),
            port: DEFAULT_PORT,
            timeout: Duration::from_millis(crate::config::DEFAULT_PROBE_TIMEOUT_MS),
        }
    }

    pub fn with_matcher(mut self, matcher: IdentityMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn target(&self, ip: &str) -> ConnectionTarget {
        ConnectionTarget::new(ip)
            .with_port(self.port)
            .with_timeout(self.timeout)
    }

    /// Probe one address. `Ok(None)` when nothing matching answers there.
    ///
    /// Only connection and timeout failures count as "nothing there". Any
    /// other error, such as an `*IDN?` reply that does not have four fields,
    /// is returned as [`DiscoveryError::Probe`] and aborts [`scan`](Self::scan),
    /// [`discover`](Self::discover) and [`discover_first`](Self::discover_first),
    /// including the auto-connect fallback built on them.
    pub fn probe(&self, ip: &str) -> Result<Option<DiscoveredDevice>, DiscoveryError> {
        let target = self.target(ip);
        match self.prober.probe(&target) {
            Ok(identity) if self.matcher.matches(&identity) => {
                info!("Found {} {} at {}", identity.manufacturer, identity.model, ip);
                Ok(Some(DiscoveredDevice {
                    ip: ip.to_string(),
                    port: self.port,
                    resource: target.resource_string(),
                    identity,
                }))
            }
            Ok(identity) => {
                debug!(
                    "{} answered as {} {}, not a match",
                    ip, identity.manufacturer, identity.model
                );
                Ok(None)
            }
            Err(e) if matches!(e.kind(), ErrorKind::Connection | ErrorKind::Timeout) => {
                debug!("No instrument at {}: {}", ip, e);
                Ok(None)
            }
            Err(e) => Err(DiscoveryError::Probe {
                ip: ip.to_string(),
                source: e,
            }),
        }
    }

    /// Probe every address in order and return the matches in probe order.
    pub fn scan<S: AsRef<str>>(
        &self,
        addresses: &[S],
    ) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        info!("Scanning {} address(es) on port {}", addresses.len(), self.port);
        let mut found = Vec::new();
        for ip in addresses {
            if let Some(device) = self.probe(ip.as_ref())? {
                found.push(device);
            }
        }
        info!("Discovery finished: {} instrument(s) found", found.len());
        Ok(found)
    }

    /// Expand `candidates` and scan them.
    pub fn discover(
        &self,
        candidates: &Candidates,
    ) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        self.scan(&candidates.addresses()?)
    }

    /// Stop at the first matching instrument.
    pub fn discover_first(
        &self,
        candidates: &Candidates,
    ) -> Result<Option<DiscoveredDevice>, DiscoveryError> {
        for ip in candidates.addresses()? {
            if let Some(device) = self.probe(&ip)? {
                return Ok(Some(device));
            }
        }
        Ok(None)
    }
}
