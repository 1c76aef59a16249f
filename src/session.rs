//! Agent session: the connection context shared by tool calls.
//!
//! A `Session` owns at most one active instrument connection. It is created
//! at start-up from the configuration, connects on explicit `connect` or on
//! the first channel operation, and drops the connection on `disconnect`,
//! on any transport failure, or when the session itself is dropped.
//!
//! Target resolution order: explicit argument, configured default host,
//! first instrument found by discovery.

use crate::config::Config;
use crate::device::{DeviceIdentity, DiscoveredDevice, Dp800, Model};
use crate::discovery::{Candidates, ConnectorProber, Discovery, IdentityMatcher};
use crate::error::{DeviceError, DeviceResult};
use crate::service::{ServiceError, ServiceResult};
use crate::transport::{BoxedTransport, ConnectionTarget, Connector, TcpConnector};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Session shared between concurrent tool handlers.
pub type SharedSession = Arc<Mutex<Session>>;

/// What a successful `connect` reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub ip: String,
    pub port: u16,
    pub connection_string: String,
    pub model: Model,
    pub device_info: Option<DeviceIdentity>,
}

impl ConnectionInfo {
    fn from_device(device: &Dp800<BoxedTransport>) -> Self {
        let target = device.target();
        Self {
            ip: target.host.clone(),
            port: target.port,
            connection_string: target.resource_string(),
            model: device.model(),
            device_info: device.identity().cloned(),
        }
    }
}

/// Snapshot of the session for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    /// Details of the active connection, if any.
    pub connection: Option<ConnectionInfo>,
    pub connected_since: Option<DateTime<Utc>>,
    /// Host used when a tool call names none.
    pub default_host: Option<String>,
    pub default_port: u16,
}

struct ActiveConnection {
    device: Dp800<BoxedTransport>,
    connected_at: DateTime<Utc>,
}

/// Connection context for the agent adapter.
pub struct Session {
    config: Config,
    connector: Arc<dyn Connector>,
    active: Option<ActiveConnection>,
}

impl Session {
    /// Session that opens real TCP connections.
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, Arc::new(TcpConnector))
    }

    /// Session that opens connections through `connector`.
    pub fn with_connector(config: Config, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            active: None,
        }
    }

    /// Wrap into the shared form used by the service layer.
    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }

    // ========== Target resolution ==========

    /// Candidate addresses for a sweep: explicit prefix, configured network,
    /// else the local subnet.
    pub fn candidates(&self, network: Option<&str>) -> Candidates {
        let hosts = self.config.discovery.host_start..=self.config.discovery.host_end;
        match network.or(self.config.discovery.network.as_deref()) {
            Some(prefix) => Candidates::subnet(prefix, hosts),
            None => Candidates::LocalSubnet { hosts },
        }
    }

    /// Vendor and model filter from the `[discovery]` section.
    pub fn matcher(&self) -> IdentityMatcher {
        let cfg = &self.config.discovery;
        IdentityMatcher::new(&cfg.vendor, cfg.models.clone())
    }

    /// Discovery sweeper sharing this session's connector.
    pub fn discovery(&self, port: Option<u16>) -> Discovery<ConnectorProber> {
        let cfg = &self.config.discovery;
        Discovery::new(ConnectorProber::new(Arc::clone(&self.connector)))
            .with_matcher(self.matcher())
            .with_port(port.unwrap_or(self.config.device.port))
            .with_timeout(cfg.probe_timeout())
    }

    /// Sweep the network for instruments.
    pub fn discover(
        &self,
        network: Option<&str>,
        port: Option<u16>,
    ) -> ServiceResult<Vec<DiscoveredDevice>> {
        let candidates = self.candidates(network);
        Ok(self.discovery(port).discover(&candidates)?)
    }

    /// Turn optional host and port arguments into a connection target.
    ///
    /// `host` may be a bare address or a `TCPIP0::<host>::<port>::SOCKET`
    /// descriptor; an explicit `port` wins over either.
    pub fn resolve_target(
        &self,
        host: Option<&str>,
        port: Option<u16>,
    ) -> ServiceResult<ConnectionTarget> {
        let device = &self.config.device;

        if let Some(host) = host.map(str::trim).filter(|h| !h.is_empty()) {
            let parsed: ConnectionTarget = host.parse().map_err(DeviceError::from)?;
            let port = port.unwrap_or(if host.contains("::") { parsed.port } else { device.port });
            return Ok(device.target_for(parsed.host, Some(port)));
        }

        if let Some(target) = device.host.as_deref().map(|h| device.target_for(h, port)) {
            return Ok(target);
        }

        info!("No instrument address configured, trying discovery");
        let candidates = self.candidates(None);
        match self.discovery(port).discover_first(&candidates)? {
            Some(found) => Ok(device.target_for(found.ip, Some(found.port))),
            None => Err(ServiceError::NoTarget),
        }
    }

    // ========== Connection lifecycle ==========

    /// Close any active connection, then open and identify a new one.
    pub fn connect(
        &mut self,
        host: Option<&str>,
        port: Option<u16>,
    ) -> ServiceResult<ConnectionInfo> {
        self.disconnect();
        let target = self.resolve_target(host, port)?;
        let device = Dp800::open_with(self.connector.as_ref(), &target)?;
        let info = ConnectionInfo::from_device(&device);
        self.active = Some(ActiveConnection {
            device,
            connected_at: Utc::now(),
        });
        Ok(info)
    }

    /// Close the active connection. Returns whether there was one.
    pub fn disconnect(&mut self) -> bool {
        match self.active.take() {
            Some(mut active) => {
                if let Err(e) = active.device.close() {
                    debug!("Error while closing {}: {}", active.device.target(), e);
                }
                info!("Disconnected from {}", active.device.target());
                true
            }
            None => false,
        }
    }

    /// Open a separate connection, identify the instrument and close it
    /// again. The active connection is left alone.
    ///
    /// Fails with [`ServiceError::UnsupportedInstrument`] when the identity
    /// does not pass the session's vendor and model filter.
    pub fn test_connection(
        &self,
        host: Option<&str>,
        port: Option<u16>,
    ) -> ServiceResult<ConnectionInfo> {
        let target = self.resolve_target(host, port)?;
        let mut device = Dp800::open_with(self.connector.as_ref(), &target)?;
        let info = ConnectionInfo::from_device(&device);
        if let Err(e) = device.close() {
            debug!("Error while closing {}: {}", target, e);
        }

        let matcher = self.matcher();
        if info.device_info.as_ref().is_some_and(|id| matcher.matches(id)) {
            return Ok(info);
        }

        let (manufacturer, model) = info
            .device_info
            .map(|id| (id.manufacturer, id.model))
            .unwrap_or_default();
        warn!("{} is not a supported power supply: {} {}", target, manufacturer, model);
        Err(ServiceError::UnsupportedInstrument {
            resource: info.connection_string,
            manufacturer,
            model,
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.active.is_some(),
            connection: self
                .active
                .as_ref()
                .map(|a| ConnectionInfo::from_device(&a.device)),
            connected_since: self.active.as_ref().map(|a| a.connected_at),
            default_host: self.config.device.host.clone(),
            default_port: self.config.device.port,
        }
    }

    /// Run `op` against the active device, connecting first if needed.
    ///
    /// A transport failure discards the connection so the next call starts
    /// from a fresh socket.
    pub fn with_device<R>(
        &mut self,
        op: impl FnOnce(&mut Dp800<BoxedTransport>) -> DeviceResult<R>,
    ) -> ServiceResult<R> {
        if self.active.is_none() {
            self.connect(None, None)?;
        }
        let Some(active) = self.active.as_mut() else {
            return Err(ServiceError::NoTarget);
        };

        match op(&mut active.device) {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_transport() {
                    warn!(
                        "Dropping connection to {} after transport error: {}",
                        active.device.target(),
                        e
                    );
                    self.disconnect();
                }
                Err(e.into())
            }
        }
    }

    /// Channel-scoped [`with_device`](Self::with_device).
    ///
    /// The channel is checked before any connection is opened: against the
    /// active model when connected, otherwise against the channel numbers
    /// some supported model has.
    pub fn with_channel<R>(
        &mut self,
        channel: u8,
        op: impl FnOnce(&mut Dp800<BoxedTransport>) -> DeviceResult<R>,
    ) -> ServiceResult<R> {
        self.check_channel(channel)?;
        self.with_device(op)
    }

    fn check_channel(&self, channel: u8) -> ServiceResult<()> {
        match self.active.as_ref().map(|a| a.device.model()) {
            Some(model) if model.rating(channel).is_none() => Err(DeviceError::InvalidChannel {
                channel,
                model,
                max: model.channel_count(),
            }
            .into()),
            Some(_) => Ok(()),
            None => {
                let max = Model::max_channel_count();
                if (1..=max).contains(&channel) {
                    Ok(())
                } else {
                    Err(ServiceError::invalid_argument(
                        "channel",
                        format!("{channel} is not a channel of any supported model (1-{max})"),
                    ))
                }
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("default_host", &self.config.device.host)
            .field("connected", &self.is_connected())
            .finish()
    }
}
