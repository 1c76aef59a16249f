//! Service layer for power supply operations.
//!
//! Decouples instrument logic from the MCP handler. Every tool call flows
//! through `PsuService`, which serialises access to the shared session and
//! provides consistent error handling.
//!
//! # Architecture
//!
//! ```text
//! MCP tools ──┐
//! CLI       ──┼──> PsuService ──> SharedSession (Arc<Mutex<Session>>) ──> Dp800
//! ```
//!
//! All methods block on network I/O. Async callers go through
//! [`PsuService::blocking`], which moves the work onto the blocking pool.

use crate::codec::ProtectionKind;
use crate::device::{
    ChannelSettings, DeviceIdentity, DiscoveredDevice, Measurement, OutputMode, ProtectionConfig,
};
use crate::discovery::DiscoveryError;
use crate::error::DeviceError;
use crate::session::{ConnectionInfo, ConnectionStatus, Session, SharedSession};
use std::collections::BTreeMap;
use thiserror::Error;

// ========== Error Types ==========

/// Service-specific errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// No address given, none configured, and discovery found nothing.
    #[error(
        "No instrument address available: pass ip_address, set RIGOL_DP832_IP, \
         or make sure an instrument answers on the local network"
    )]
    NoTarget,

    /// Something answered at the address, but not a supported power supply.
    #[error(
        "{resource} answered as '{manufacturer} {model}', \
         not a supported DP800/DP700 power supply"
    )]
    UnsupportedInstrument {
        resource: String,
        manufacturer: String,
        model: String,
    },

    /// A request argument cannot be represented, e.g. a negative channel.
    #[error("Invalid argument '{name}': {message}")]
    InvalidArgument { name: &'static str, message: String },

    /// The blocking task running the operation panicked or was cancelled.
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl ServiceError {
    /// Stable error category reported to agents.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Device(e) => e.kind().as_str(),
            Self::Discovery(DiscoveryError::Probe { source, .. }) => source.kind().as_str(),
            Self::Discovery(_) | Self::InvalidArgument { .. } => "validation",
            Self::NoTarget | Self::UnsupportedInstrument { .. } => "no_target",
            Self::TaskFailed(_) => "internal",
        }
    }

    pub fn invalid_argument(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            message: message.into(),
        }
    }
}

/// Convenient Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

// ========== Service ==========

/// Typed operations over a shared session.
#[derive(Clone, Debug)]
pub struct PsuService {
    session: SharedSession,
}

impl PsuService {
    pub fn new(session: SharedSession) -> Self {
        Self { session }
    }

    pub fn from_session(session: Session) -> Self {
        Self::new(session.shared())
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Run `op` on the blocking thread pool.
    pub async fn blocking<R, F>(&self, op: F) -> ServiceResult<R>
    where
        F: FnOnce(&PsuService) -> ServiceResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let service = self.clone();
        tokio::task::spawn_blocking(move || op(&service))
            .await
            .map_err(|e| ServiceError::TaskFailed(e.to_string()))?
    }

    // ========== Connection ==========

    pub fn discover_devices(
        &self,
        network: Option<&str>,
        port: Option<u16>,
    ) -> ServiceResult<Vec<DiscoveredDevice>> {
        self.session.lock().discover(network, port)
    }

    pub fn test_connection(
        &self,
        ip: Option<&str>,
        port: Option<u16>,
    ) -> ServiceResult<ConnectionInfo> {
        self.session.lock().test_connection(ip, port)
    }

    pub fn connect(&self, ip: Option<&str>, port: Option<u16>) -> ServiceResult<ConnectionInfo> {
        self.session.lock().connect(ip, port)
    }

    /// Returns whether a connection was closed.
    pub fn disconnect(&self) -> bool {
        self.session.lock().disconnect()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.session.lock().status()
    }

    /// Live `*IDN?` of the connected instrument.
    pub fn device_info(&self) -> ServiceResult<DeviceIdentity> {
        self.session.lock().with_device(|d| d.identify())
    }

    // ========== Channel ==========

    pub fn set_channel_settings(
        &self,
        channel: u8,
        voltage: f64,
        current: f64,
    ) -> ServiceResult<()> {
        self.session
            .lock()
            .with_channel(channel, |d| d.set_channel_settings(channel, voltage, current))
    }

    pub fn get_channel_settings(&self, channel: u8) -> ServiceResult<ChannelSettings> {
        self.session
            .lock()
            .with_channel(channel, |d| d.get_channel_settings(channel))
    }

    pub fn set_output_state(&self, channel: u8, on: bool) -> ServiceResult<()> {
        self.session
            .lock()
            .with_channel(channel, |d| d.set_output_state(channel, on))
    }

    pub fn get_output_state(&self, channel: u8) -> ServiceResult<bool> {
        self.session
            .lock()
            .with_channel(channel, |d| d.get_output_state(channel))
    }

    pub fn get_output_mode(&self, channel: u8) -> ServiceResult<OutputMode> {
        self.session
            .lock()
            .with_channel(channel, |d| d.get_output_mode(channel))
    }

    pub fn measure_voltage(&self, channel: u8) -> ServiceResult<f64> {
        self.session
            .lock()
            .with_channel(channel, |d| d.measure_voltage(channel))
    }

    pub fn measure_current(&self, channel: u8) -> ServiceResult<f64> {
        self.session
            .lock()
            .with_channel(channel, |d| d.measure_current(channel))
    }

    pub fn measure_power(&self, channel: u8) -> ServiceResult<f64> {
        self.session
            .lock()
            .with_channel(channel, |d| d.measure_power(channel))
    }

    pub fn measure_all(&self, channel: u8) -> ServiceResult<Measurement> {
        self.session
            .lock()
            .with_channel(channel, |d| d.measure_all(channel))
    }

    // ========== Protection ==========

    pub fn set_protection_enabled(
        &self,
        kind: ProtectionKind,
        channel: u8,
        on: bool,
    ) -> ServiceResult<()> {
        self.session
            .lock()
            .with_channel(channel, |d| d.set_protection_enabled(kind, channel, on))
    }

    pub fn get_protection_enabled(&self, kind: ProtectionKind, channel: u8) -> ServiceResult<bool> {
        self.session
            .lock()
            .with_channel(channel, |d| d.get_protection_enabled(kind, channel))
    }

    pub fn set_protection_value(
        &self,
        kind: ProtectionKind,
        channel: u8,
        value: f64,
    ) -> ServiceResult<()> {
        self.session
            .lock()
            .with_channel(channel, |d| d.set_protection_value(kind, channel, value))
    }

    pub fn get_protection_value(&self, kind: ProtectionKind, channel: u8) -> ServiceResult<f64> {
        self.session
            .lock()
            .with_channel(channel, |d| d.get_protection_value(kind, channel))
    }

    pub fn get_protection_alarm(&self, kind: ProtectionKind, channel: u8) -> ServiceResult<bool> {
        self.session
            .lock()
            .with_channel(channel, |d| d.get_protection_alarm(kind, channel))
    }

    pub fn clear_protection_alarm(&self, kind: ProtectionKind, channel: u8) -> ServiceResult<()> {
        self.session
            .lock()
            .with_channel(channel, |d| d.clear_protection_alarm(kind, channel))
    }

    pub fn get_protection_status(
        &self,
        kind: ProtectionKind,
        channel: u8,
    ) -> ServiceResult<ProtectionConfig> {
        self.session
            .lock()
            .with_channel(channel, |d| d.get_protection(kind, channel))
    }

    // ========== Aggregates ==========

    pub fn get_all_output_states(&self) -> ServiceResult<BTreeMap<u8, bool>> {
        self.session.lock().with_device(|d| d.get_all_output_states())
    }

    pub fn get_all_settings(&self) -> ServiceResult<BTreeMap<u8, ChannelSettings>> {
        self.session.lock().with_device(|d| d.get_all_settings())
    }

    pub fn get_all_measurements(&self) -> ServiceResult<BTreeMap<u8, Measurement>> {
        self.session.lock().with_device(|d| d.get_all_measurements())
    }
}
