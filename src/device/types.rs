//! Value types returned by the device facade.

use serde::{Deserialize, Serialize};

/// Voltage and current setpoints of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Voltage setpoint in volts.
    pub voltage: f64,
    /// Current limit in amperes.
    pub current: f64,
}

/// Live readback of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
}

/// State of one protection circuit (OCP or OVP) on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtectionConfig {
    pub enabled: bool,
    /// Trip level, amperes for OCP and volts for OVP.
    pub limit: f64,
    /// Whether the protection has tripped.
    pub alarm: bool,
}

/// The four fields of an `*IDN?` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

/// Regulation mode a channel output is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    #[serde(rename = "CV")]
    ConstantVoltage,
    #[serde(rename = "CC")]
    ConstantCurrent,
    #[serde(rename = "UR")]
    Unregulated,
}

impl OutputMode {
    /// Short SCPI token, as the instrument reports it.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConstantVoltage => "CV",
            Self::ConstantCurrent => "CC",
            Self::Unregulated => "UR",
        }
    }
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An instrument found on the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub ip: String,
    pub port: u16,
    /// Socket resource descriptor, e.g. `TCPIP0::192.168.1.100::5555::SOCKET`.
    pub resource: String,
    pub identity: DeviceIdentity,
}
