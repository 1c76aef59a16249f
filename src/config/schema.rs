//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use crate::device::Model;
use crate::transport::{ConnectionTarget, DEFAULT_PORT, DEFAULT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default discovery probe timeout.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default instrument connection
    pub device: DeviceConfig,
    /// Network discovery settings
    pub discovery: DiscoveryConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// MCP server identity
    pub server: ServerConfig,
}

/// Default instrument connection section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Host name or IP address of the instrument, if known up front
    pub host: Option<String>,
    /// SCPI socket port
    pub port: u16,
    /// Connect and reply timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl DeviceConfig {
    /// Get the timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Build a connection target for `host` using this section's port and timeout.
    pub fn target_for(&self, host: impl Into<String>, port: Option<u16>) -> ConnectionTarget {
        ConnectionTarget::new(host)
            .with_port(port.unwrap_or(self.port))
            .with_timeout(self.timeout())
    }

    /// Target for the configured default host, if one is set.
    pub fn default_target(&self) -> Option<ConnectionTarget> {
        self.host.as_deref().map(|h| self.target_for(h, None))
    }
}

/// Network discovery section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// First three octets to sweep, e.g. "192.168.68"; local subnet when unset
    pub network: Option<String>,
    /// Per-address probe timeout in milliseconds
    pub probe_timeout_ms: u64,
    /// First host number probed
    pub host_start: u8,
    /// Last host number probed
    pub host_end: u8,
    /// Substring the identity manufacturer must contain
    pub vendor: String,
    /// Accepted model prefixes; any model when empty
    pub models: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            network: None,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            host_start: 1,
            host_end: 254,
            vendor: "RIGOL".to_string(),
            models: supported_models(),
        }
    }
}

/// Names of every model the driver has a channel table for.
pub fn supported_models() -> Vec<String> {
    Model::ALL.iter().map(|m| m.name().to_string()).collect()
}

impl DiscoveryConfig {
    /// Get the probe timeout as Duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

/// MCP server section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name reported during initialization
    pub name: String,
    /// Usage hints sent to the client
    pub instructions: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "rigol-dp-agent".to_string(),
            instructions: "Control a Rigol DP800/DP700 power supply over the network. \
                Call discover_devices or connect first, then use the channel tools. \
                Channels are numbered from 1."
                .to_string(),
        }
    }
}
