//! Rigol DP800/DP700 Agent Library
//!
//! This library drives Rigol bench power supplies over their Ethernet SCPI
//! socket and exposes the same operations as MCP tools for LLM agents.
//!
//! # Modules
//!
//! - `transport`: Line-oriented TCP transport with timeouts, plus a mock
//! - `codec`: SCPI command templates and reply parsers
//! - `device`: Typed, validated device facade (`Dp800`)
//! - `discovery`: Sequential network sweep for instruments
//! - `config`: Configuration management with TOML support
//! - `error`: Device error type
//! - `session`: Connection context shared by tool calls
//! - `service`: Typed operations over the shared session
//! - `mcp`: MCP server implementation (when `mcp` feature is enabled)

pub mod codec;
pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod service;
pub mod session;
pub mod transport;

#[cfg(feature = "mcp")]
pub mod mcp;

// Re-export commonly used types for convenience
pub use codec::{Command, ParseError, ProtectionKind};
pub use device::{
    ChannelSettings, DeviceIdentity, DiscoveredDevice, Dp800, Measurement, Model, OutputMode,
    ProtectionConfig,
};
pub use discovery::{Candidates, Discovery, DiscoveryError};
pub use error::{DeviceError, DeviceResult, ErrorKind};
pub use service::{PsuService, ServiceError, ServiceResult};
pub use session::{ConnectionInfo, ConnectionStatus, Session, SharedSession};
pub use transport::{
    ConnectionTarget, Connector, MockTransport, ScpiTransport, TcpConnector, TcpTransport,
    TransportError,
};
