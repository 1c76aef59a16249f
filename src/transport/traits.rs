//! Core traits for the instrument transport.
//!
//! Defines the `ScpiTransport` trait so the real TCP socket and the mock
//! transport can be used interchangeably by the device facade, and the
//! `Connector` trait that opens transports for a target.

use super::error::TransportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default SCPI socket port on Rigol instruments.
pub const DEFAULT_PORT: u16 = 5555;

/// Default reply timeout for normal operation.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Line terminator used in both directions.
pub const LINE_TERMINATOR: char = '\n';

/// Where an instrument lives on the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    /// Host name or IP address.
    pub host: String,

    /// TCP port of the SCPI socket server.
    pub port: u16,

    /// Connect and reply timeout.
    pub timeout: Duration,
}

impl ConnectionTarget {
    /// Create a target with the default port and timeout.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Override the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// VISA-style socket resource descriptor, e.g. `TCPIP0::192.168.1.100::5555::SOCKET`.
    pub fn resource_string(&self) -> String {
        format!("TCPIP0::{}::{}::SOCKET", self.host, self.port)
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_string())
    }
}

/// Parses either a socket resource descriptor (`TCPIP<n>::host::port::SOCKET`)
/// or a bare host name, which gets the default port.
impl FromStr for ConnectionTarget {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.contains("::") {
            if s.is_empty() {
                return Err(TransportError::InvalidResource(s.to_string()));
            }
            return Ok(Self::new(s));
        }

        let parts: Vec<&str> = s.split("::").collect();
        let [interface, host, port, kind] = parts.as_slice() else {
            return Err(TransportError::InvalidResource(s.to_string()));
        };

        let board = interface
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("TCPIP"))
            .map(|_| &interface[5..]);
        let valid_board = matches!(board, Some(n) if n.chars().all(|c| c.is_ascii_digit()));
        if !valid_board || !kind.eq_ignore_ascii_case("SOCKET") || host.is_empty() {
            return Err(TransportError::InvalidResource(s.to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| TransportError::InvalidResource(s.to_string()))?;

        Ok(Self::new(*host).with_port(port))
    }
}

/// Line-oriented request/reply transport to an SCPI instrument.
///
/// One logical owner issues one command at a time; implementations are not
/// expected to support concurrent callers.
pub trait ScpiTransport: Send + fmt::Debug {
    /// Send one command, appending the line terminator.
    fn write_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Block until one terminated reply line arrives or the timeout elapses.
    ///
    /// The returned text has the terminator (and any trailing `\r`) stripped.
    fn read_line(&mut self) -> Result<String, TransportError>;

    /// Release the connection. Calling this more than once is a no-op.
    fn close(&mut self) -> Result<(), TransportError>;

    /// The target this transport talks to.
    fn target(&self) -> &ConnectionTarget;

    /// Send a query and read its single reply line.
    fn query(&mut self, line: &str) -> Result<String, TransportError> {
        self.write_line(line)?;
        self.read_line()
    }
}

impl<T: ScpiTransport + ?Sized> ScpiTransport for Box<T> {
    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        (**self).write_line(line)
    }

    fn read_line(&mut self) -> Result<String, TransportError> {
        (**self).read_line()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn target(&self) -> &ConnectionTarget {
        (**self).target()
    }
}

/// Type alias for a boxed transport, as handed out by a `Connector`.
pub type BoxedTransport = Box<dyn ScpiTransport>;

/// Opens transports for a target.
///
/// The agent session and discovery go through this seam so tests can swap
/// the network for scripted transports.
pub trait Connector: Send + Sync {
    /// Open a connection to `target`.
    fn open(&self, target: &ConnectionTarget) -> Result<BoxedTransport, TransportError>;
}
