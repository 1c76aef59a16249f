//! Transport-level error types.
//!
//! Kept separate from device and application errors so the socket layer
//! knows nothing about SCPI semantics.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to an instrument over a socket.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket could not be established within the timeout.
    #[error("Could not connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// No complete reply arrived before the timeout elapsed.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The connection was closed locally or by the peer.
    #[error("Connection is closed")]
    Closed,

    /// An I/O error occurred on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A reply line grew past the accepted length without a terminator.
    #[error("Reply exceeded {0} bytes without a line terminator")]
    LineTooLong(usize),

    /// A resource descriptor could not be parsed.
    #[error("Invalid resource descriptor: {0}")]
    InvalidResource(String),
}

impl TransportError {
    /// Create a Connect error for a target descriptor.
    pub fn connect(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connect {
            target: target.into(),
            source,
        }
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout(duration)
    }

    /// Whether this error means the reply window elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
