//! Device-level error type.
//!
//! Everything the facade can fail with: validation problems detected before
//! any I/O, transport failures and unparseable replies.

use crate::codec::ParseError;
use crate::device::Model;
use crate::transport::TransportError;
use serde::Serialize;
use thiserror::Error;

/// Result alias for facade operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Coarse classification reported to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Connection,
    Timeout,
    Parse,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::Parse => "parse",
        }
    }
}

#[derive(Debug, Error)]
pub enum DeviceError {
    /// Channel number outside the model's channel set.
    #[error("Invalid channel {channel}: {model} has channels 1-{max}")]
    InvalidChannel { channel: u8, model: Model, max: u8 },

    /// Setpoint or limit outside the accepted range.
    #[error("Invalid {what} {value} on channel {channel}: must be between 0 and {max}")]
    InvalidValue {
        what: &'static str,
        channel: u8,
        value: f64,
        max: f64,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl DeviceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidChannel { .. }
            | Self::InvalidValue { .. }
            | Self::Transport(TransportError::InvalidResource(_)) => ErrorKind::Validation,
            Self::Transport(TransportError::Timeout(_)) => ErrorKind::Timeout,
            Self::Transport(_) => ErrorKind::Connection,
            Self::Parse(_) => ErrorKind::Parse,
        }
    }

    /// Whether the connection that produced this error should be discarded.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
