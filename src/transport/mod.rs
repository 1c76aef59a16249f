//! Transport layer for instrument communication.
//!
//! Provides the line-oriented `ScpiTransport` trait, a blocking TCP
//! implementation and a scripted mock, enabling dependency injection and
//! testing without hardware.

pub mod error;
pub mod mock;
pub mod tcp;
pub mod traits;

pub use error::TransportError;
pub use mock::{MockConnector, MockReply, MockTransport};
pub use tcp::{TcpConnector, TcpTransport, MAX_LINE_LEN};
pub use traits::*;
