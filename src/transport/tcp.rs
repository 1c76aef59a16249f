//! Blocking TCP socket transport.
//!
//! Wraps `std::net::TcpStream` with the `ScpiTransport` trait. Every call
//! blocks the caller until completion, timeout or error. A reply must be
//! complete within the target timeout, however the bytes are spread out.

use super::error::TransportError;
use super::traits::{BoxedTransport, ConnectionTarget, Connector, ScpiTransport, LINE_TERMINATOR};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::debug;

/// Longest reply line accepted, terminator included.
pub const MAX_LINE_LEN: usize = 4096;

/// Socket connection to an instrument's SCPI port.
pub struct TcpTransport {
    /// Buffered reader over the stream; `None` once closed.
    stream: Option<BufReader<TcpStream>>,
    target: ConnectionTarget,
}

impl TcpTransport {
    /// Connect to `target`, giving up after `target.timeout`.
    ///
    /// # Example
    /// ```no_run
    /// use rigol_dp_agent::transport::{ConnectionTarget, ScpiTransport, TcpTransport};
    ///
    /// let mut link = TcpTransport::open(&ConnectionTarget::new("192.168.1.100"))?;
    /// let idn = link.query("*IDN?")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(target: &ConnectionTarget) -> Result<Self, TransportError> {
        let descriptor = target.resource_string();
        let addrs: Vec<SocketAddr> = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::connect(&descriptor, e))?
            .collect();

        let mut last_err = std::io::Error::new(ErrorKind::AddrNotAvailable, "no address resolved");
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, target.timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(target.timeout))
                        .and_then(|_| stream.set_write_timeout(Some(target.timeout)))
                        .and_then(|_| stream.set_nodelay(true))
                        .map_err(|e| TransportError::connect(&descriptor, e))?;

                    debug!("Connected to {} via {}", descriptor, addr);
                    return Ok(Self {
                        stream: Some(BufReader::new(stream)),
                        target: target.clone(),
                    });
                }
                Err(e) => last_err = e,
            }
        }

        Err(TransportError::connect(descriptor, last_err))
    }

    /// Whether the socket is still held.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn map_io(err: std::io::Error, timeout: Duration) -> TransportError {
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => TransportError::timeout(timeout),
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                TransportError::Closed
            }
            _ => TransportError::Io(err),
        }
    }
}

impl ScpiTransport for TcpTransport {
    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut data = String::with_capacity(line.len() + 1);
        data.push_str(line);
        data.push(LINE_TERMINATOR);

        let result = match self.stream.as_mut() {
            Some(reader) => reader.get_mut().write_all(data.as_bytes()),
            None => return Err(TransportError::Closed),
        };
        result.map_err(|e| Self::map_io(e, self.target.timeout))
    }

    fn read_line(&mut self) -> Result<String, TransportError> {
        let timeout = self.target.timeout;
        let deadline = Instant::now() + timeout;
        let Some(reader) = self.stream.as_mut() else {
            return Err(TransportError::Closed);
        };

        let mut raw = Vec::with_capacity(64);
        loop {
            // The socket timeout bounds a single read, so shrink it to what
            // is left of the reply window.
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::timeout(timeout));
            }
            reader
                .get_ref()
                .set_read_timeout(Some(remaining))
                .map_err(TransportError::Io)?;

            let (used, complete) = match reader.fill_buf() {
                Ok([]) => return Err(TransportError::Closed),
                Ok(available) => match memchr::memchr(LINE_TERMINATOR as u8, available) {
                    Some(end) => {
                        raw.extend_from_slice(&available[..=end]);
                        (end + 1, true)
                    }
                    None => {
                        raw.extend_from_slice(available);
                        (available.len(), false)
                    }
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Self::map_io(e, timeout)),
            };
            reader.consume(used);

            if raw.len() > MAX_LINE_LEN {
                return Err(TransportError::LineTooLong(MAX_LINE_LEN));
            }
            if complete {
                let text = String::from_utf8_lossy(&raw);
                return Ok(text.trim_end_matches(['\n', '\r']).to_string());
            }
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if let Some(reader) = self.stream.take() {
            match reader.get_ref().shutdown(Shutdown::Both) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotConnected => {}
                Err(e) => return Err(TransportError::Io(e)),
            }
            debug!("Closed connection to {}", self.target);
        }
        Ok(())
    }

    fn target(&self) -> &ConnectionTarget {
        &self.target
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("target", &self.target.resource_string())
            .field("open", &self.is_open())
            .finish()
    }
}

/// `Connector` that opens real TCP sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn open(&self, target: &ConnectionTarget) -> Result<BoxedTransport, TransportError> {
        Ok(Box::new(TcpTransport::open(target)?))
    }
}
