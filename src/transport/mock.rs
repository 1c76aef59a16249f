//! Mock transport implementation for testing.
//!
//! Provides a `MockTransport` that simulates an instrument link without a
//! network. Replies are scripted in order; every command written is logged.

use super::error::TransportError;
use super::traits::{BoxedTransport, ConnectionTarget, Connector, ScpiTransport};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// One scripted outcome for a `read_line` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Return this text as the reply line.
    Line(String),
    /// Fail with a timeout.
    Timeout,
    /// Fail as if the peer hung up.
    Disconnect,
}

/// Inner state of the mock, shared between clones.
#[derive(Debug, Default)]
struct MockTransportState {
    /// Replies handed out by `read_line`, oldest first.
    replies: VecDeque<MockReply>,
    /// Every line passed to `write_line`.
    write_log: Vec<String>,
    /// Number of `read_line` calls made.
    reads: usize,
    /// Whether `close` has been called.
    closed: bool,
    /// Fail the next write with a disconnect.
    fail_next_write: bool,
}

/// Mock transport for testing.
///
/// Clones share state, so a test can keep one handle while the device
/// facade owns the other.
///
/// # Example
/// ```
/// use rigol_dp_agent::transport::{MockTransport, ScpiTransport};
///
/// let mock = MockTransport::new("MOCK0");
/// mock.enqueue_reply("RIGOL TECHNOLOGIES,DP832,DP8C000001,00.01.16");
///
/// let mut link = mock.clone();
/// let reply = link.query("*IDN?").unwrap();
/// assert!(reply.starts_with("RIGOL"));
/// assert_eq!(mock.write_log(), vec!["*IDN?".to_string()]);
/// ```
#[derive(Clone)]
pub struct MockTransport {
    target: ConnectionTarget,
    state: Arc<Mutex<MockTransportState>>,
}

impl MockTransport {
    /// Create a mock whose target host is `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_target(ConnectionTarget::new(host))
    }

    /// Create a mock for a specific target.
    pub fn with_target(target: ConnectionTarget) -> Self {
        Self {
            target,
            state: Arc::new(Mutex::new(MockTransportState::default())),
        }
    }

    /// Queue a reply line.
    pub fn enqueue_reply(&self, line: impl Into<String>) {
        self.enqueue(MockReply::Line(line.into()));
    }

    /// Queue several reply lines in order.
    pub fn enqueue_replies<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            self.enqueue_reply(line);
        }
    }

    /// Queue a timeout.
    pub fn enqueue_timeout(&self) {
        self.enqueue(MockReply::Timeout);
    }

    /// Queue a peer disconnect.
    pub fn enqueue_disconnect(&self) {
        self.enqueue(MockReply::Disconnect);
    }

    /// Queue an arbitrary outcome.
    pub fn enqueue(&self, reply: MockReply) {
        let mut state = self.state.lock();
        state.replies.push_back(reply);
    }

    /// Make the next `write_line` fail as if the connection dropped.
    pub fn fail_next_write(&self) {
        let mut state = self.state.lock();
        state.fail_next_write = true;
    }

    /// Copy of every command written so far.
    pub fn write_log(&self) -> Vec<String> {
        let state = self.state.lock();
        state.write_log.clone()
    }

    /// Number of `read_line` calls made so far.
    pub fn read_count(&self) -> usize {
        let state = self.state.lock();
        state.reads
    }

    /// Total transport calls (writes plus reads).
    pub fn call_count(&self) -> usize {
        let state = self.state.lock();
        state.write_log.len() + state.reads
    }

    /// Replies still queued.
    pub fn pending_replies(&self) -> usize {
        let state = self.state.lock();
        state.replies.len()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        let state = self.state.lock();
        state.closed
    }
}

impl ScpiTransport for MockTransport {
    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.fail_next_write {
            state.fail_next_write = false;
            return Err(TransportError::Closed);
        }
        state.write_log.push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, TransportError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.reads += 1;

        // An unanswered query behaves like a silent instrument.
        match state.replies.pop_front() {
            Some(MockReply::Line(line)) => Ok(line),
            Some(MockReply::Timeout) | None => Err(TransportError::timeout(self.target.timeout)),
            Some(MockReply::Disconnect) => Err(TransportError::Closed),
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.closed = true;
        Ok(())
    }

    fn target(&self) -> &ConnectionTarget {
        &self.target
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("target", &self.target.host)
            .field("pending_replies", &self.pending_replies())
            .finish()
    }
}

/// `Connector` handing out pre-registered mock transports by host.
///
/// Hosts without a registered mock are refused, the way an empty address
/// on the network would be.
#[derive(Clone, Default)]
pub struct MockConnector {
    hosts: Arc<Mutex<HashMap<String, MockTransport>>>,
    attempts: Arc<Mutex<Vec<ConnectionTarget>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mock to be returned when `host` is opened.
    pub fn register(&self, host: impl Into<String>, mock: MockTransport) {
        self.hosts.lock().insert(host.into(), mock);
    }

    /// Every target passed to `open`, in order.
    pub fn attempts(&self) -> Vec<ConnectionTarget> {
        self.attempts.lock().clone()
    }
}

impl Connector for MockConnector {
    fn open(&self, target: &ConnectionTarget) -> Result<BoxedTransport, TransportError> {
        self.attempts.lock().push(target.clone());
        match self.hosts.lock().get(&target.host) {
            Some(mock) => {
                // Opening again models a fresh socket to the same instrument.
                mock.state.lock().closed = false;
                Ok(Box::new(mock.clone()))
            }
            None => Err(TransportError::connect(
                target.resource_string(),
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            )),
        }
    }
}

impl std::fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hosts: Vec<String> = self.hosts.lock().keys().cloned().collect();
        f.debug_struct("MockConnector").field("hosts", &hosts).finish()
    }
}
