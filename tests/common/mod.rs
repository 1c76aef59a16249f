//! Shared test utilities for the Rigol DP800 agent tests.
//!
//! This module provides common test infrastructure including:
//! - An in-process fake instrument speaking SCPI over a real TCP socket
//! - Service builders pointed at the fake
//! - JSON assertion helpers

#![allow(dead_code)]

use rigol_dp_agent::config::Config;
use rigol_dp_agent::{PsuService, Session};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

pub const DP832_IDN: &str = "RIGOL TECHNOLOGIES,DP832,DP8C123456,00.01.16";
pub const DP821_IDN: &str = "RIGOL TECHNOLOGIES,DP821A,DP8E000001,00.01.02";

/// Simulated state of one output channel.
#[derive(Debug, Clone)]
pub struct FakeChannel {
    pub rating: (f64, f64),
    pub voltage: f64,
    pub current: f64,
    pub output: bool,
    /// Current drawn by the simulated load when the output is on.
    pub load_current: f64,
    pub ocp_enabled: bool,
    pub ocp_limit: f64,
    pub ocp_alarm: bool,
    pub ovp_enabled: bool,
    pub ovp_limit: f64,
    pub ovp_alarm: bool,
}

impl FakeChannel {
    fn new(max_voltage: f64, max_current: f64) -> Self {
        Self {
            rating: (max_voltage, max_current),
            voltage: 0.0,
            current: max_current,
            output: false,
            load_current: 0.0,
            ocp_enabled: false,
            ocp_limit: max_current * 1.1,
            ocp_alarm: false,
            ovp_enabled: false,
            ovp_limit: max_voltage * 1.1,
            ovp_alarm: false,
        }
    }

    fn measured_voltage(&self) -> f64 {
        if self.output {
            self.voltage
        } else {
            0.0
        }
    }

    fn measured_current(&self) -> f64 {
        if self.output {
            self.load_current.min(self.current)
        } else {
            0.0
        }
    }
}

/// Everything the fake instrument knows.
#[derive(Debug)]
pub struct FakeState {
    pub idn: String,
    pub channels: Vec<FakeChannel>,
    /// Every line received, in order.
    pub received: Vec<String>,
    /// Stop answering queries; the client then times out.
    pub mute: bool,
    pub connections: usize,
}

impl FakeState {
    fn dp832() -> Self {
        Self {
            idn: DP832_IDN.to_string(),
            channels: vec![
                FakeChannel::new(30.0, 3.0),
                FakeChannel::new(30.0, 3.0),
                FakeChannel::new(5.0, 3.0),
            ],
            received: Vec::new(),
            mute: false,
            connections: 0,
        }
    }

    fn channel(&mut self, token: &str) -> Option<&mut FakeChannel> {
        let index: usize = token.trim().strip_prefix("CH")?.parse().ok()?;
        self.channels.get_mut(index.checked_sub(1)?)
    }

    /// Apply one command line; returns the reply line for queries.
    fn handle(&mut self, line: &str) -> Option<String> {
        self.received.push(line.to_string());
        if line == "*IDN?" {
            return Some(self.idn.clone());
        }

        let (head, args) = line.split_once(' ').unwrap_or((line, ""));
        let args: Vec<&str> = args.split(',').map(str::trim).collect();
        let ch = self.channel(args[0])?;
        let on = |token: &str| token.eq_ignore_ascii_case("ON");

        match head {
            ":APPL" => {
                ch.voltage = args.get(1)?.parse().ok()?;
                ch.current = args.get(2)?.parse().ok()?;
                None
            }
            ":APPL?" => Some(format!(
                "{}:{}V/{}A,{:.3},{:.3}",
                args[0], ch.rating.0, ch.rating.1, ch.voltage, ch.current
            )),
            ":OUTP" => {
                ch.output = on(args.get(1)?);
                None
            }
            ":OUTP?" => Some(on_off(ch.output)),
            ":OUTP:MODE?" => {
                let limiting = ch.output && ch.load_current >= ch.current;
                Some(if limiting { "CC" } else { "CV" }.to_string())
            }
            ":MEAS:VOLT?" => Some(format!("{:.4}", ch.measured_voltage())),
            ":MEAS:CURR?" => Some(format!("{:.4}", ch.measured_current())),
            ":MEAS:POWE?" => Some(format!("{:.4}", ch.measured_voltage() * ch.measured_current())),
            ":OUTP:OCP" => {
                ch.ocp_enabled = on(args.get(1)?);
                None
            }
            ":OUTP:OCP?" => Some(on_off(ch.ocp_enabled)),
            ":OUTP:OCP:VAL" => {
                ch.ocp_limit = args.get(1)?.parse().ok()?;
                None
            }
            ":OUTP:OCP:VAL?" => Some(format!("{:.3}", ch.ocp_limit)),
            ":OUTP:OCP:ALAR?" => Some(yes_no(ch.ocp_alarm)),
            ":OUTP:OCP:CLEAR" => {
                ch.ocp_alarm = false;
                None
            }
            ":OUTP:OVP" => {
                ch.ovp_enabled = on(args.get(1)?);
                None
            }
            ":OUTP:OVP?" => Some(on_off(ch.ovp_enabled)),
            ":OUTP:OVP:VAL" => {
                ch.ovp_limit = args.get(1)?.parse().ok()?;
                None
            }
            ":OUTP:OVP:VAL?" => Some(format!("{:.3}", ch.ovp_limit)),
            ":OUTP:OVP:ALAR?" => Some(yes_no(ch.ovp_alarm)),
            ":OUTP:OVP:CLEAR" => {
                ch.ovp_alarm = false;
                None
            }
            _ => None,
        }
    }
}

fn on_off(on: bool) -> String {
    if on { "ON" } else { "OFF" }.to_string()
}

fn yes_no(on: bool) -> String {
    if on { "YES" } else { "NO" }.to_string()
}

/// A DP832 stand-in listening on 127.0.0.1 with an OS-assigned port.
///
/// # Example
/// ```ignore
/// let fake = FakeInstrument::start();
/// let service = service_for(&fake);
/// service.set_channel_settings(1, 5.0, 1.0)?;
/// assert_eq!(fake.state().channels[0].voltage, 5.0);
/// ```
pub struct FakeInstrument {
    addr: SocketAddr,
    state: Arc<Mutex<FakeState>>,
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl FakeInstrument {
    pub fn start() -> Self {
        Self::with_identity(DP832_IDN)
    }

    pub fn with_identity(idn: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake instrument");
        let addr = listener.local_addr().expect("local addr");
        let mut initial = FakeState::dp832();
        initial.idn = idn.to_string();
        let state = Arc::new(Mutex::new(initial));
        let shutdown = Arc::new(AtomicBool::new(false));

        let accept_state = Arc::clone(&state);
        let accept_shutdown = Arc::clone(&shutdown);
        let accept_thread = thread::spawn(move || {
            for stream in listener.incoming() {
                if accept_shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                accept_state.lock().unwrap().connections += 1;
                let conn_state = Arc::clone(&accept_state);
                thread::spawn(move || serve_connection(stream, conn_state));
            }
        });

        Self {
            addr,
            state,
            shutdown,
            accept_thread: Some(accept_thread),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Lock the simulated state for inspection or tweaking.
    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn received(&self) -> Vec<String> {
        self.state().received.clone()
    }

    pub fn set_mute(&self, mute: bool) {
        self.state().mute = mute;
    }
}

impl Drop for FakeInstrument {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the blocking accept so the thread sees the flag.
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }
}

fn serve_connection(stream: TcpStream, state: Arc<Mutex<FakeState>>) {
    let Ok(mut writer) = stream.try_clone() else { return };
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else { break };
        let reply = {
            let mut state = state.lock().unwrap();
            let reply = state.handle(line.trim());
            if state.mute {
                None
            } else {
                reply
            }
        };
        if let Some(reply) = reply {
            if writer.write_all(format!("{reply}\n").as_bytes()).is_err() {
                break;
            }
        }
    }
}

/// A port on 127.0.0.1 with nothing listening.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("local addr").port()
}

/// Configuration whose default target is the fake instrument.
pub fn config_for(fake: &FakeInstrument) -> Config {
    let mut config = Config::default();
    config.device.host = Some(fake.host());
    config.device.port = fake.port();
    config.device.timeout_ms = 500;
    config
}

pub fn service_for(fake: &FakeInstrument) -> PsuService {
    PsuService::from_session(Session::new(config_for(fake)))
}

/// Assert that a JSON value contains specific fields with expected values.
///
/// # Example
/// ```ignore
/// let actual = json!({"status": "success", "channel": 1});
/// let expected = json!({"status": "success"});
/// assert_json_contains(&actual, &expected); // Passes - actual contains all of expected
/// ```
pub fn assert_json_contains(actual: &Value, expected: &Value) {
    match (actual, expected) {
        (Value::Object(actual_map), Value::Object(expected_map)) => {
            for (key, expected_value) in expected_map {
                let actual_value = actual_map
                    .get(key)
                    .unwrap_or_else(|| panic!("Expected key '{}' not found in {}", key, actual));
                assert_json_contains(actual_value, expected_value);
            }
        }
        (Value::Array(actual_arr), Value::Array(expected_arr)) => {
            assert_eq!(actual_arr.len(), expected_arr.len(), "Array lengths differ");
            for (actual_item, expected_item) in actual_arr.iter().zip(expected_arr.iter()) {
                assert_json_contains(actual_item, expected_item);
            }
        }
        _ => {
            assert_eq!(
                actual, expected,
                "JSON values differ: expected {:?}, got {:?}",
                expected, actual
            );
        }
    }
}

/// Assert that a tool payload reports an error of the given type.
pub fn assert_error_type(payload: &Value, error_type: &str) {
    assert_eq!(payload["status"], "error", "expected error payload, got {payload}");
    assert_eq!(payload["error"]["type"], error_type, "payload: {payload}");
}
