//! Reply parsers.
//!
//! Every parser trims surrounding whitespace and fails closed: anything that
//! does not match the expected shape becomes a `ParseError` carrying the raw
//! reply.

use crate::device::types::{ChannelSettings, DeviceIdentity, OutputMode};
use thiserror::Error;

/// A reply did not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Expected {expected}, got reply {reply:?}")]
pub struct ParseError {
    /// Human readable description of the expected shape.
    pub expected: &'static str,
    /// The raw reply text.
    pub reply: String,
}

impl ParseError {
    pub fn new(expected: &'static str, reply: impl Into<String>) -> Self {
        Self {
            expected,
            reply: reply.into(),
        }
    }
}

/// `ON`/`1` → true, `OFF`/`0` → false, case-insensitive.
pub fn parse_bool(reply: &str) -> Result<bool, ParseError> {
    match reply.trim().to_ascii_uppercase().as_str() {
        "ON" | "1" => Ok(true),
        "OFF" | "0" => Ok(false),
        _ => Err(ParseError::new("ON, OFF, 1 or 0", reply)),
    }
}

/// Alarm state: the boolean tokens plus `YES`/`NO`.
pub fn parse_alarm(reply: &str) -> Result<bool, ParseError> {
    match reply.trim().to_ascii_uppercase().as_str() {
        "YES" | "ON" | "1" => Ok(true),
        "NO" | "OFF" | "0" => Ok(false),
        _ => Err(ParseError::new("YES, NO, ON, OFF, 1 or 0", reply)),
    }
}

/// A finite decimal number.
pub fn parse_f64(reply: &str) -> Result<f64, ParseError> {
    reply
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::new("a finite number", reply))
}

/// `*IDN?` reply: exactly four comma-separated fields.
pub fn parse_identity(reply: &str) -> Result<DeviceIdentity, ParseError> {
    let fields: Vec<&str> = reply.trim().split(',').map(str::trim).collect();
    match fields.as_slice() {
        [manufacturer, model, serial, firmware] => Ok(DeviceIdentity {
            manufacturer: manufacturer.to_string(),
            model: model.to_string(),
            serial: serial.to_string(),
            firmware: firmware.to_string(),
        }),
        _ => Err(ParseError::new(
            "four comma-separated identity fields",
            reply,
        )),
    }
}

/// `:APPL?` reply such as `CH1:30V/3A,5.000,1.000`; the last two fields are
/// the voltage and current setpoints.
pub fn parse_applied_settings(reply: &str) -> Result<ChannelSettings, ParseError> {
    const EXPECTED: &str = "applied settings '<label>,<voltage>,<current>'";

    let fields: Vec<&str> = reply.trim().split(',').collect();
    if fields.len() < 2 {
        return Err(ParseError::new(EXPECTED, reply));
    }
    let n = fields.len();
    let voltage = parse_f64(fields[n - 2]).map_err(|_| ParseError::new(EXPECTED, reply))?;
    let current = parse_f64(fields[n - 1]).map_err(|_| ParseError::new(EXPECTED, reply))?;
    Ok(ChannelSettings { voltage, current })
}

/// `:OUTP:MODE?` reply: `CV`, `CC` or `UR`.
pub fn parse_output_mode(reply: &str) -> Result<OutputMode, ParseError> {
    match reply.trim().to_ascii_uppercase().as_str() {
        "CV" => Ok(OutputMode::ConstantVoltage),
        "CC" => Ok(OutputMode::ConstantCurrent),
        "UR" => Ok(OutputMode::Unregulated),
        _ => Err(ParseError::new("CV, CC or UR", reply)),
    }
}
