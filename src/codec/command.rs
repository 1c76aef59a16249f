//! SCPI command templates for the DP800/DP700 family.
//!
//! Each `Command` renders to exactly one command line. Numbers are written in
//! fixed-point with three decimals so the instrument never sees scientific
//! notation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which protection circuit a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionKind {
    /// Over-current protection.
    Ocp,
    /// Over-voltage protection.
    Ovp,
}

impl ProtectionKind {
    /// SCPI mnemonic for this protection.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Ocp => "OCP",
            Self::Ovp => "OVP",
        }
    }

    /// Unit of the protection limit.
    pub fn unit(self) -> &'static str {
        match self {
            Self::Ocp => "A",
            Self::Ovp => "V",
        }
    }
}

impl fmt::Display for ProtectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl std::str::FromStr for ProtectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OCP" => Ok(Self::Ocp),
            "OVP" => Ok(Self::Ovp),
            other => Err(format!("unknown protection kind '{other}', expected OCP or OVP")),
        }
    }
}

/// A measured quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Voltage,
    Current,
    Power,
}

impl Quantity {
    fn mnemonic(self) -> &'static str {
        match self {
            Self::Voltage => "VOLT",
            Self::Current => "CURR",
            Self::Power => "POWE",
        }
    }
}

/// Every command the driver sends.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Identify,
    Apply {
        channel: u8,
        voltage: f64,
        current: f64,
    },
    QueryApplied { channel: u8 },
    SetOutput { channel: u8, on: bool },
    QueryOutput { channel: u8 },
    QueryOutputMode { channel: u8 },
    Measure { channel: u8, quantity: Quantity },
    SetProtectionEnabled {
        kind: ProtectionKind,
        channel: u8,
        on: bool,
    },
    QueryProtectionEnabled { kind: ProtectionKind, channel: u8 },
    SetProtectionValue {
        kind: ProtectionKind,
        channel: u8,
        value: f64,
    },
    QueryProtectionValue { kind: ProtectionKind, channel: u8 },
    QueryProtectionAlarm { kind: ProtectionKind, channel: u8 },
    ClearProtectionAlarm { kind: ProtectionKind, channel: u8 },
}

impl Command {
    /// Render the command line, without terminator.
    pub fn to_line(&self) -> String {
        match self {
            Self::Identify => "*IDN?".to_string(),
            Self::Apply { channel, voltage, current } => format!(
                ":APPL CH{channel},{},{}",
                format_number(*voltage),
                format_number(*current)
            ),
            Self::QueryApplied { channel } => format!(":APPL? CH{channel}"),
            Self::SetOutput { channel, on } => format!(":OUTP CH{channel},{}", on_off(*on)),
            Self::QueryOutput { channel } => format!(":OUTP? CH{channel}"),
            Self::QueryOutputMode { channel } => format!(":OUTP:MODE? CH{channel}"),
            Self::Measure { channel, quantity } => {
                format!(":MEAS:{}? CH{channel}", quantity.mnemonic())
            }
            Self::SetProtectionEnabled { kind, channel, on } => {
                format!(":OUTP:{kind} CH{channel},{}", on_off(*on))
            }
            Self::QueryProtectionEnabled { kind, channel } => format!(":OUTP:{kind}? CH{channel}"),
            Self::SetProtectionValue { kind, channel, value } => {
                format!(":OUTP:{kind}:VAL CH{channel},{}", format_number(*value))
            }
            Self::QueryProtectionValue { kind, channel } => {
                format!(":OUTP:{kind}:VAL? CH{channel}")
            }
            Self::QueryProtectionAlarm { kind, channel } => {
                format!(":OUTP:{kind}:ALAR? CH{channel}")
            }
            Self::ClearProtectionAlarm { kind, channel } => {
                format!(":OUTP:{kind}:CLEAR CH{channel}")
            }
        }
    }

    /// Whether the instrument answers this command with a reply line.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Self::Identify
                | Self::QueryApplied { .. }
                | Self::QueryOutput { .. }
                | Self::QueryOutputMode { .. }
                | Self::Measure { .. }
                | Self::QueryProtectionEnabled { .. }
                | Self::QueryProtectionValue { .. }
                | Self::QueryProtectionAlarm { .. }
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Fixed-point rendering with three decimals.
pub fn format_number(value: f64) -> String {
    format!("{value:.3}")
}

fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}
