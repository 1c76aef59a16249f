//! Command/response codec.
//!
//! Maps typed requests to SCPI command lines and single-line replies back to
//! typed values. Holds no state and does no I/O.

pub mod command;
pub mod reply;

pub use command::{format_number, Command, ProtectionKind, Quantity};
pub use reply::{
    parse_alarm, parse_applied_settings, parse_bool, parse_f64, parse_identity,
    parse_output_mode, ParseError,
};
