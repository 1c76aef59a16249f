//! Device facade for DP800/DP700 power supplies.
//!
//! `Dp800` couples channel validation, the codec and a transport into typed
//! operations. Validation always happens before any I/O, and nothing is
//! cached: every getter asks the instrument.
//!
//! # Example
//! ```no_run
//! use rigol_dp_agent::device::Dp800;
//! use rigol_dp_agent::transport::ConnectionTarget;
//!
//! let target = ConnectionTarget::new("192.168.1.100");
//! let reading = Dp800::scoped(&target, |psu| {
//!     psu.set_channel_settings(1, 5.0, 0.5)?;
//!     psu.set_output_state(1, true)?;
//!     psu.measure_all(1)
//! })?;
//! println!("{:.3} V", reading.voltage);
//! # Ok::<(), rigol_dp_agent::error::DeviceError>(())
//! ```

pub mod model;
pub mod types;

pub use model::{ChannelRating, Model, PROTECTION_HEADROOM};
pub use types::{
    ChannelSettings, DeviceIdentity, DiscoveredDevice, Measurement, OutputMode, ProtectionConfig,
};

use crate::codec::{self, Command, ProtectionKind, Quantity};
use crate::error::{DeviceError, DeviceResult};
use crate::transport::{
    BoxedTransport, ConnectionTarget, Connector, ScpiTransport, TcpTransport,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// A connected power supply.
#[derive(Debug)]
pub struct Dp800<T: ScpiTransport> {
    transport: T,
    model: Model,
    identity: Option<DeviceIdentity>,
}

impl<T: ScpiTransport> Dp800<T> {
    /// Wrap a transport, assuming `model` without asking the instrument.
    pub fn new(transport: T, model: Model) -> Self {
        Self {
            transport,
            model,
            identity: None,
        }
    }

    /// Wrap a transport, identify the instrument and select its model.
    ///
    /// An unrecognised model falls back to the DP832 channel layout.
    pub fn connect(transport: T) -> DeviceResult<Self> {
        let mut device = Self::new(transport, Model::Dp832);
        let identity = device.identify()?;
        device.model = match Model::from_identity_model(&identity.model) {
            Some(model) => model,
            None => {
                warn!(
                    "Unrecognised model '{}', assuming {} channel layout",
                    identity.model,
                    Model::Dp832
                );
                Model::Dp832
            }
        };
        info!(
            "Connected to {} {} (serial {}, firmware {}) at {}",
            identity.manufacturer,
            identity.model,
            identity.serial,
            identity.firmware,
            device.transport.target()
        );
        device.identity = Some(identity);
        Ok(device)
    }

    pub fn model(&self) -> Model {
        self.model
    }

    /// Identity read when the device was connected, if any.
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    pub fn target(&self) -> &ConnectionTarget {
        self.transport.target()
    }

    /// Close the underlying connection. Safe to call more than once.
    pub fn close(&mut self) -> DeviceResult<()> {
        self.transport.close()?;
        Ok(())
    }

    /// Give back the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    // ========== Plumbing ==========

    fn rating(&self, channel: u8) -> DeviceResult<&'static ChannelRating> {
        self.model
            .rating(channel)
            .ok_or_else(|| DeviceError::InvalidChannel {
                channel,
                model: self.model,
                max: self.model.channel_count(),
            })
    }

    fn check_value(what: &'static str, channel: u8, value: f64, max: f64) -> DeviceResult<()> {
        if value.is_finite() && (0.0..=max + 1e-9).contains(&value) {
            Ok(())
        } else {
            Err(DeviceError::InvalidValue {
                what,
                channel,
                value,
                max,
            })
        }
    }

    fn send(&mut self, command: Command) -> DeviceResult<()> {
        let line = command.to_line();
        info!("-> {}", line);
        self.transport.write_line(&line)?;
        Ok(())
    }

    fn query(&mut self, command: Command) -> DeviceResult<String> {
        let line = command.to_line();
        let reply = self.transport.query(&line)?;
        debug!("{} <- {}", line, reply);
        Ok(reply)
    }

    fn channels(&self) -> impl Iterator<Item = u8> {
        self.model.channels().iter().map(|r| r.channel)
    }

    // ========== Identity & settings ==========

    /// Query `*IDN?`.
    pub fn identify(&mut self) -> DeviceResult<DeviceIdentity> {
        let reply = self.query(Command::Identify)?;
        Ok(codec::parse_identity(&reply)?)
    }

    /// Program voltage and current setpoints for a channel.
    pub fn set_channel_settings(
        &mut self,
        channel: u8,
        voltage: f64,
        current: f64,
    ) -> DeviceResult<()> {
        let rating = self.rating(channel)?;
        Self::check_value("voltage", channel, voltage, rating.max_voltage)?;
        Self::check_value("current", channel, current, rating.max_current)?;
        self.send(Command::Apply {
            channel,
            voltage,
            current,
        })
    }

    /// Read back the programmed setpoints.
    pub fn get_channel_settings(&mut self, channel: u8) -> DeviceResult<ChannelSettings> {
        self.rating(channel)?;
        let reply = self.query(Command::QueryApplied { channel })?;
        Ok(codec::parse_applied_settings(&reply)?)
    }

    // ========== Output ==========

    pub fn set_output_state(&mut self, channel: u8, on: bool) -> DeviceResult<()> {
        self.rating(channel)?;
        self.send(Command::SetOutput { channel, on })
    }

    pub fn get_output_state(&mut self, channel: u8) -> DeviceResult<bool> {
        self.rating(channel)?;
        let reply = self.query(Command::QueryOutput { channel })?;
        Ok(codec::parse_bool(&reply)?)
    }

    /// Regulation mode (CV, CC or UR) the output is currently in.
    pub fn get_output_mode(&mut self, channel: u8) -> DeviceResult<OutputMode> {
        self.rating(channel)?;
        let reply = self.query(Command::QueryOutputMode { channel })?;
        Ok(codec::parse_output_mode(&reply)?)
    }

    // ========== Measurement ==========

    fn measure(&mut self, channel: u8, quantity: Quantity) -> DeviceResult<f64> {
        self.rating(channel)?;
        let reply = self.query(Command::Measure { channel, quantity })?;
        Ok(codec::parse_f64(&reply)?)
    }

    pub fn measure_voltage(&mut self, channel: u8) -> DeviceResult<f64> {
        self.measure(channel, Quantity::Voltage)
    }

    pub fn measure_current(&mut self, channel: u8) -> DeviceResult<f64> {
        self.measure(channel, Quantity::Current)
    }

    pub fn measure_power(&mut self, channel: u8) -> DeviceResult<f64> {
        self.measure(channel, Quantity::Power)
    }

    /// Voltage, current and power, read with three sequential queries.
    pub fn measure_all(&mut self, channel: u8) -> DeviceResult<Measurement> {
        self.rating(channel)?;
        Ok(Measurement {
            voltage: self.measure_voltage(channel)?,
            current: self.measure_current(channel)?,
            power: self.measure_power(channel)?,
        })
    }

    // ========== Protection ==========

    pub fn set_protection_enabled(
        &mut self,
        kind: ProtectionKind,
        channel: u8,
        on: bool,
    ) -> DeviceResult<()> {
        self.rating(channel)?;
        self.send(Command::SetProtectionEnabled { kind, channel, on })
    }

    pub fn get_protection_enabled(
        &mut self,
        kind: ProtectionKind,
        channel: u8,
    ) -> DeviceResult<bool> {
        self.rating(channel)?;
        let reply = self.query(Command::QueryProtectionEnabled { kind, channel })?;
        Ok(codec::parse_bool(&reply)?)
    }

    /// Set the trip level. OCP takes amperes, OVP takes volts; either may
    /// exceed the channel rating by up to 10%.
    pub fn set_protection_value(
        &mut self,
        kind: ProtectionKind,
        channel: u8,
        value: f64,
    ) -> DeviceResult<()> {
        let rating = self.rating(channel)?;
        let (what, max) = match kind {
            ProtectionKind::Ocp => ("OCP limit", rating.max_ocp()),
            ProtectionKind::Ovp => ("OVP limit", rating.max_ovp()),
        };
        Self::check_value(what, channel, value, max)?;
        self.send(Command::SetProtectionValue {
            kind,
            channel,
            value,
        })
    }

    pub fn get_protection_value(&mut self, kind: ProtectionKind, channel: u8) -> DeviceResult<f64> {
        self.rating(channel)?;
        let reply = self.query(Command::QueryProtectionValue { kind, channel })?;
        Ok(codec::parse_f64(&reply)?)
    }

    /// Whether the protection has tripped.
    pub fn get_protection_alarm(
        &mut self,
        kind: ProtectionKind,
        channel: u8,
    ) -> DeviceResult<bool> {
        self.rating(channel)?;
        let reply = self.query(Command::QueryProtectionAlarm { kind, channel })?;
        Ok(codec::parse_alarm(&reply)?)
    }

    pub fn clear_protection_alarm(
        &mut self,
        kind: ProtectionKind,
        channel: u8,
    ) -> DeviceResult<()> {
        self.rating(channel)?;
        self.send(Command::ClearProtectionAlarm { kind, channel })
    }

    /// Enable flag, limit and alarm of one protection, in three queries.
    pub fn get_protection(
        &mut self,
        kind: ProtectionKind,
        channel: u8,
    ) -> DeviceResult<ProtectionConfig> {
        self.rating(channel)?;
        Ok(ProtectionConfig {
            enabled: self.get_protection_enabled(kind, channel)?,
            limit: self.get_protection_value(kind, channel)?,
            alarm: self.get_protection_alarm(kind, channel)?,
        })
    }

    pub fn set_ocp_enabled(&mut self, channel: u8, on: bool) -> DeviceResult<()> {
        self.set_protection_enabled(ProtectionKind::Ocp, channel, on)
    }

    pub fn get_ocp_enabled(&mut self, channel: u8) -> DeviceResult<bool> {
        self.get_protection_enabled(ProtectionKind::Ocp, channel)
    }

    pub fn set_ocp_value(&mut self, channel: u8, current_limit: f64) -> DeviceResult<()> {
        self.set_protection_value(ProtectionKind::Ocp, channel, current_limit)
    }

    pub fn get_ocp_value(&mut self, channel: u8) -> DeviceResult<f64> {
        self.get_protection_value(ProtectionKind::Ocp, channel)
    }

    pub fn get_ocp_alarm(&mut self, channel: u8) -> DeviceResult<bool> {
        self.get_protection_alarm(ProtectionKind::Ocp, channel)
    }

    pub fn clear_ocp_alarm(&mut self, channel: u8) -> DeviceResult<()> {
        self.clear_protection_alarm(ProtectionKind::Ocp, channel)
    }

    pub fn set_ovp_enabled(&mut self, channel: u8, on: bool) -> DeviceResult<()> {
        self.set_protection_enabled(ProtectionKind::Ovp, channel, on)
    }

    pub fn get_ovp_enabled(&mut self, channel: u8) -> DeviceResult<bool> {
        self.get_protection_enabled(ProtectionKind::Ovp, channel)
    }

    pub fn set_ovp_value(&mut self, channel: u8, voltage_limit: f64) -> DeviceResult<()> {
        self.set_protection_value(ProtectionKind::Ovp, channel, voltage_limit)
    }

    pub fn get_ovp_value(&mut self, channel: u8) -> DeviceResult<f64> {
        self.get_protection_value(ProtectionKind::Ovp, channel)
    }

    pub fn get_ovp_alarm(&mut self, channel: u8) -> DeviceResult<bool> {
        self.get_protection_alarm(ProtectionKind::Ovp, channel)
    }

    pub fn clear_ovp_alarm(&mut self, channel: u8) -> DeviceResult<()> {
        self.clear_protection_alarm(ProtectionKind::Ovp, channel)
    }

    // ========== Aggregates ==========

    fn for_each_channel<V>(
        &mut self,
        mut op: impl FnMut(&mut Self, u8) -> DeviceResult<V>,
    ) -> DeviceResult<BTreeMap<u8, V>> {
        let channels: Vec<u8> = self.channels().collect();
        let mut out = BTreeMap::new();
        for channel in channels {
            out.insert(channel, op(self, channel)?);
        }
        Ok(out)
    }

    /// Output state of every channel. Fails as a whole on the first error.
    pub fn get_all_output_states(&mut self) -> DeviceResult<BTreeMap<u8, bool>> {
        self.for_each_channel(Self::get_output_state)
    }

    pub fn get_all_settings(&mut self) -> DeviceResult<BTreeMap<u8, ChannelSettings>> {
        self.for_each_channel(Self::get_channel_settings)
    }

    pub fn get_all_measurements(&mut self) -> DeviceResult<BTreeMap<u8, Measurement>> {
        self.for_each_channel(Self::measure_all)
    }
}

impl Dp800<BoxedTransport> {
    /// Open `target` through `connector` and identify the instrument.
    pub fn open_with(connector: &dyn Connector, target: &ConnectionTarget) -> DeviceResult<Self> {
        let transport = connector.open(target)?;
        Self::connect(transport)
    }
}

impl Dp800<TcpTransport> {
    /// Open a TCP connection to `target` and identify the instrument.
    pub fn open(target: &ConnectionTarget) -> DeviceResult<Self> {
        let transport = TcpTransport::open(target)?;
        Self::connect(transport)
    }

    /// Run `f` against a freshly opened device; the connection is closed on
    /// every exit path.
    pub fn scoped<R>(
        target: &ConnectionTarget,
        f: impl FnOnce(&mut Self) -> DeviceResult<R>,
    ) -> DeviceResult<R> {
        let mut device = Self::open(target)?;
        let result = f(&mut device);
        if let Err(e) = device.close() {
            debug!("Error closing {}: {}", target, e);
        }
        result
    }
}
