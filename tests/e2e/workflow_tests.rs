//! Complete workflow E2E tests: connect -> configure -> enable -> measure -> disconnect
//!
//! These tests verify full end-to-end workflows including:
//! - Channel configuration and readback over a real socket
//! - Protection configuration and alarm handling
//! - Validation that never reaches the wire
//! - Recovery after a timed-out connection

use crate::common::{closed_port, service_for, FakeInstrument, DP821_IDN};
use pretty_assertions::assert_eq;
use rigol_dp_agent::transport::ConnectionTarget;
use rigol_dp_agent::{Dp800, Measurement, Model, OutputMode, ProtectionKind};
use std::time::Duration;

#[test]
fn test_full_workflow_configure_enable_measure() {
    let fake = FakeInstrument::start();
    let service = service_for(&fake);

    let info = service.connect(None, None).unwrap();
    assert_eq!(info.model, Model::Dp832);
    assert_eq!(info.device_info.unwrap().serial, "DP8C123456");

    service.set_channel_settings(1, 5.0, 1.0).unwrap();
    service.set_output_state(1, true).unwrap();
    fake.state().channels[0].load_current = 0.5;

    let m = service.measure_all(1).unwrap();
    assert_eq!(
        m,
        Measurement {
            voltage: 5.0,
            current: 0.5,
            power: 2.5
        }
    );
    assert_eq!(service.get_output_mode(1).unwrap(), OutputMode::ConstantVoltage);

    assert!(service.disconnect());
    assert!(!service.connection_status().connected);

    assert_eq!(
        fake.received(),
        vec![
            "*IDN?",
            ":APPL CH1,5.000,1.000",
            ":OUTP CH1,ON",
            ":MEAS:VOLT? CH1",
            ":MEAS:CURR? CH1",
            ":MEAS:POWE? CH1",
            ":OUTP:MODE? CH1",
        ]
    );
}

#[test]
fn test_current_limited_channel_reports_cc() {
    let fake = FakeInstrument::start();
    let service = service_for(&fake);

    service.set_channel_settings(2, 12.0, 0.2).unwrap();
    service.set_output_state(2, true).unwrap();
    fake.state().channels[1].load_current = 1.0;

    assert_eq!(service.get_output_mode(2).unwrap(), OutputMode::ConstantCurrent);
    assert_eq!(service.measure_current(2).unwrap(), 0.2);
}

#[test]
fn test_settings_readback() {
    let fake = FakeInstrument::start();
    let service = service_for(&fake);

    service.set_channel_settings(3, 3.3, 0.5).unwrap();
    let settings = service.get_channel_settings(3).unwrap();

    assert_eq!(settings.voltage, 3.3);
    assert_eq!(settings.current, 0.5);
}

#[test]
fn test_validation_never_reaches_the_wire() {
    let fake = FakeInstrument::start();
    let service = service_for(&fake);
    service.connect(None, None).unwrap();

    let err = service.set_channel_settings(4, 1.0, 1.0).unwrap_err();
    assert_eq!(err.error_type(), "validation");
    let err = service.set_channel_settings(3, 6.0, 1.0).unwrap_err();
    assert_eq!(err.error_type(), "validation");
    let err = service.set_protection_value(ProtectionKind::Ocp, 1, 3.5).unwrap_err();
    assert_eq!(err.error_type(), "validation");
    let err = service.set_channel_settings(1, -1.0, 1.0).unwrap_err();
    assert_eq!(err.error_type(), "validation");

    assert_eq!(fake.received(), vec!["*IDN?"]);
    assert!(service.connection_status().connected, "validation errors keep the connection");
}

#[test]
fn test_protection_workflow() {
    let fake = FakeInstrument::start();
    let service = service_for(&fake);

    service.set_protection_value(ProtectionKind::Ovp, 1, 31.0).unwrap();
    service.set_protection_enabled(ProtectionKind::Ovp, 1, true).unwrap();
    let status = service.get_protection_status(ProtectionKind::Ovp, 1).unwrap();
    assert!(status.enabled);
    assert_eq!(status.limit, 31.0);
    assert!(!status.alarm);

    fake.state().channels[0].ovp_alarm = true;
    assert!(service.get_protection_alarm(ProtectionKind::Ovp, 1).unwrap());
    service.clear_protection_alarm(ProtectionKind::Ovp, 1).unwrap();
    assert!(!service.get_protection_alarm(ProtectionKind::Ovp, 1).unwrap());

    service.set_protection_value(ProtectionKind::Ocp, 2, 1.5).unwrap();
    assert_eq!(service.get_protection_value(ProtectionKind::Ocp, 2).unwrap(), 1.5);
    assert!(!service.get_protection_enabled(ProtectionKind::Ocp, 2).unwrap());
}

#[test]
fn test_aggregates_cover_every_channel() {
    let fake = FakeInstrument::start();
    let service = service_for(&fake);
    service.set_output_state(2, true).unwrap();

    let states = service.get_all_output_states().unwrap();
    assert_eq!(states.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(states[&2], true);
    assert_eq!(states[&1], false);

    let settings = service.get_all_settings().unwrap();
    assert_eq!(settings.len(), 3);
    assert_eq!(settings[&3].current, 3.0);

    let measurements = service.get_all_measurements().unwrap();
    assert_eq!(measurements.len(), 3);
    assert_eq!(measurements[&1].voltage, 0.0);
}

#[test]
fn test_timeout_drops_connection_and_next_call_reconnects() {
    let fake = FakeInstrument::start();
    let service = service_for(&fake);
    service.connect(None, None).unwrap();

    fake.set_mute(true);
    let err = service.get_output_state(1).unwrap_err();
    assert_eq!(err.error_type(), "timeout");
    assert!(!service.connection_status().connected);

    fake.set_mute(false);
    assert_eq!(service.get_output_state(1).unwrap(), false);
    assert!(service.connection_status().connected);
    assert_eq!(fake.state().connections, 2);
}

#[test]
fn test_unreachable_instrument_reports_connection_error() {
    let service = rigol_dp_agent::PsuService::from_session(rigol_dp_agent::Session::new({
        let mut config = rigol_dp_agent::config::Config::default();
        config.device.host = Some("127.0.0.1".to_string());
        config.device.port = closed_port();
        config.device.timeout_ms = 300;
        config
    }));

    let err = service.measure_voltage(1).unwrap_err();
    assert_eq!(err.error_type(), "connection");
}

#[test]
fn test_test_connection_leaves_session_alone() {
    let fake = FakeInstrument::start();
    let service = service_for(&fake);

    let info = service.test_connection(None, None).unwrap();

    assert_eq!(info.port, fake.port());
    assert!(!service.connection_status().connected);
}

#[test]
fn test_other_model_uses_its_channel_table() {
    let fake = FakeInstrument::with_identity(DP821_IDN);
    let service = service_for(&fake);

    let info = service.connect(None, None).unwrap();
    assert_eq!(info.model, Model::Dp821);

    let err = service.get_output_state(3).unwrap_err();
    assert_eq!(err.error_type(), "validation");
    assert_eq!(service.get_all_output_states().unwrap().len(), 2);
}

#[test]
fn test_scoped_device_closes_connection() {
    let fake = FakeInstrument::start();
    let target = ConnectionTarget::new(fake.host())
        .with_port(fake.port())
        .with_timeout(Duration::from_millis(500));

    let states = Dp800::scoped(&target, |device| {
        device.set_output_state(1, true)?;
        device.get_all_output_states()
    })
    .unwrap();

    assert_eq!(states[&1], true);
    assert_eq!(fake.state().connections, 1);
}
