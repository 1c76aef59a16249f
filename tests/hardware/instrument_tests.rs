//! Tests against a real power supply.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export RIGOL_DP832_IP=192.168.68.51
//! export RIGOL_DP_TEST_OUTPUTS=1          # only with nothing attached
//! cargo test --features hardware-tests -- --ignored
//! ```
//!
//! Read-only tests leave the instrument untouched. Output tests program
//! 1 V / 0.1 A on channel 1 and switch it off again.

use super::utils::skip_without_hardware;
use rigol_dp_agent::{Dp800, ProtectionKind};
use std::thread;
use std::time::Duration;

#[test]
#[ignore] // Run with --ignored flag
fn test_real_identify() {
    let Some(instrument) = skip_without_hardware() else { return };

    let identity = Dp800::scoped(&instrument.target(), |d| d.identify()).unwrap();

    println!(
        "✅ Connected to {} {} ({})",
        identity.manufacturer, identity.model, identity.firmware
    );
    assert!(identity.manufacturer.to_ascii_uppercase().contains("RIGOL"));
}

#[test]
#[ignore]
fn test_real_read_all_channels() {
    let Some(instrument) = skip_without_hardware() else { return };
    let service = instrument.service();

    let info = service.connect(None, None).unwrap();
    let settings = service.get_all_settings().unwrap();
    let states = service.get_all_output_states().unwrap();
    let measurements = service.get_all_measurements().unwrap();

    assert_eq!(settings.len(), info.model.channel_count() as usize);
    assert_eq!(states.len(), settings.len());
    assert_eq!(measurements.len(), settings.len());
    for (channel, m) in &measurements {
        println!("CH{channel}: {:.3} V {:.3} A {:.3} W", m.voltage, m.current, m.power);
        assert!(m.voltage >= 0.0);
    }
}

#[test]
#[ignore]
fn test_real_protection_status() {
    let Some(instrument) = skip_without_hardware() else { return };
    let service = instrument.service();

    for kind in [ProtectionKind::Ocp, ProtectionKind::Ovp] {
        let status = service.get_protection_status(kind, 1).unwrap();
        println!("CH1 {kind}: {status:?}");
        assert!(status.limit > 0.0);
    }
}

#[test]
#[ignore]
fn test_real_output_cycle() {
    let Some(instrument) = skip_without_hardware() else { return };
    if !instrument.outputs_allowed {
        println!("⏭️  Skipping: RIGOL_DP_TEST_OUTPUTS not set");
        return;
    }
    let service = instrument.service();

    service.set_channel_settings(1, 1.0, 0.1).unwrap();
    service.set_output_state(1, true).unwrap();
    thread::sleep(Duration::from_millis(500));
    let measured = service.measure_voltage(1);
    service.set_output_state(1, false).unwrap();

    let measured = measured.unwrap();
    assert!((measured - 1.0).abs() < 0.05, "measured {measured} V, programmed 1 V");
    assert!(!service.get_output_state(1).unwrap());
}
