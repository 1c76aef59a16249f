//! Discovery against a real network.
//!
//! Sweeps the /24 the configured instrument lives on and expects to find it.

use super::utils::skip_without_hardware;
use rigol_dp_agent::discovery::{ConnectorProber, Discovery};
use std::time::Duration;

#[test]
#[ignore]
fn test_real_probe_configured_host() {
    let Some(instrument) = skip_without_hardware() else { return };

    let found = Discovery::new(ConnectorProber::default())
        .with_port(instrument.port)
        .with_timeout(Duration::from_secs(2))
        .probe(&instrument.host)
        .unwrap();

    let device = found.expect("configured instrument should answer discovery");
    println!("✅ Found {} at {}", device.identity.model, device.resource);
}

#[test]
#[ignore]
fn test_real_subnet_sweep_finds_instrument() {
    let Some(instrument) = skip_without_hardware() else { return };
    let Some((prefix, _)) = instrument.host.rsplit_once('.') else {
        println!("⏭️  Skipping: {} is not an IPv4 address", instrument.host);
        return;
    };

    let service = instrument.service();
    let devices = service.discover_devices(Some(prefix), Some(instrument.port)).unwrap();

    println!("Found {} instrument(s) on {prefix}.0/24", devices.len());
    assert!(devices.iter().any(|d| d.ip == instrument.host));
}
