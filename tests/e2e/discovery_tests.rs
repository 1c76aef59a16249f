//! E2E tests for network discovery.
//!
//! These tests verify that the system can correctly:
//! - Identify an instrument answering on a TCP port
//! - Skip addresses where nothing listens
//! - Filter by vendor and model
//! - Fall back to discovery when no address is configured

use crate::common::{closed_port, FakeInstrument, DP821_IDN};
use rigol_dp_agent::config::Config;
use rigol_dp_agent::discovery::{ConnectorProber, Discovery, IdentityMatcher};
use rigol_dp_agent::{PsuService, Session};
use std::time::Duration;

fn discovery(port: u16) -> Discovery<ConnectorProber> {
    Discovery::new(ConnectorProber::default())
        .with_port(port)
        .with_timeout(Duration::from_millis(300))
}

#[test]
fn test_probe_finds_fake_instrument() {
    let fake = FakeInstrument::start();

    let found = discovery(fake.port()).probe("127.0.0.1").unwrap();

    let device = found.expect("instrument should be found");
    assert_eq!(device.ip, "127.0.0.1");
    assert_eq!(device.port, fake.port());
    assert_eq!(device.resource, format!("TCPIP0::127.0.0.1::{}::SOCKET", fake.port()));
    assert_eq!(device.identity.model, "DP832");
    assert_eq!(fake.received(), vec!["*IDN?".to_string()]);
}

#[test]
fn test_probe_skips_closed_port() {
    let found = discovery(closed_port()).probe("127.0.0.1").unwrap();
    assert!(found.is_none());
}

#[test]
fn test_probe_skips_silent_listener() {
    let fake = FakeInstrument::start();
    fake.set_mute(true);

    let found = discovery(fake.port()).probe("127.0.0.1").unwrap();
    assert!(found.is_none(), "a listener that never answers is not an instrument");
}

#[test]
fn test_scan_keeps_probe_order() {
    let fake = FakeInstrument::start();

    let found = discovery(fake.port())
        .scan(&["127.0.0.1", "127.0.0.1"])
        .unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(fake.state().connections, 2);
}

#[test]
fn test_model_filter() {
    let fake = FakeInstrument::with_identity(DP821_IDN);

    let only_dp832 = discovery(fake.port())
        .with_matcher(IdentityMatcher::new("RIGOL", vec!["DP832".to_string()]))
        .probe("127.0.0.1")
        .unwrap();
    assert!(only_dp832.is_none());

    let any_dp8 = discovery(fake.port())
        .with_matcher(IdentityMatcher::new("rigol", vec!["DP8".to_string()]))
        .probe("127.0.0.1")
        .unwrap();
    assert_eq!(any_dp8.unwrap().identity.model, "DP821A");
}

#[test]
fn test_foreign_vendor_is_ignored() {
    let fake = FakeInstrument::with_identity("KEYSIGHT TECHNOLOGIES,E36312A,MY123,1.0");

    let found = discovery(fake.port()).probe("127.0.0.1").unwrap();
    assert!(found.is_none());
}

#[test]
fn test_service_discovers_on_configured_network() {
    let fake = FakeInstrument::start();
    let mut config = Config::default();
    config.device.port = fake.port();
    config.discovery.network = Some("127.0.0".to_string());
    config.discovery.host_start = 1;
    config.discovery.host_end = 1;
    config.discovery.probe_timeout_ms = 300;
    let service = PsuService::from_session(Session::new(config));

    let devices = service.discover_devices(None, None).unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].ip, "127.0.0.1");
}

#[test]
fn test_connect_falls_back_to_discovery() {
    let fake = FakeInstrument::start();
    let mut config = Config::default();
    config.device.host = None;
    config.device.port = fake.port();
    config.discovery.network = Some("127.0.0".to_string());
    config.discovery.host_start = 1;
    config.discovery.host_end = 1;
    config.discovery.probe_timeout_ms = 300;
    let service = PsuService::from_session(Session::new(config));

    let info = service.connect(None, None).unwrap();

    assert_eq!(info.ip, "127.0.0.1");
    assert_eq!(info.port, fake.port());
    assert!(service.connection_status().connected);
}

#[test]
fn test_invalid_network_is_rejected() {
    let service = PsuService::from_session(Session::new(Config::default()));

    let err = service.discover_devices(Some("10.0"), None).unwrap_err();
    assert_eq!(err.error_type(), "validation");
}
