//! Utility functions for hardware testing.
//!
//! Reads the instrument address from the environment and builds services
//! pointed at it.

use rigol_dp_agent::config::Config;
use rigol_dp_agent::transport::ConnectionTarget;
use rigol_dp_agent::{PsuService, Session};
use std::env;
use std::time::Duration;

/// Instrument under test, from environment variables.
pub struct TestInstrument {
    pub host: String,
    pub port: u16,
    /// Allow tests that switch outputs on. Leave unset with a load attached.
    pub outputs_allowed: bool,
}

impl TestInstrument {
    /// `RIGOL_DP832_IP` (required), `RIGOL_DP832_PORT` (default 5555) and
    /// `RIGOL_DP_TEST_OUTPUTS=1`.
    pub fn from_env() -> Option<Self> {
        let host = env::var("RIGOL_DP832_IP").ok().filter(|h| !h.is_empty())?;
        let port = env::var("RIGOL_DP832_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5555);
        let outputs_allowed = env::var("RIGOL_DP_TEST_OUTPUTS").ok().as_deref() == Some("1");

        Some(Self {
            host,
            port,
            outputs_allowed,
        })
    }

    pub fn target(&self) -> ConnectionTarget {
        ConnectionTarget::new(&self.host)
            .with_port(self.port)
            .with_timeout(Duration::from_secs(5))
    }

    pub fn service(&self) -> PsuService {
        let mut config = Config::default();
        config.device.host = Some(self.host.clone());
        config.device.port = self.port;
        PsuService::from_session(Session::new(config))
    }
}

/// Skip test if no instrument is configured.
pub fn skip_without_hardware() -> Option<TestInstrument> {
    let instrument = TestInstrument::from_env();
    if instrument.is_none() {
        println!("⏭️  Skipping hardware test: RIGOL_DP832_IP not set");
    }
    instrument
}
