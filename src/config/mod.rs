//! Configuration module for rigol_dp_agent.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `RIGOL_DP_CONFIG` environment variable (explicit path)
//! 2. `./config.toml` (current directory)
//! 3. `rigol-dp-agent/config.toml` in the platform config directory
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! - `RIGOL_DP832_IP`, `RIGOL_DP832_PORT`: default instrument address
//! - `RIGOL_DP_TIMEOUT_MS`
//! - `RIGOL_DP_DISCOVERY_NETWORK`, `RIGOL_DP_DISCOVERY_TIMEOUT_MS`
//! - `RIGOL_DP_LOG_LEVEL`, `RIGOL_DP_LOG_FORMAT`
//!
//! # Example
//!
//! ```rust,no_run
//! use rigol_dp_agent::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//! println!("Default port: {}", config.device.port);
//! # Ok::<(), rigol_dp_agent::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, validate, ConfigLoader,
};
pub use schema::{
    Config, DeviceConfig, DiscoveryConfig, LogFormat, LoggingConfig, ServerConfig,
    supported_models, DEFAULT_PROBE_TIMEOUT_MS,
};
