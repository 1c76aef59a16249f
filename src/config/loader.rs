//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "RIGOL_DP";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "RIGOL_DP_CONFIG";

/// Default instrument address, shared with the instrument's own tooling.
const HOST_ENV: &str = "RIGOL_DP832_IP";
const PORT_ENV: &str = "RIGOL_DP832_PORT";

/// Application name used for the platform config directory.
const APP_NAME: &str = "rigol-dp-agent";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `RIGOL_DP_CONFIG` environment variable (explicit path)
    /// 2. `./config.toml` (current directory)
    /// 3. `rigol-dp-agent/config.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values, and the result is validated.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        validate(&config)?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        validate(&config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    ///
    /// Environment overrides are still applied; malformed values are ignored.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        let _ = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    get_default_config_path().filter(|p| p.exists())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read a non-empty environment variable.
fn env_value(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(var: &str, value: &str, message: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, message))
}

/// Apply environment variable overrides to the configuration.
///
/// Supported variables:
/// - `RIGOL_DP832_IP`, `RIGOL_DP832_PORT`: default instrument address
/// - `RIGOL_DP_TIMEOUT_MS`: connect and reply timeout
/// - `RIGOL_DP_DISCOVERY_NETWORK`, `RIGOL_DP_DISCOVERY_TIMEOUT_MS`
/// - `RIGOL_DP_LOG_LEVEL`, `RIGOL_DP_LOG_FORMAT`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Device overrides
    if let Some(val) = env_value(HOST_ENV) {
        config.device.host = Some(val.trim().to_string());
    }
    if let Some(val) = env_value(PORT_ENV) {
        config.device.port = parse_env(PORT_ENV, &val, "Invalid port number")?;
    }
    let var = format!("{}_TIMEOUT_MS", ENV_PREFIX);
    if let Some(val) = env_value(&var) {
        config.device.timeout_ms = parse_env(&var, &val, "Invalid timeout")?;
    }

    // Discovery overrides
    let var = format!("{}_DISCOVERY_NETWORK", ENV_PREFIX);
    if let Some(val) = env_value(&var) {
        config.discovery.network = Some(val.trim().to_string());
    }
    let var = format!("{}_DISCOVERY_TIMEOUT_MS", ENV_PREFIX);
    if let Some(val) = env_value(&var) {
        config.discovery.probe_timeout_ms = parse_env(&var, &val, "Invalid timeout")?;
    }

    // Logging overrides
    let var = format!("{}_LOG_LEVEL", ENV_PREFIX);
    if let Some(val) = env_value(&var) {
        config.logging.level = val.trim().to_string();
    }
    let var = format!("{}_LOG_FORMAT", ENV_PREFIX);
    if let Some(val) = env_value(&var) {
        config.logging.format = match val.trim().to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => return Err(ConfigError::env_parse(var, "Expected 'pretty' or 'compact'")),
        };
    }

    Ok(())
}

/// Reject values no connection or sweep could work with.
pub fn validate(config: &Config) -> ConfigResult<()> {
    if config.device.port == 0 {
        return Err(ConfigError::validation("device.port", "must not be 0"));
    }
    if config.device.timeout_ms == 0 {
        return Err(ConfigError::validation("device.timeout_ms", "must be greater than 0"));
    }
    if config.discovery.probe_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "discovery.probe_timeout_ms",
            "must be greater than 0",
        ));
    }
    if config.discovery.host_start == 0 || config.discovery.host_start > config.discovery.host_end {
        return Err(ConfigError::validation(
            "discovery.host_start",
            format!(
                "host range {}..={} is empty or starts at 0",
                config.discovery.host_start, config.discovery.host_end
            ),
        ));
    }
    Ok(())
}
