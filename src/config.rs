//! Crate configuration: leak tracking and the timer pump.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: fields set on [`DisposeConfig`] after loading
//! 2. **Environment variables**: values from `DISPOSABLES_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: built-in defaults from [`DisposeConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `DISPOSABLES_TRACK_LEAKS` | `bool` | `leak_tracking.enabled` |
//! | `DISPOSABLES_LEAK_CHECK_DELAY_MS` | `u64` | `leak_tracking.check_delay` |
//! | `DISPOSABLES_LEAK_BACKTRACE` | `bool` | `leak_tracking.capture_backtrace` |
//! | `DISPOSABLES_TIMER_TICK_MS` | `u64` | `timer_tick` |
//!
//! Leak tracking is meant to be switched on once at process start, typically
//! through `DISPOSABLES_TRACK_LEAKS=1` and
//! [`leak::install_from_config`](crate::leak::install_from_config).

use crate::leak::LeakTrackingConfig;
use std::time::Duration;

/// Environment variable name for the leak tracking toggle.
pub const ENV_TRACK_LEAKS: &str = "DISPOSABLES_TRACK_LEAKS";
/// Environment variable name for the leak check delay in milliseconds.
pub const ENV_LEAK_CHECK_DELAY_MS: &str = "DISPOSABLES_LEAK_CHECK_DELAY_MS";
/// Environment variable name for creation backtrace capture.
pub const ENV_LEAK_BACKTRACE: &str = "DISPOSABLES_LEAK_BACKTRACE";
/// Environment variable name for the timer pump tick in milliseconds.
pub const ENV_TIMER_TICK_MS: &str = "DISPOSABLES_TIMER_TICK_MS";

/// Default interval between two passes of the timer pump.
pub const DEFAULT_TIMER_TICK: Duration = Duration::from_millis(100);

/// Error produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable is set to a value that does not parse.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// What was expected.
        expected: &'static str,
    },
    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A config file is not valid TOML for this schema.
    #[error("failed to parse TOML config: {0}")]
    Parse(String),
}

/// Configuration for the crate's process-wide facilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposeConfig {
    /// Leak tracker settings.
    pub leak_tracking: LeakTrackingConfig,
    /// Interval of the timer pump started by
    /// [`install_from_config`](crate::leak::install_from_config).
    pub timer_tick: Duration,
}

impl Default for DisposeConfig {
    fn default() -> Self {
        Self {
            leak_tracking: LeakTrackingConfig::default(),
            timer_tick: DEFAULT_TIMER_TICK,
        }
    }
}

impl DisposeConfig {
    /// Defaults overridden by the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Defaults overridden by the TOML file at `path`, then by the
    /// environment.
    #[cfg(feature = "config-file")]
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_toml_config(&mut config, &parse_toml_file(path)?);
        apply_env_overrides(&mut config)?;
        Ok(config)
    }
}

/// Apply environment variable overrides to a [`DisposeConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut DisposeConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_TRACK_LEAKS) {
        config.leak_tracking.enabled = parse_bool(ENV_TRACK_LEAKS, &val)?;
    }
    if let Some(val) = read_env(ENV_LEAK_CHECK_DELAY_MS) {
        config.leak_tracking.check_delay =
            Duration::from_millis(parse_u64(ENV_LEAK_CHECK_DELAY_MS, &val)?);
    }
    if let Some(val) = read_env(ENV_LEAK_BACKTRACE) {
        config.leak_tracking.capture_backtrace = parse_bool(ENV_LEAK_BACKTRACE, &val)?;
    }
    if let Some(val) = read_env(ENV_TIMER_TICK_MS) {
        config.timer_tick = Duration::from_millis(parse_u64(ENV_TIMER_TICK_MS, &val)?);
    }
    Ok(())
}

/// Read an environment variable, returning `None` if unset.
fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_u64(var: &'static str, val: &str) -> Result<u64, ConfigError> {
    val.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: val.to_string(),
        expected: "unsigned integer",
    })
}

fn parse_bool(var: &'static str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: val.to_string(),
            expected: "bool (true/false/1/0/yes/no)",
        }),
    }
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable configuration.
///
/// ```toml
/// [leak_tracking]
/// enabled = true
/// check_delay_ms = 3000
/// capture_backtrace = false
///
/// [timer]
/// tick_ms = 100
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct DisposeTomlConfig {
    /// Leak tracking settings.
    #[serde(default)]
    pub leak_tracking: LeakTrackingToml,
    /// Timer pump settings.
    #[serde(default)]
    pub timer: TimerToml,
}

/// Leak tracking section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct LeakTrackingToml {
    /// Enable leak tracking.
    pub enabled: Option<bool>,
    /// Delay before an unreleased disposable is reported.
    pub check_delay_ms: Option<u64>,
    /// Capture creation backtraces.
    pub capture_backtrace: Option<bool>,
}

/// Timer section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct TimerToml {
    /// Pump interval.
    pub tick_ms: Option<u64>,
}

/// Apply a parsed TOML config to a [`DisposeConfig`].
///
/// Only fields that are `Some` in the TOML struct override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut DisposeConfig, toml: &DisposeTomlConfig) {
    if let Some(v) = toml.leak_tracking.enabled {
        config.leak_tracking.enabled = v;
    }
    if let Some(v) = toml.leak_tracking.check_delay_ms {
        config.leak_tracking.check_delay = Duration::from_millis(v);
    }
    if let Some(v) = toml.leak_tracking.capture_backtrace {
        config.leak_tracking.capture_backtrace = v;
    }
    if let Some(v) = toml.timer.tick_ms {
        config.timer_tick = Duration::from_millis(v);
    }
}

/// Parse a TOML string into a [`DisposeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<DisposeTomlConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Read and parse a TOML file into a [`DisposeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<DisposeTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_toml_str(&content)
}

// =========================================================================
// Tests
// =========================================================================
