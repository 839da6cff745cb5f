//! Configuration loading and typed config structures for the Tank Twin.
//!
//! The canonical configuration lives in `tanktwin-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.
//! A missing file is not an error: every field has a default.

use std::path::Path;

use serde::Deserialize;
use tanktwin_types::{ControlConfig, TankConfig};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is outside its allowed domain.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Tank Twin configuration.
///
/// Mirrors the structure of `tanktwin-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TwinConfig {
    /// Physical tank description.
    #[serde(default)]
    pub tank: TankConfig,

    /// Initial controller settings.
    #[serde(default)]
    pub control: ControlConfig,

    /// Loop timing and buffer sizes.
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Network and database settings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TwinConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DATABASE_URL` overrides `infrastructure.postgres_url`
    /// - `TANKTWIN_PORT` overrides `infrastructure.observer_port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load from `path` if it exists, otherwise start from defaults.
    /// Environment overrides and validation apply either way.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        let mut config = Self::default();
        config.infrastructure.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yml yields an error for an empty document.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.infrastructure.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_tank(&self.tank)?;
        self.simulation.validate()?;
        if !self.control.target_level.is_finite() {
            return Err(invalid("control.target_level", "must be a finite number"));
        }
        if !self.control.tolerance.is_finite() || self.control.tolerance < 0.0 {
            return Err(invalid("control.tolerance", "must be a non-negative number"));
        }
        Ok(())
    }
}

/// Validate a tank description.
///
/// Requires `max_capacity > min_capacity >= 0`, positive geometry, and an
/// initial level inside `0..=100`.
pub fn validate_tank(tank: &TankConfig) -> Result<(), ConfigError> {
    if tank.min_capacity.is_nan() || tank.min_capacity < 0.0 {
        return Err(invalid("tank.min_capacity", "must be zero or positive"));
    }
    if !tank.max_capacity.is_finite() || tank.max_capacity <= tank.min_capacity {
        return Err(invalid(
            "tank.max_capacity",
            "must be finite and greater than tank.min_capacity",
        ));
    }
    if !is_positive(tank.diameter) {
        return Err(invalid("tank.diameter", "must be a positive number"));
    }
    if !is_positive(tank.height) {
        return Err(invalid("tank.height", "must be a positive number"));
    }
    if !(0.0..=100.0).contains(&tank.initial_level) {
        return Err(invalid("tank.initial_level", "must be within 0..=100"));
    }
    Ok(())
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_owned(),
    }
}

/// Loop timing, buffer sizes, and concurrency bounds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationSettings {
    /// Wall-clock period between ticks in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Simulated seconds applied by each tick, independent of wall-clock delay.
    #[serde(default = "default_dt_seconds")]
    pub dt_seconds: f64,

    /// Seed for the water-quality drift. `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Start the control loop when the engine boots.
    #[serde(default = "default_true")]
    pub auto_start: bool,

    /// Snapshots kept in the in-memory history ring.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Entries kept in the decision log.
    #[serde(default = "default_decision_log_capacity")]
    pub decision_log_capacity: usize,

    /// Capacity of the live event channel before slow receivers lag.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Upper bound on waiting for the tank lock, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl SimulationSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(invalid("simulation.tick_interval_ms", "must be positive"));
        }
        if !is_positive(self.dt_seconds) {
            return Err(invalid("simulation.dt_seconds", "must be a positive number"));
        }
        if self.history_capacity == 0 {
            return Err(invalid("simulation.history_capacity", "must be positive"));
        }
        if self.decision_log_capacity == 0 {
            return Err(invalid("simulation.decision_log_capacity", "must be positive"));
        }
        if self.event_channel_capacity == 0 {
            return Err(invalid("simulation.event_channel_capacity", "must be positive"));
        }
        if self.lock_timeout_ms == 0 {
            return Err(invalid("simulation.lock_timeout_ms", "must be positive"));
        }
        Ok(())
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            dt_seconds: default_dt_seconds(),
            seed: None,
            auto_start: true,
            history_capacity: default_history_capacity(),
            decision_log_capacity: default_decision_log_capacity(),
            event_channel_capacity: default_event_channel_capacity(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Network and database settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port for the REST and WebSocket API.
    #[serde(default = "default_observer_port")]
    pub observer_port: u16,

    /// `PostgreSQL` connection string. In-memory stores are used when unset.
    #[serde(default)]
    pub postgres_url: Option<String>,
}

impl InfrastructureConfig {
    /// Override infrastructure settings with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DATABASE_URL") {
            if !val.is_empty() {
                self.postgres_url = Some(val);
            }
        }
        if let Ok(val) = std::env::var("TANKTWIN_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.observer_port = port,
                Err(err) => {
                    tracing::warn!(value = %val, error = %err, "Ignoring invalid TANKTWIN_PORT");
                }
            }
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            observer_port: default_observer_port(),
            postgres_url: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_dt_seconds() -> f64 {
    1.0
}

const fn default_history_capacity() -> usize {
    1000
}

const fn default_decision_log_capacity() -> usize {
    100
}

const fn default_event_channel_capacity() -> usize {
    256
}

const fn default_lock_timeout_ms() -> u64 {
    500
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
