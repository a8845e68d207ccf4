//! Configuration loading and typed config structures for Memestock.
//!
//! The optional `memestock-config.yaml` at the working directory mirrors
//! these structs. Every field has a default, so an absent file or an
//! empty section yields a working market on port 3000 backed by
//! `db.json`.
//!
//! Environment variables override the file:
//!
//! | Variable               | Field               |
//! |------------------------|---------------------|
//! | `PORT`                 | `server.port`       |
//! | `MEMESTOCK_DATA_PATH`  | `market.data_path`  |
//! | `MEMESTOCK_STATIC_DIR` | `server.static_dir` |
//!
//! Overrides are applied separately from parsing. Values that cannot be
//! used come back as [`IgnoredOverride`]s so the caller can log them once
//! logging is up.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::TrendParams;
use crate::runner::RunConfig;

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
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MemestockConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Market file and tick loop settings.
    #[serde(default)]
    pub market: MarketConfig,

    /// Trend state machine tunables.
    #[serde(default)]
    pub trend: TrendParams,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MemestockConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from the process environment.
    #[must_use = "ignored overrides should be reported"]
    pub fn apply_env_overrides(&mut self) -> Vec<IgnoredOverride> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Returns the variables that were set but unusable; their fields
    /// keep the previous value.
    #[must_use = "ignored overrides should be reported"]
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Vec<IgnoredOverride> {
        let mut ignored = Vec::new();
        if let Some(val) = lookup("PORT") {
            match val.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(e) => ignored.push(IgnoredOverride {
                    var: "PORT",
                    reason: e.to_string(),
                    value: val,
                }),
            }
        }
        if let Some(val) = lookup("MEMESTOCK_DATA_PATH") {
            self.market.data_path = PathBuf::from(val);
        }
        if let Some(val) = lookup("MEMESTOCK_STATIC_DIR") {
            self.server.static_dir = PathBuf::from(val);
        }
        ignored
    }
}

/// An environment override that was set but could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredOverride {
    /// The environment variable.
    pub var: &'static str,
    /// Its raw value.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served for paths outside `/api` and `/ws`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// Market file and tick loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MarketConfig {
    /// Market JSON file, read at startup and rewritten on commit.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Real-time milliseconds per tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Persist every N ticks.
    #[serde(default = "default_commit_every_ticks")]
    pub commit_every_ticks: u64,

    /// Seed for reproducible price paths. Unset draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Stop after this many ticks. `0` runs until the process is stopped.
    #[serde(default)]
    pub max_ticks: u64,
}

impl MarketConfig {
    /// Tick loop settings derived from this section.
    pub const fn run_config(&self) -> RunConfig {
        RunConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            commit_every_ticks: self.commit_every_ticks,
            max_ticks: self.max_ticks,
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            tick_interval_ms: default_tick_interval_ms(),
            commit_every_ticks: default_commit_every_ticks(),
            seed: None,
            max_ticks: 0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_path() -> PathBuf {
    PathBuf::from("db.json")
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_commit_every_ticks() -> u64 {
    1
}

fn default_log_level() -> String {
    String::from("info")
}
