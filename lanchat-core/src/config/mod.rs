//! Configuration for lanchat
//!
//! Defaults match the classic behaviour (port 6969, "Anonymous"). Values can come from a TOML
//! file or from `LANCHAT_<SECTION>_<KEY>` environment variables; both paths end in `validate`.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::core_net::DEFAULT_BACKLOG;
use crate::logging::LogLevel;

mod error;

pub use error::ConfigError;

/// Port every host listens on
pub const DEFAULT_PORT: u16 = 6969;

/// Display name used when none is given
pub const DEFAULT_NAME: &str = "Anonymous";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub identity: IdentityConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Port the host's listener binds on all interfaces
    pub listen_port: u16,

    pub listen_backlog: u32,

    /// Upper bound on one relay readiness wait
    #[serde(with = "humantime_serde")]
    pub relay_poll_timeout: Duration,

    /// Pause after an iteration where nothing was ready
    #[serde(with = "humantime_serde")]
    pub idle_backoff: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub default_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub json_format: bool,
    pub with_timestamp: bool,
    pub with_target: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_PORT,
            listen_backlog: DEFAULT_BACKLOG,
            relay_poll_timeout: Duration::from_millis(10),
            idle_backoff: Duration::from_millis(10),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            default_name: DEFAULT_NAME.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Variables follow the pattern `LANCHAT_<SECTION>_<KEY>`, e.g.
    /// `LANCHAT_NETWORK_LISTEN_PORT=7000` or `LANCHAT_NETWORK_IDLE_BACKOFF=25ms`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("LANCHAT_NETWORK_LISTEN_PORT") {
            config.network.listen_port = parse_value("LANCHAT_NETWORK_LISTEN_PORT", &v)?;
        }
        if let Some(v) = lookup("LANCHAT_NETWORK_LISTEN_BACKLOG") {
            config.network.listen_backlog = parse_value("LANCHAT_NETWORK_LISTEN_BACKLOG", &v)?;
        }
        if let Some(v) = lookup("LANCHAT_NETWORK_RELAY_POLL_TIMEOUT") {
            config.network.relay_poll_timeout = parse_duration("LANCHAT_NETWORK_RELAY_POLL_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("LANCHAT_NETWORK_IDLE_BACKOFF") {
            config.network.idle_backoff = parse_duration("LANCHAT_NETWORK_IDLE_BACKOFF", &v)?;
        }

        if let Some(v) = lookup("LANCHAT_IDENTITY_DEFAULT_NAME") {
            config.identity.default_name = v;
        }

        if let Some(v) = lookup("LANCHAT_LOGGING_LEVEL") {
            config.logging.level = parse_value("LANCHAT_LOGGING_LEVEL", &v)?;
        }
        if let Some(v) = lookup("LANCHAT_LOGGING_JSON_FORMAT") {
            config.logging.json_format = parse_value("LANCHAT_LOGGING_JSON_FORMAT", &v)?;
        }
        if let Some(v) = lookup("LANCHAT_LOGGING_WITH_TIMESTAMP") {
            config.logging.with_timestamp = parse_value("LANCHAT_LOGGING_WITH_TIMESTAMP", &v)?;
        }
        if let Some(v) = lookup("LANCHAT_LOGGING_WITH_TARGET") {
            config.logging.with_target = parse_value("LANCHAT_LOGGING_WITH_TARGET", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.listen_backlog == 0 {
            return Err(ConfigError::Invalid(
                "listen_backlog must be greater than 0".to_string(),
            ));
        }

        if self.network.relay_poll_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "relay_poll_timeout must be greater than 0".to_string(),
            ));
        }

        if self.network.idle_backoff.is_zero() {
            return Err(ConfigError::Invalid(
                "idle_backoff must be greater than 0".to_string(),
            ));
        }

        if self.identity.default_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn parse_duration(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime_serde::re::humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
