//! Configuration — `ufwguard.toml` parsing and runtime settings.
//!
//! [`UfwGuardConfig`] is the top-level structure for the daemon's
//! configuration file.
//!
//! # Loading precedence
//! 1. CLI arguments (highest)
//! 2. Environment variables (`UFWGUARD_DOCKER_SOCKET=/run/docker.sock` form)
//! 3. Config file (`ufwguard.toml`)
//! 4. Defaults (`Default` impl)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), ufwguard_core::error::UfwGuardError> {
//! use ufwguard_core::config::UfwGuardConfig;
//!
//! // Load from file + apply env overrides
//! let config = UfwGuardConfig::load("ufwguard.toml").await?;
//!
//! // Or parse a TOML string directly
//! let config = UfwGuardConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, UfwGuardError};

/// Upper bounds for sanity checks.
const MAX_RECONNECT_DELAY_SECS: u64 = 300;
const MAX_COMMAND_TIMEOUT_SECS: u64 = 120;

/// Top-level ufwguard configuration.
///
/// Represents the full `ufwguard.toml` file; each component reads only its
/// own section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UfwGuardConfig {
    /// General settings (logging)
    #[serde(default)]
    pub general: GeneralConfig,
    /// Docker collaborator settings
    #[serde(default)]
    pub docker: DockerConfig,
    /// UFW control-plane settings
    #[serde(default)]
    pub ufw: UfwConfig,
}

impl UfwGuardConfig {
    /// Loads configuration from a TOML file and applies env-var overrides.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, UfwGuardError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file (no env-var overrides).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, UfwGuardError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                UfwGuardError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                UfwGuardError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, UfwGuardError> {
        toml::from_str(toml_str).map_err(|e| {
            UfwGuardError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Applies environment-variable overrides.
    ///
    /// Naming rule: `UFWGUARD_{SECTION}_{FIELD}`, e.g.
    /// `UFWGUARD_GENERAL_LOG_LEVEL=debug`.
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "UFWGUARD_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "UFWGUARD_GENERAL_LOG_FORMAT");

        override_string(&mut self.docker.socket, "UFWGUARD_DOCKER_SOCKET");
        override_u64(
            &mut self.docker.reconnect_delay_secs,
            "UFWGUARD_DOCKER_RECONNECT_DELAY_SECS",
        );

        override_bool(&mut self.ufw.use_sudo, "UFWGUARD_UFW_USE_SUDO");
        override_u64(
            &mut self.ufw.command_timeout_secs,
            "UFWGUARD_UFW_COMMAND_TIMEOUT_SECS",
        );
        override_bool(&mut self.ufw.sync_on_start, "UFWGUARD_UFW_SYNC_ON_START");
    }

    /// Validates configuration values.
    pub fn validate(&self) -> Result<(), UfwGuardError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.docker.socket.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "docker.socket".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.docker.reconnect_delay_secs == 0
            || self.docker.reconnect_delay_secs > MAX_RECONNECT_DELAY_SECS
        {
            return Err(ConfigError::InvalidValue {
                field: "docker.reconnect_delay_secs".to_owned(),
                reason: format!("must be 1-{MAX_RECONNECT_DELAY_SECS}"),
            }
            .into());
        }

        if self.ufw.command_timeout_secs == 0
            || self.ufw.command_timeout_secs > MAX_COMMAND_TIMEOUT_SECS
        {
            return Err(ConfigError::InvalidValue {
                field: "ufw.command_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_COMMAND_TIMEOUT_SECS}"),
            }
            .into());
        }

        Ok(())
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log format (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// Docker collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Docker socket path
    pub socket: String,
    /// Delay before reconnecting after an event-stream error (seconds)
    pub reconnect_delay_secs: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: "/var/run/docker.sock".to_owned(),
            reconnect_delay_secs: 5,
        }
    }
}

/// UFW control-plane settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UfwConfig {
    /// Invoke ufw through sudo
    pub use_sudo: bool,
    /// Per-invocation timeout (seconds)
    pub command_timeout_secs: u64,
    /// Reconcile already-running managed containers at daemon start
    pub sync_on_start: bool,
}

impl Default for UfwConfig {
    fn default() -> Self {
        Self {
            use_sudo: true,
            command_timeout_secs: 10,
            sync_on_start: true,
        }
    }
}

// --- env override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
