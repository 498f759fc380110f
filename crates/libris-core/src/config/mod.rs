//! Configuration loading and validation.
//!
//! JSON5 format, camelCase keys.
//! Config location: `~/.libris/libris.json` (or `$LIBRIS_STATE_DIR/libris.json`).

mod auth;

pub use auth::{AuthConfig, AuthConfigBuilder, MAX_TOKEN_TTL_MINUTES};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::{Permission, PermissionMatrix, Role};
use crate::token::{MIN_SECRET_LEN, SigningKey};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Optional replacement for the built-in role table, keyed by role name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<BTreeMap<String, Vec<String>>>,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("libris.json")
    }

    /// Get the Libris state directory.
    ///
    /// Uses `LIBRIS_STATE_DIR` env var if set, otherwise `~/.libris`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("LIBRIS_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".libris")
        } else {
            PathBuf::from(".libris")
        }
    }

    /// Directory holding the account database.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.server
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("data"))
    }

    /// Apply `LIBRIS_*` environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Recognised keys: `LIBRIS_SECRET_KEY`, `LIBRIS_TOKEN_TTL_MINUTES`,
    /// `LIBRIS_PORT`, `LIBRIS_BIND`, `LIBRIS_DATA_DIR`.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(secret) = lookup("LIBRIS_SECRET_KEY") {
            self.auth.secret_key = Some(secret);
        }

        if let Some(ttl) = lookup("LIBRIS_TOKEN_TTL_MINUTES") {
            match ttl.parse() {
                Ok(minutes) => self.auth.token_ttl_minutes = minutes,
                Err(e) => tracing::warn!(value = %ttl, "Ignoring LIBRIS_TOKEN_TTL_MINUTES: {e}"),
            }
        }

        if let Some(port) = lookup("LIBRIS_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!(value = %port, "Ignoring LIBRIS_PORT: {e}"),
            }
        }

        if let Some(bind) = lookup("LIBRIS_BIND") {
            self.server.bind = bind;
        }

        if let Some(dir) = lookup("LIBRIS_DATA_DIR") {
            self.server.data_dir = Some(PathBuf::from(dir));
        }

        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "Server port cannot be 0".to_string(),
            ));
        }

        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&self.auth.token_ttl_minutes) {
            return Err(ConfigError::Validation(format!(
                "Token TTL must be between 1 and {MAX_TOKEN_TTL_MINUTES} minutes"
            )));
        }

        if let Some(secret) = &self.auth.secret_key {
            let key = SigningKey::parse(secret)
                .map_err(|e| ConfigError::Validation(format!("Secret key is not valid hex: {e}")))?;
            if key.len() < MIN_SECRET_LEN {
                return Err(ConfigError::Validation(format!(
                    "Secret key must be at least {MIN_SECRET_LEN} bytes"
                )));
            }
        }

        if self.auth.cookie_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Cookie name cannot be empty".to_string(),
            ));
        }

        self.permission_matrix()?;
        Ok(())
    }

    /// The role table: the configured override, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns error if the override names unknown roles or permissions, or
    /// breaks the role hierarchy.
    pub fn permission_matrix(&self) -> Result<PermissionMatrix, ConfigError> {
        let Some(grants) = &self.permissions else {
            return Ok(PermissionMatrix::standard());
        };

        let mut parsed = Vec::with_capacity(grants.len());
        for (role, perms) in grants {
            let role: Role = role
                .parse()
                .map_err(|e| ConfigError::Validation(format!("permissions: {e}")))?;
            let perms = perms
                .iter()
                .map(|p| p.parse::<Permission>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ConfigError::Validation(format!("permissions.{role}: {e}")))?;
            parsed.push((role, perms));
        }

        PermissionMatrix::from_grants(parsed)
            .map_err(|e| ConfigError::Validation(format!("permissions: {e}")))
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Enable permissive CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Account database directory. Defaults to `<state dir>/data`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            cors: true,
            data_dir: None,
        }
    }
}

const fn default_port() -> u16 {
    8000
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

const fn default_true() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Default filter directive (overridden by `RUST_LOG`).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}
