//! Configuration types for the Marquee API server.
//!
//! Configuration is read from a single YAML file. Every section and every
//! field has a default, so an empty file (or no file at all) yields a working
//! development setup apart from the database DSN.
//!
//! ```yaml
//! server:
//!   port: 4000
//!   env: production
//!
//! limiter:
//!   rps: 2.0
//!   burst: 4
//!   sweep_interval: 1m
//!
//! tokens:
//!   activation_ttl: 72h
//! ```

pub mod database;
pub mod duration;
pub mod limiter;
pub mod server;
pub mod tokens;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use database::DatabaseConfig;
pub use limiter::LimiterConfig;
pub use server::{Environment, ServerConfig};
pub use tokens::TokenConfig;

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub limiter: LimiterConfig,

    #[serde(default)]
    pub tokens: TokenConfig,

    #[serde(default)]
    pub permissions: PermissionsConfig,

    #[serde(default)]
    pub mailer: MailerConfig,

    #[serde(default)]
    pub cors: CorsConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limiter.enabled && !(self.limiter.rps > 0.0) {
            return Err(ConfigError::Config(
                "limiter.rps must be positive when the limiter is enabled".to_string(),
            ));
        }
        if self.limiter.enabled && self.limiter.burst == 0 {
            return Err(ConfigError::Config(
                "limiter.burst must be at least 1 when the limiter is enabled".to_string(),
            ));
        }
        if self.limiter.sweep_interval.is_zero() {
            return Err(ConfigError::Config(
                "limiter.sweep_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Permissions granted to every newly registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsConfig {
    #[serde(default = "default_grants")]
    pub default_grants: Vec<String>,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            default_grants: default_grants(),
        }
    }
}

fn default_grants() -> Vec<String> {
    vec![crate::model::PERMISSION_MOVIES_READ.to_string()]
}

/// Outbound notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailerConfig {
    /// From-address stamped on every notification.
    #[serde(default = "default_sender")]
    pub sender: String,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
        }
    }
}

fn default_sender() -> String {
    "Marquee <no-reply@marquee.local>".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Exact origins allowed to make cross-origin requests. Empty disables CORS.
    #[serde(default)]
    pub trusted_origins: Vec<String>,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
