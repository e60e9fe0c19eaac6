//! Token lifetime configuration.

use crate::model::Scope;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time-to-live for each token scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_authentication_ttl", with = "super::duration")]
    pub authentication_ttl: Duration,

    #[serde(default = "default_activation_ttl", with = "super::duration")]
    pub activation_ttl: Duration,

    #[serde(default = "default_password_reset_ttl", with = "super::duration")]
    pub password_reset_ttl: Duration,
}

impl TokenConfig {
    /// The configured lifetime for tokens minted with `scope`.
    pub fn ttl_for(&self, scope: Scope) -> Duration {
        match scope {
            Scope::Authentication => self.authentication_ttl,
            Scope::Activation => self.activation_ttl,
            Scope::PasswordReset => self.password_reset_ttl,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            authentication_ttl: default_authentication_ttl(),
            activation_ttl: default_activation_ttl(),
            password_reset_ttl: default_password_reset_ttl(),
        }
    }
}

fn default_authentication_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_activation_ttl() -> Duration {
    Duration::from_secs(72 * 60 * 60)
}

fn default_password_reset_ttl() -> Duration {
    Duration::from_secs(15 * 60)
}
