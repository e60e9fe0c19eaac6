//! Scoped token records.
//!
//! Only the hash of a token plaintext is ever stored. The plaintext itself
//! lives in `marquee_auth::IssuedToken` and is handed to the caller once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The workflow a token is valid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "authentication")]
    Authentication,
    #[serde(rename = "activation")]
    Activation,
    #[serde(rename = "password-reset")]
    PasswordReset,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Authentication => "authentication",
            Scope::Activation => "activation",
            Scope::PasswordReset => "password-reset",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authentication" => Ok(Scope::Authentication),
            "activation" => Ok(Scope::Activation),
            "password-reset" => Ok(Scope::PasswordReset),
            other => Err(format!("unknown token scope '{other}'")),
        }
    }
}

/// SHA-256 digest of a token plaintext; the durable lookup key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenHash([u8; 32]);

impl TokenHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build from a slice read back from storage.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first four bytes are enough to tell records apart in logs.
        write!(f, "TokenHash(")?;
        for b in &self.0[..4] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "..)")
    }
}

/// A persisted token: `{hash, user_id, scope, expiry}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub hash: TokenHash,
    pub user_id: i64,
    pub scope: Scope,
    pub expiry: DateTime<Utc>,
}

impl TokenRecord {
    /// A token is live strictly before its expiry instant.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expiry
    }
}
