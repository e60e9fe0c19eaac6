//! User accounts and request identities.

use super::Versioned;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// An argon2 PHC string. Never serialized, redacted in `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: PasswordHash,
    pub activated: bool,
    #[serde(skip_serializing)]
    pub version: i32,
}

impl Versioned for User {
    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }
}

/// Fields supplied at registration; id, timestamps and version come from the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: PasswordHash,
    pub activated: bool,
}

/// Who is behind a request, resolved once by the identification stage.
#[derive(Debug, Clone, Default)]
pub enum Identity {
    /// No token presented, or the token did not resolve.
    #[default]
    Anonymous,
    User(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::User(user) => Some(user),
        }
    }
}
