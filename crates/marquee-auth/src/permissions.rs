//! Permission codes and the registry that resolves them per user.

use crate::error::AuthError;
use marquee_core::store::PermissionStore;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Capability codes held by one user. Absent means denied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    /// Exact, case-sensitive match.
    pub fn includes(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Looks up and grants permissions. Nothing is cached between calls.
#[derive(Clone)]
pub struct PermissionRegistry {
    store: Arc<dyn PermissionStore>,
    default_grants: Vec<String>,
}

impl PermissionRegistry {
    pub fn new(store: Arc<dyn PermissionStore>, default_grants: Vec<String>) -> Self {
        Self {
            store,
            default_grants,
        }
    }

    /// The current permission set for `user_id`.
    ///
    /// A store failure is returned as an error, never as an empty set.
    pub async fn permissions_for(&self, user_id: i64) -> Result<PermissionSet, AuthError> {
        let codes = self.store.permissions_for_user(user_id).await?;
        Ok(codes.into_iter().collect())
    }

    pub async fn grant(&self, user_id: i64, codes: &[String]) -> Result<(), AuthError> {
        self.store.grant_permissions(user_id, codes).await?;
        tracing::debug!(user_id, ?codes, "granted permissions");
        Ok(())
    }

    /// Grant the configured set every new account starts with.
    pub async fn grant_defaults(&self, user_id: i64) -> Result<(), AuthError> {
        if self.default_grants.is_empty() {
            return Ok(());
        }
        self.grant(user_id, &self.default_grants).await
    }
}
