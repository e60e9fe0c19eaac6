//! The persistence boundary.
//!
//! Every store the control plane depends on is a trait here, with exactly the
//! operations the core issues. `marquee-store-pg` implements them on Postgres;
//! [`MemoryStore`] implements them in process for tests and local runs.

pub mod memory;

pub use memory::MemoryStore;

use crate::model::{
    Metadata, Movie, MovieDetails, MovieQuery, NewUser, Scope, TokenHash, TokenRecord, User,
    Versioned,
};
use async_trait::async_trait;
use std::time::Duration;

/// Errors surfaced by any store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The statement did not complete within the configured bound.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// A user with this email address already exists.
    #[error("duplicate email")]
    DuplicateEmail,

    /// Connectivity, constraint or driver failure.
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(err))
    }

    pub fn backend_msg(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        StoreError::Backend(msg.into())
    }
}

/// Token records keyed by hash.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_token(&self, record: &TokenRecord) -> Result<(), StoreError>;

    /// The record with this hash and scope, expired or not.
    async fn find_token(
        &self,
        hash: &TokenHash,
        scope: Scope,
    ) -> Result<Option<TokenRecord>, StoreError>;

    /// Delete every token of `scope` owned by `user_id`; returns how many went.
    async fn delete_tokens_for_user(&self, scope: Scope, user_id: i64) -> Result<u64, StoreError>;
}

/// The user -> permission code relation.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn permissions_for_user(&self, user_id: i64) -> Result<Vec<String>, StoreError>;

    /// Grant codes to a user. Unknown codes are ignored, repeats are harmless.
    async fn grant_permissions(&self, user_id: i64, codes: &[String]) -> Result<(), StoreError>;
}

/// Read and compare-and-write primitives for a versioned record type.
#[async_trait]
pub trait VersionedStore<R>: Send + Sync
where
    R: Versioned + Send + Sync + 'static,
{
    async fn get(&self, id: i64) -> Result<Option<R>, StoreError>;

    /// Persist `record` only if the stored version still equals
    /// `expected_version`, bumping it by one in the same write.
    ///
    /// `None` means no row matched: gone or stale, the store cannot tell.
    async fn conditional_update(
        &self,
        record: &R,
        expected_version: i32,
    ) -> Result<Option<i32>, StoreError>;
}

#[async_trait]
pub trait UserStore: VersionedStore<User> {
    /// Insert a new account at version 1.
    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait MovieStore: VersionedStore<Movie> {
    /// Insert a new movie at version 1.
    async fn insert_movie(&self, details: &MovieDetails) -> Result<Movie, StoreError>;

    /// Returns false when no movie had this id.
    async fn delete_movie(&self, id: i64) -> Result<bool, StoreError>;

    async fn list_movies(&self, query: &MovieQuery) -> Result<(Vec<Movie>, Metadata), StoreError>;
}

/// Connection pool counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStatus {
    pub max_open_connections: u32,
    pub open_connections: u32,
    pub idle: usize,
    pub in_use: u32,
}

/// Runtime details a store may report for the diagnostics endpoint.
pub trait StoreDiagnostics: Send + Sync {
    /// `None` when the store has no connection pool.
    fn pool_status(&self) -> Option<PoolStatus> {
        None
    }
}
