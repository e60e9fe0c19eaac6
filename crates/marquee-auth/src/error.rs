//! Error types for the auth crate.

use marquee_core::StoreError;
use thiserror::Error;

/// Errors from the token ledger and the permission registry.
///
/// A token that does not resolve is not an error; see
/// [`TokenLedger::resolve`](crate::TokenLedger::resolve).
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backing store failed or timed out.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A token lifetime that cannot be represented as a timestamp offset.
    #[error("token ttl out of range: {0:?}")]
    InvalidTtl(std::time::Duration),
}

/// Errors from password hashing and verification.
///
/// A wrong password is `Ok(false)` from
/// [`verify_password`](crate::password::verify_password), never one of these.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The stored hash is not a parseable PHC string.
    #[error("malformed password hash: {0}")]
    MalformedHash(String),

    /// The hashing backend failed.
    #[error("password hashing failed: {0}")]
    Backend(String),
}
