//! # marquee-auth
//!
//! Identity primitives for the Marquee API.
//!
//! This crate provides:
//! - The token ledger: issuing, resolving and revoking scoped bearer tokens
//! - Password credentials: argon2 hashing and verification
//! - The permission registry: per-user capability codes, deny by default
//!
//! ## Token scopes
//!
//! | Scope | Minted by | Default lifetime | Revoked when |
//! |-------|-----------|------------------|--------------|
//! | `authentication` | `POST /v1/tokens/authentication` | 60 min | expiry |
//! | `activation` | registration, `POST /v1/tokens/activation` | 72 h | account activated |
//! | `password-reset` | `POST /v1/tokens/password-reset` | 15 min | password changed |
//!
//! Tokens are opaque: 16 random bytes, base32 encoded. Only their SHA-256
//! digest is stored.

pub mod error;
pub mod password;
pub mod permissions;
pub mod tokens;

pub use error::{AuthError, CredentialError};
pub use password::{
    hash_password, hash_password_async, verify_password, verify_password_async,
};
pub use permissions::{PermissionRegistry, PermissionSet};
pub use tokens::{IssuedToken, TokenLedger, hash_plaintext};
