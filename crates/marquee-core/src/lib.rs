//! # marquee-core
//!
//! Shared foundation for the Marquee movie catalog API:
//!
//! - [`config`]: typed, YAML-backed configuration with defaults for every field
//! - [`model`]: users, movies, scoped tokens, identities and listing filters
//! - [`validation`]: the field-error accumulator used by every input check
//! - [`store`]: the persistence boundary traits and an in-memory implementation
//!
//! Nothing here talks to the network or the database directly.

pub mod config;
pub mod model;
pub mod store;
pub mod validation;

pub use config::{AppConfig, ConfigError};
pub use model::{Identity, Movie, MovieDetails, Scope, User, Versioned};
pub use store::{
    MemoryStore, MovieStore, PermissionStore, PoolStatus, StoreDiagnostics, StoreError, TokenStore,
    UserStore, VersionedStore,
};
pub use validation::Validator;
