//! Domain model shared by every Marquee crate.

pub mod filters;
pub mod movie;
pub mod token;
pub mod user;

pub use filters::{Filters, Metadata, MovieQuery, Sort, SortColumn, SortDirection};
pub use movie::{Movie, MovieDetails, Runtime, RuntimeFormatError};
pub use token::{Scope, TokenHash, TokenRecord};
pub use user::{Identity, NewUser, PasswordHash, User};

/// Read access to the movie catalog.
pub const PERMISSION_MOVIES_READ: &str = "movies:read";

/// Create, update and delete access to the movie catalog.
pub const PERMISSION_MOVIES_WRITE: &str = "movies:write";

/// A persisted entity guarded by an optimistic-concurrency version counter.
///
/// Versions start at 1 on insert and grow by exactly one per accepted update.
pub trait Versioned {
    fn id(&self) -> i64;
    fn version(&self) -> i32;
    fn set_version(&mut self, version: i32);
}
