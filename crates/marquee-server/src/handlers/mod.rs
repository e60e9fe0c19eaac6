//! Route handlers. Each one asks the access sequencer to authorize the
//! caller before it touches any data.

pub mod debug;
pub mod health;
pub mod movies;
pub mod tokens;
pub mod users;

use crate::error::ApiError;
use axum::http::Method;

pub async fn not_found() -> ApiError {
    ApiError::not_found()
}

pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}
