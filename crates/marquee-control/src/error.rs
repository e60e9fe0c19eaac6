//! Error types for the control plane.

use marquee_auth::AuthError;
use marquee_core::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors from the rate limiter.
#[derive(Debug, Error)]
pub enum LimiterError {
    /// The client key is neither `ip:port` nor a bare IP address.
    #[error("malformed client address '{0}'")]
    MalformedAddress(String),

    /// A thread panicked while holding the client map.
    #[error("limiter state lock poisoned")]
    Poisoned,
}

/// Internal faults raised anywhere in the access decision pipeline.
///
/// These never reach a client verbatim.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("limiter: {0}")]
    Limiter(#[from] LimiterError),

    #[error("auth: {0}")]
    Auth(#[from] AuthError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    /// Background work was still running when the shutdown bound elapsed.
    #[error("{pending} background task(s) still running after {timeout:?}")]
    ShutdownTimedOut { pending: usize, timeout: Duration },
}
