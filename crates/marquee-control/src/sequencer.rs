//! The per-request access decision: admit, identify, authorize, and settle
//! the outcome of a guarded mutation.
//!
//! Each stage either passes or short-circuits with one [`Rejection`], which
//! maps to exactly one [`DecisionCode`]. Internal faults are logged here, with
//! the stage that raised them, before they become an opaque rejection.

use crate::concurrency::CasOutcome;
use crate::error::ControlError;
use crate::limiter::RateLimiter;
use marquee_auth::{PermissionRegistry, TokenLedger};
use marquee_core::model::{Identity, Scope, User};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// What an operation demands of the caller's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Anyone, including anonymous callers.
    Public,
    /// An activated user holding this permission code.
    Permission(&'static str),
}

/// Outward decision codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionCode {
    Ok,
    RateLimited,
    Unauthenticated,
    InactiveAccount,
    Forbidden,
    Conflict,
    NotFound,
    InternalError,
}

impl DecisionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionCode::Ok => "OK",
            DecisionCode::RateLimited => "RATE_LIMITED",
            DecisionCode::Unauthenticated => "UNAUTHENTICATED",
            DecisionCode::InactiveAccount => "INACTIVE_ACCOUNT",
            DecisionCode::Forbidden => "FORBIDDEN",
            DecisionCode::Conflict => "CONFLICT",
            DecisionCode::NotFound => "NOT_FOUND",
            DecisionCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for DecisionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request was stopped.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("you must be authenticated to access this resource")]
    Unauthenticated,

    #[error("your user account must be activated to access this resource")]
    InactiveAccount,

    #[error("your user account doesn't have the necessary permissions to access this resource")]
    Forbidden,

    #[error("unable to update the record due to an edit conflict, please try again")]
    Conflict,

    #[error("the requested resource could not be found")]
    NotFound,

    /// Already logged where it was raised.
    #[error("internal fault: {0}")]
    Fault(#[from] ControlError),
}

impl Rejection {
    pub fn code(&self) -> DecisionCode {
        match self {
            Rejection::RateLimited => DecisionCode::RateLimited,
            Rejection::Unauthenticated => DecisionCode::Unauthenticated,
            Rejection::InactiveAccount => DecisionCode::InactiveAccount,
            Rejection::Forbidden => DecisionCode::Forbidden,
            Rejection::Conflict => DecisionCode::Conflict,
            Rejection::NotFound => DecisionCode::NotFound,
            Rejection::Fault(_) => DecisionCode::InternalError,
        }
    }
}

#[derive(Clone)]
pub struct AccessDecisionSequencer {
    limiter: Arc<RateLimiter>,
    ledger: TokenLedger,
    permissions: PermissionRegistry,
}

impl AccessDecisionSequencer {
    pub fn new(
        limiter: Arc<RateLimiter>,
        ledger: TokenLedger,
        permissions: PermissionRegistry,
    ) -> Self {
        Self {
            limiter,
            ledger,
            permissions,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Stage 1: admission, keyed by the client's `ip:port` or bare IP.
    pub fn admit(&self, client_addr: &str) -> Result<(), Rejection> {
        match self.limiter.admit(client_addr) {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::debug!(client = client_addr, "rate limited");
                Err(Rejection::RateLimited)
            }
            Err(e) => Err(fault("admit", e.into())),
        }
    }

    /// Stage 2: resolve a bearer token to an identity.
    ///
    /// No token, or one that does not resolve, is `Anonymous`. Only a store
    /// failure rejects.
    pub async fn identify(&self, bearer: Option<&str>) -> Result<Identity, Rejection> {
        let Some(token) = bearer else {
            return Ok(Identity::Anonymous);
        };
        match self.ledger.resolve(Scope::Authentication, token).await {
            Ok(Some(user)) => Ok(Identity::User(user)),
            Ok(None) => Ok(Identity::Anonymous),
            Err(e) => Err(fault("identify", e.into())),
        }
    }

    /// Stage 3: check `identity` against `requirement`.
    ///
    /// Anonymous and unactivated callers are turned away before the
    /// permission registry is consulted.
    pub async fn authorize(
        &self,
        identity: &Identity,
        requirement: Requirement,
    ) -> Result<(), Rejection> {
        let Requirement::Permission(code) = requirement else {
            return Ok(());
        };

        let user = require_user(identity)?;
        if !user.activated {
            return Err(Rejection::InactiveAccount);
        }

        let granted = self
            .permissions
            .permissions_for(user.id)
            .await
            .map_err(|e| fault("authorize", e.into()))?;
        if granted.includes(code) {
            Ok(())
        } else {
            tracing::debug!(user_id = user.id, permission = code, "permission denied");
            Err(Rejection::Forbidden)
        }
    }

    /// Admit, identify and authorize in order, stopping at the first failure.
    pub async fn evaluate(
        &self,
        client_addr: &str,
        bearer: Option<&str>,
        requirement: Requirement,
    ) -> Result<Identity, Rejection> {
        self.admit(client_addr)?;
        let identity = self.identify(bearer).await?;
        self.authorize(&identity, requirement).await?;
        Ok(identity)
    }

    /// Stage 4: map a compare-and-swap outcome onto the decision codes.
    pub fn settle<R>(outcome: CasOutcome<R>) -> Result<R, Rejection> {
        match outcome {
            CasOutcome::Committed(record) => Ok(record),
            CasOutcome::Conflict => Err(Rejection::Conflict),
            CasOutcome::NotFound => Err(Rejection::NotFound),
        }
    }
}

fn require_user(identity: &Identity) -> Result<&User, Rejection> {
    match identity {
        Identity::Anonymous => Err(Rejection::Unauthenticated),
        Identity::User(user) => Ok(user),
    }
}

fn fault(stage: &'static str, err: ControlError) -> Rejection {
    tracing::error!(stage, error = %err, "access decision fault");
    Rejection::Fault(err)
}
