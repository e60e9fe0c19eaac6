//! Error types for the server crate.
//!
//! Every failure leaves the server as `{"error": ...}` with a status derived
//! from the decision code or the error kind.

use axum::Json;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use marquee_auth::{AuthError, CredentialError};
use marquee_control::{DecisionCode, GuardError, Rejection};
use marquee_core::StoreError;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name to message, as produced by [`marquee_core::Validator`].
pub type FieldErrors = BTreeMap<String, String>;

const INTERNAL_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

#[derive(Debug, Error)]
pub enum ApiError {
    /// An access decision or concurrency outcome.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// Malformed request body or parameters.
    #[error("{0}")]
    BadRequest(String),

    #[error("failed validation")]
    Validation(FieldErrors),

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(Method),

    /// Logged when turned into a response; the client sees an opaque message.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// A validation failure on a single field.
    pub fn field(key: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(key.to_string(), message.to_string());
        ApiError::Validation(errors)
    }

    pub fn not_found() -> Self {
        ApiError::Rejected(Rejection::NotFound)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Rejected(rejection) => match rejection.code() {
                DecisionCode::Ok => StatusCode::OK,
                DecisionCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                DecisionCode::Unauthenticated => StatusCode::UNAUTHORIZED,
                DecisionCode::InactiveAccount | DecisionCode::Forbidden => StatusCode::FORBIDDEN,
                DecisionCode::Conflict => StatusCode::CONFLICT,
                DecisionCode::NotFound => StatusCode::NOT_FOUND,
                DecisionCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Internal(err.into())
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        ApiError::Internal(err.into())
    }
}

impl From<GuardError<FieldErrors>> for ApiError {
    fn from(err: GuardError<FieldErrors>) -> Self {
        match err {
            GuardError::Store(e) => e.into(),
            GuardError::Rejected(errors) => ApiError::Validation(errors),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ApiError::Validation(errors) => json!({ "error": errors }),
            // Already logged by the sequencer stage that raised it.
            ApiError::Rejected(Rejection::Fault(_)) => json!({ "error": INTERNAL_MESSAGE }),
            ApiError::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "request failed");
                json!({ "error": INTERNAL_MESSAGE })
            }
            other => json!({ "error": other.to_string() }),
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_control::ControlError;

    #[test]
    fn test_decision_codes_map_to_status() {
        let cases = [
            (Rejection::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (Rejection::Unauthenticated, StatusCode::UNAUTHORIZED),
            (Rejection::InactiveAccount, StatusCode::FORBIDDEN),
            (Rejection::Forbidden, StatusCode::FORBIDDEN),
            (Rejection::Conflict, StatusCode::CONFLICT),
            (Rejection::NotFound, StatusCode::NOT_FOUND),
        ];
        for (rejection, status) in cases {
            assert_eq!(ApiError::from(rejection).status(), status);
        }
    }

    #[test]
    fn test_unauthenticated_carries_challenge() {
        let response = ApiError::from(Rejection::Unauthenticated).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn test_faults_are_opaque() {
        let fault = Rejection::Fault(ControlError::Store(StoreError::backend_msg(
            "connection refused",
        )));
        assert_eq!(
            ApiError::from(fault).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let err = ApiError::from(GuardError::<FieldErrors>::Store(StoreError::Timeout(
            std::time::Duration::from_secs(3),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rejected_mutation_is_validation() {
        let mut errors = FieldErrors::new();
        errors.insert("title".to_string(), "must be provided".to_string());
        let err = ApiError::from(GuardError::Rejected(errors));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
