use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::mailer::Notification;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use marquee_auth::verify_password_async;
use marquee_control::Requirement;
use marquee_core::model::{Scope, User};
use marquee_core::validation::{validate_email, validate_password_plaintext};
use marquee_core::{Identity, Validator};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailInput {
    pub email: String,
}

/// `POST /v1/tokens/authentication`
pub async fn create_authentication_token(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    JsonBody(input): JsonBody<CredentialsInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state.access().authorize(&identity, Requirement::Public).await?;

    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    let Some(user) = state.users().get_user_by_email(&input.email).await? else {
        return Err(ApiError::InvalidCredentials);
    };
    let matches = verify_password_async(input.password, user.password_hash.clone()).await?;
    if !matches {
        return Err(ApiError::InvalidCredentials);
    }

    let ttl = state.config().tokens.ttl_for(Scope::Authentication);
    let token = state
        .ledger()
        .issue(user.id, ttl, Scope::Authentication)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "authentication_token": {
                "token": token.plaintext(),
                "expiry": token.expiry,
            }
        })),
    ))
}

/// `POST /v1/tokens/activation`
pub async fn create_activation_token(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    JsonBody(input): JsonBody<EmailInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state.access().authorize(&identity, Requirement::Public).await?;

    let user = known_user(&state, &input.email).await?;
    if user.activated {
        return Err(ApiError::field("email", "user has already been activated"));
    }

    let ttl = state.config().tokens.ttl_for(Scope::Activation);
    let token = state.ledger().issue(user.id, ttl, Scope::Activation).await?;
    state.notify(
        user.email,
        Notification::Activation {
            activation_token: token.plaintext().to_string(),
        },
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "an email will be sent to you containing activation instructions"
        })),
    ))
}

/// `POST /v1/tokens/password-reset`
pub async fn create_password_reset_token(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    JsonBody(input): JsonBody<EmailInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state.access().authorize(&identity, Requirement::Public).await?;

    let user = known_user(&state, &input.email).await?;
    if !user.activated {
        return Err(ApiError::field("email", "user account must be activated"));
    }

    let ttl = state.config().tokens.ttl_for(Scope::PasswordReset);
    let token = state
        .ledger()
        .issue(user.id, ttl, Scope::PasswordReset)
        .await?;
    state.notify(
        user.email,
        Notification::PasswordReset {
            reset_token: token.plaintext().to_string(),
        },
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "an email will be sent to you containing password reset instructions"
        })),
    ))
}

/// Validate `email` and look up its owner; unknown addresses are a field error.
async fn known_user(state: &AppState, email: &str) -> Result<User, ApiError> {
    let mut v = Validator::new();
    validate_email(&mut v, email);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    state
        .users()
        .get_user_by_email(email)
        .await?
        .ok_or_else(|| ApiError::field("email", "no matching email address found"))
}
