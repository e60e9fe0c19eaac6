use crate::error::{ApiError, FieldErrors};
use crate::extract::JsonBody;
use crate::mailer::Notification;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use marquee_auth::hash_password_async;
use marquee_control::{AccessDecisionSequencer, Requirement};
use marquee_core::model::{NewUser, Scope, User};
use marquee_core::validation::{
    validate_password_plaintext, validate_registration, validate_token_plaintext,
};
use marquee_core::{Identity, StoreError, Validator};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// `POST /v1/users`
pub async fn register(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    JsonBody(input): JsonBody<RegisterInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state.access().authorize(&identity, Requirement::Public).await?;

    let mut v = Validator::new();
    validate_registration(&mut v, &input.name, &input.email, &input.password);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    let new_user = NewUser {
        password_hash: hash_password_async(input.password).await?,
        name: input.name,
        email: input.email,
        activated: false,
    };
    let user = match state.users().insert_user(&new_user).await {
        Ok(user) => user,
        Err(StoreError::DuplicateEmail) => {
            return Err(ApiError::field(
                "email",
                "a user with this email address already exists",
            ));
        }
        Err(e) => return Err(e.into()),
    };

    state.permissions().grant_defaults(user.id).await?;

    let ttl = state.config().tokens.ttl_for(Scope::Activation);
    let token = state.ledger().issue(user.id, ttl, Scope::Activation).await?;
    state.notify(
        user.email.clone(),
        Notification::Welcome {
            user_id: user.id,
            activation_token: token.plaintext().to_string(),
        },
    );

    tracing::info!(user_id = user.id, "user registered");
    Ok((StatusCode::ACCEPTED, Json(json!({ "user": user }))))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivateInput {
    pub token: String,
}

/// `PUT /v1/users/activated`
pub async fn activate(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    JsonBody(input): JsonBody<ActivateInput>,
) -> Result<Json<Value>, ApiError> {
    state.access().authorize(&identity, Requirement::Public).await?;

    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &input.token);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    let Some(user) = state
        .ledger()
        .resolve(Scope::Activation, &input.token)
        .await?
    else {
        return Err(ApiError::field("token", "invalid or expired activation token"));
    };

    let outcome = state
        .user_guard()
        .compare_and_swap(user.id, user.version, |u: &mut User| {
            u.activated = true;
            Ok::<_, FieldErrors>(())
        })
        .await?;
    let user = AccessDecisionSequencer::settle(outcome)?;

    state.ledger().revoke_all(Scope::Activation, user.id).await?;

    Ok(Json(json!({ "user": user })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResetPasswordInput {
    pub password: String,
    pub token: String,
}

/// `PUT /v1/users/password`
pub async fn reset_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    JsonBody(input): JsonBody<ResetPasswordInput>,
) -> Result<Json<Value>, ApiError> {
    state.access().authorize(&identity, Requirement::Public).await?;

    let mut v = Validator::new();
    validate_password_plaintext(&mut v, &input.password);
    validate_token_plaintext(&mut v, &input.token);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    let Some(user) = state
        .ledger()
        .resolve(Scope::PasswordReset, &input.token)
        .await?
    else {
        return Err(ApiError::field(
            "token",
            "invalid or expired password reset token",
        ));
    };

    let password_hash = hash_password_async(input.password).await?;
    let outcome = state
        .user_guard()
        .compare_and_swap(user.id, user.version, move |u: &mut User| {
            u.password_hash = password_hash;
            Ok::<_, FieldErrors>(())
        })
        .await?;
    let user = AccessDecisionSequencer::settle(outcome)?;

    state.ledger().revoke_all(Scope::PasswordReset, user.id).await?;

    Ok(Json(json!({ "message": "your password was successfully reset" })))
}
