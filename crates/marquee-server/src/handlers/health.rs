use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::{Extension, Json};
use marquee_control::Requirement;
use marquee_core::Identity;
use serde_json::{Value, json};

pub async fn healthcheck(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Value>, ApiError> {
    state.access().authorize(&identity, Requirement::Public).await?;

    Ok(Json(json!({
        "status": "available",
        "system_info": {
            "environment": state.config().server.env,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })))
}
