use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use marquee_control::Requirement;
use marquee_core::Identity;
use serde_json::{Value, json};

/// Process-wide counters: request metrics, background work, pool usage.
pub async fn vars(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Value>, ApiError> {
    state.access().authorize(&identity, Requirement::Public).await?;

    Ok(Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().timestamp(),
        "tasks_in_flight": state.tasks().in_flight(),
        "limiter_clients": state.access().limiter().tracked_clients(),
        "database": state.diagnostics().pool_status(),
        "metrics": state.metrics().snapshot(),
    })))
}

/// The same request counters in the Prometheus text format.
pub async fn metrics(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    state.access().authorize(&identity, Requirement::Public).await?;

    let body = state.metrics().render_text()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
