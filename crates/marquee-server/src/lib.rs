//! # marquee-server
//!
//! The Marquee HTTP API: JSON over axum in front of the control plane.
//!
//! Every request passes, outermost first: panic recovery, request metrics,
//! tracing, CORS and the access gate (rate limit by peer IP, then bearer
//! token to [`Identity`](marquee_core::Identity)). Handlers then authorize
//! against their own requirement.
//!
//! | Route | Requirement |
//! |-------|-------------|
//! | `GET /v1/healthcheck` | public |
//! | `GET /debug/vars`, `GET /debug/metrics` | public |
//! | `POST /v1/users`, `PUT /v1/users/activated`, `PUT /v1/users/password` | public |
//! | `POST /v1/tokens/{authentication,activation,password-reset}` | public |
//! | `GET /v1/movies`, `GET /v1/movies/{id}` | `movies:read` |
//! | `POST`, `PATCH`, `DELETE` on movies | `movies:write` |

pub mod cli;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod mailer;
pub mod middleware;
pub mod state;

pub use error::ApiError;
pub use mailer::{LogMailer, Mailer, Notification};
pub use state::AppState;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router over `state`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/v1/healthcheck", get(handlers::health::healthcheck))
        .route("/debug/vars", get(handlers::debug::vars))
        .route("/debug/metrics", get(handlers::debug::metrics))
        .route("/v1/users", post(handlers::users::register))
        .route("/v1/users/activated", put(handlers::users::activate))
        .route("/v1/users/password", put(handlers::users::reset_password))
        .route(
            "/v1/tokens/authentication",
            post(handlers::tokens::create_authentication_token),
        )
        .route(
            "/v1/tokens/activation",
            post(handlers::tokens::create_activation_token),
        )
        .route(
            "/v1/tokens/password-reset",
            post(handlers::tokens::create_password_reset_token),
        )
        .route(
            "/v1/movies",
            get(handlers::movies::list).post(handlers::movies::create),
        )
        .route(
            "/v1/movies/{id}",
            get(handlers::movies::show)
                .patch(handlers::movies::update)
                .delete(handlers::movies::delete),
        )
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed);

    api.layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::access::gate,
    ))
    .layer(cors_layer(&state.config().cors.trusted_origins))
    .layer(TraceLayer::new_for_http())
    .layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::metrics::track,
    ))
    .layer(CatchPanicLayer::custom(panic_response))
    .layer(DefaultBodyLimit::max(state.config().server.max_body_bytes))
    .with_state(state)
}

fn cors_layer(trusted_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = trusted_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::OPTIONS,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    ApiError::Internal(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}
