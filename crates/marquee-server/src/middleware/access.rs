use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;
use marquee_control::Requirement;
use std::net::SocketAddr;

/// Admit the peer, then resolve the bearer token and attach the caller's
/// [`Identity`](marquee_core::Identity) to the request.
///
/// Admission is keyed by peer IP, so every connection from one host shares
/// a bucket. A missing, malformed or unknown token leaves the caller
/// anonymous; handlers authorize against their own requirement.
pub async fn gate(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = bearer_token(req.headers());
    let identity = state
        .access()
        .evaluate(&peer.to_string(), bearer.as_deref(), Requirement::Public)
        .await?;
    req.extensions_mut().insert(identity);

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    Ok(response)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
