//! HTTP middleware: bearer-token authentication.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use super::json_error;
use super::state::AppState;

/// Bearer-token authentication middleware.
///
/// Every request except /health must carry `Authorization: Bearer <token>`
/// for a token declared in the serve config. The resolved identity is
/// attached to the request as a [`cadre_engine::Principal`] extension; the
/// engine trusts it without re-validating.
pub(crate) async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    // /health is exempt (load balancer health checks)
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());

    let token = match auth_header.and_then(|auth| auth.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return json_error(StatusCode::UNAUTHORIZED, "authentication required"),
    };

    match state.tokens.get(token) {
        Some(principal) => {
            request.extensions_mut().insert(principal.clone());
            next.run(request).await
        }
        None => json_error(StatusCode::FORBIDDEN, "invalid token"),
    }
}
