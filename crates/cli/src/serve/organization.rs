//! Route handlers for organization-level views.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use cadre_engine::Principal;

use super::engine_error;
use super::state::AppState;

/// GET /organization/members
pub(crate) async fn members(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    match state.projection.members(&principal).await {
        Ok(members) => (StatusCode::OK, Json(members)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// GET /organization/stats
pub(crate) async fn stats(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    match state.projection.organization_stats(&principal).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(err) => engine_error(err),
    }
}
