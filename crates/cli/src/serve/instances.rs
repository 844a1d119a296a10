//! Route handlers for process instances: start, advance, status override,
//! history, and summaries.
//!
//! Retried calls are not idempotent (a repeated advance double-advances);
//! clients confirm the prior outcome via GET /instances/{id} before
//! retrying. The server never retries on their behalf.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use cadre_core::rule::decimal_from_json;
use cadre_core::InstanceStatus;
use cadre_engine::Principal;
use serde::Deserialize;

use super::state::AppState;
use super::{engine_error, json_error};

#[derive(Deserialize)]
pub(crate) struct StartBody {
    process_id: String,
}

#[derive(Deserialize)]
pub(crate) struct SetStatusBody {
    status: String,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct AdvanceBody {
    value: serde_json::Value,
}

/// GET /instances
pub(crate) async fn list(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    match state.lifecycle.list(&principal).await {
        Ok(listings) => (StatusCode::OK, Json(listings)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// POST /instances
pub(crate) async fn start(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<StartBody>,
) -> Response {
    match state.lifecycle.start(&principal, &body.process_id).await {
        Ok(instance) => (StatusCode::CREATED, Json(instance)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// GET /instances/{id}
pub(crate) async fn get_one(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Response {
    match state.lifecycle.get(&principal, &id).await {
        Ok(instance) => (StatusCode::OK, Json(instance)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// PUT /instances/{id}/status
pub(crate) async fn set_status(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<SetStatusBody>,
) -> Response {
    let status = match InstanceStatus::parse(&body.status) {
        Ok(status) => status,
        Err(err) => return json_error(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    match state
        .lifecycle
        .set_status(&principal, &id, status, body.notes)
        .await
    {
        Ok(instance) => (StatusCode::OK, Json(instance)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// POST /instances/{id}/next
pub(crate) async fn advance(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<AdvanceBody>,
) -> Response {
    let value = match decimal_from_json(&body.value) {
        Some(value) => value,
        None => return json_error(StatusCode::BAD_REQUEST, "a numeric 'value' is required"),
    };
    match state.lifecycle.advance(&principal, &id, value).await {
        Ok(instance) => (StatusCode::OK, Json(instance)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// GET /instances/{id}/history
pub(crate) async fn history(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Response {
    match state.ledger.list_by_instance(&principal, &id).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// GET /instances/{id}/summary
pub(crate) async fn summary(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Response {
    match state.summary.generate(&principal, &id).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => engine_error(err),
    }
}
