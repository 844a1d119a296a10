//! Route handlers for process definitions and their steps.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use cadre_core::ThresholdRule;
use cadre_engine::{DefinitionPatch, Principal, StepInput};
use cadre_storage::{DefinitionRecord, StepRecord};
use serde::Deserialize;

use super::state::AppState;
use super::{engine_error, json_error};

#[derive(Deserialize)]
pub(crate) struct StepBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct CreateProcessBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
    /// `{"operator": ">"|"<", "threshold": <number>, "target_step_order": <int>}`
    /// or null.
    #[serde(default)]
    rule: Option<serde_json::Value>,
    #[serde(default)]
    steps: Vec<StepBody>,
}

#[derive(Deserialize)]
pub(crate) struct UpdateProcessBody {
    #[serde(default)]
    name: Option<String>,
    /// Absent = unchanged; null = clear; string = set.
    #[serde(default)]
    description: Option<serde_json::Value>,
    /// Absent = unchanged; null = remove the rule; object = set.
    #[serde(default)]
    rule: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub(crate) struct ReplaceStepsBody {
    steps: Vec<StepBody>,
}

#[derive(Deserialize)]
pub(crate) struct UpdateStepBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

fn step_inputs(steps: Vec<StepBody>) -> Vec<StepInput> {
    steps
        .into_iter()
        .map(|s| StepInput {
            name: s.name,
            description: s.description,
        })
        .collect()
}

/// The definition with its step list embedded, as the UI consumes it.
fn with_steps(definition: &DefinitionRecord, steps: &[StepRecord]) -> serde_json::Value {
    let mut value = serde_json::to_value(definition).unwrap_or_default();
    value["steps"] = serde_json::to_value(steps).unwrap_or_default();
    value
}

/// GET /processes
pub(crate) async fn list(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    match state.definitions.list(&principal).await {
        Ok(listings) => (StatusCode::OK, Json(listings)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// POST /processes
pub(crate) async fn create(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateProcessBody>,
) -> Response {
    let rule = match &body.rule {
        Some(value) => match ThresholdRule::from_json(value) {
            Ok(rule) => rule,
            Err(err) => return json_error(StatusCode::BAD_REQUEST, &err.to_string()),
        },
        None => None,
    };
    match state
        .definitions
        .create(
            &principal,
            &body.name,
            body.description,
            rule,
            step_inputs(body.steps),
        )
        .await
    {
        Ok((definition, steps)) => {
            (StatusCode::CREATED, Json(with_steps(&definition, &steps))).into_response()
        }
        Err(err) => engine_error(err),
    }
}

/// GET /processes/{id}
pub(crate) async fn get_one(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Response {
    match state.definitions.get(&principal, &id).await {
        Ok((definition, steps)) => {
            (StatusCode::OK, Json(with_steps(&definition, &steps))).into_response()
        }
        Err(err) => engine_error(err),
    }
}

/// PUT /processes/{id}
pub(crate) async fn update(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<UpdateProcessBody>,
) -> Response {
    let description = match body.description {
        None => None,
        Some(serde_json::Value::Null) => Some(None),
        Some(serde_json::Value::String(text)) => Some(Some(text)),
        Some(_) => return json_error(StatusCode::BAD_REQUEST, "'description' must be a string"),
    };
    let rule = match &body.rule {
        None => None,
        Some(value) => match ThresholdRule::from_json(value) {
            Ok(rule) => Some(rule),
            Err(err) => return json_error(StatusCode::BAD_REQUEST, &err.to_string()),
        },
    };
    let patch = DefinitionPatch {
        name: body.name,
        description,
        rule,
    };
    match state.definitions.update(&principal, &id, patch).await {
        Ok(definition) => (StatusCode::OK, Json(definition)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// DELETE /processes/{id}
pub(crate) async fn remove(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Response {
    match state.definitions.remove(&principal, &id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"message": "process deleted"})),
        )
            .into_response(),
        Err(err) => engine_error(err),
    }
}

/// POST /processes/{id}/toggle
pub(crate) async fn toggle_active(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Response {
    match state.definitions.toggle_active(&principal, &id).await {
        Ok(definition) => (StatusCode::OK, Json(definition)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// PUT /processes/{id}/steps
pub(crate) async fn replace_steps(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<ReplaceStepsBody>,
) -> Response {
    match state
        .definitions
        .replace_steps(&principal, &id, step_inputs(body.steps))
        .await
    {
        Ok(steps) => (StatusCode::OK, Json(steps)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// PUT /processes/{id}/steps/{step_id}
pub(crate) async fn update_step(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((id, step_id)): Path<(String, String)>,
    Json(body): Json<UpdateStepBody>,
) -> Response {
    match state
        .definitions
        .update_step(&principal, &id, &step_id, &body.name, body.description)
        .await
    {
        Ok(step) => (StatusCode::OK, Json(step)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// DELETE /processes/{id}/steps/{step_id}
pub(crate) async fn remove_step(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((id, step_id)): Path<(String, String)>,
) -> Response {
    match state.definitions.remove_step(&principal, &id, &step_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"message": "step deleted"})),
        )
            .into_response(),
        Err(err) => engine_error(err),
    }
}
