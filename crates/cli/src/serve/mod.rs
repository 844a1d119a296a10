//! `cadre serve` -- HTTP JSON API server for the cadre engine.
//!
//! Exposes the definition store, instance lifecycle engine, ledger, and
//! projections as an async HTTP service using `axum` + `tokio`. Supports
//! concurrent request handling; mutations on the same instance are
//! serialized inside the engine.
//!
//! Security:
//! - Bearer-token authentication on every endpoint except /health; tokens
//!   resolve to `{user_id, organization_id, role}` from the serve config.
//! - CORS headers on all responses (permissive for local dev).
//!
//! Endpoints:
//! - GET  /health                              - Server status (exempt from auth)
//! - GET  /processes                           - List definitions with counters
//! - POST /processes                           - Create a definition (+ steps)
//! - GET  /processes/{id}                      - Definition with its steps
//! - PUT  /processes/{id}                      - Update name/description/rule
//! - DELETE /processes/{id}                    - Delete (refused with live instances)
//! - POST /processes/{id}/toggle               - Flip the active flag
//! - PUT  /processes/{id}/steps                - Replace the full step list
//! - PUT  /processes/{id}/steps/{step_id}      - Edit one step
//! - DELETE /processes/{id}/steps/{step_id}    - Delete one step
//! - GET  /instances                           - List instances (joined view)
//! - POST /instances                           - Start an instance
//! - GET  /instances/{id}                      - One instance
//! - PUT  /instances/{id}/status               - Direct status override
//! - POST /instances/{id}/next                 - Advance with a value
//! - GET  /instances/{id}/history              - Ledger, newest-first
//! - GET  /instances/{id}/summary              - Generated summary
//! - GET  /organization/members                - Member directory
//! - GET  /organization/stats                  - Organization summary counts
//!
//! All responses use Content-Type: application/json.

mod instances;
mod middleware;
mod organization;
mod processes;
mod state;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{middleware as axum_middleware, Json, Router};
use cadre_engine::{
    AnthropicClient, DefinitionService, EngineError, LedgerService, LifecycleEngine, Principal,
    ProjectionService, SummaryClient, SummaryService,
};
use cadre_storage::{CadreStorage, MemoryStorage, NewMember, StorageError};
use tower_http::cors::{Any, CorsLayer};

use self::middleware::auth_middleware;
use self::state::AppState;
use crate::config::ServeConfig;

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
pub(crate) fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

/// Map an engine error to its HTTP response.
///
/// Internal failures are logged and return a generic message; everything
/// else surfaces its own text.
pub(crate) fn engine_error(err: EngineError) -> Response {
    match err {
        EngineError::Validation { message } => json_error(StatusCode::BAD_REQUEST, &message),
        EngineError::NotFound { resource } => {
            json_error(StatusCode::NOT_FOUND, &format!("{} not found", resource))
        }
        EngineError::Conflict { message } => json_error(StatusCode::CONFLICT, &message),
        EngineError::Storage(storage) => match storage {
            StorageError::DefinitionNotFound { .. } => {
                json_error(StatusCode::NOT_FOUND, "process not found")
            }
            StorageError::StepNotFound { .. } => json_error(StatusCode::NOT_FOUND, "step not found"),
            StorageError::InstanceNotFound { .. } => {
                json_error(StatusCode::NOT_FOUND, "instance not found")
            }
            StorageError::ConcurrentConflict { .. } => json_error(
                StatusCode::CONFLICT,
                "instance was modified concurrently; fetch it and retry",
            ),
            StorageError::Backend { .. } => {
                tracing::error!(%storage, "storage failure");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        },
    }
}

/// Fallback handler for unmatched routes.
async fn handle_not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
async fn handle_health() -> Response {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
}

/// Start the HTTP server on the given port.
pub async fn start_server(
    config: ServeConfig,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Arc::new(MemoryStorage::new());
    seed_members(&storage, &config).await?;

    let mut tokens: HashMap<String, Principal> = HashMap::new();
    for principal in &config.principals {
        tokens.insert(
            principal.token.clone(),
            Principal {
                user_id: principal.user_id.clone(),
                email: principal.email.clone(),
                organization_id: principal.organization_id.clone(),
                role: principal.role.clone(),
            },
        );
    }

    // The summary collaborator is optional: without an API key the
    // deterministic fallback generator answers summary requests.
    let summary_client: Option<Arc<dyn SummaryClient>> = match AnthropicClient::from_env() {
        Ok(client) => {
            let client = match &config.summary_model {
                Some(model) => client.with_model(model.clone()),
                None => client,
            };
            tracing::info!("summary client configured");
            Some(Arc::new(client))
        }
        Err(_) => {
            tracing::info!("ANTHROPIC_API_KEY not set; summaries use the fallback generator");
            None
        }
    };

    let state = Arc::new(AppState {
        tokens,
        definitions: DefinitionService::new(storage.clone()),
        lifecycle: LifecycleEngine::new(storage.clone()),
        ledger: LedgerService::new(storage.clone()),
        projection: ProjectionService::new(storage.clone()),
        summary: SummaryService::new(storage.clone(), summary_client),
    });

    // CORS: permissive for local dev.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route(
            "/processes",
            get(processes::list).post(processes::create),
        )
        .route(
            "/processes/{id}",
            get(processes::get_one)
                .put(processes::update)
                .delete(processes::remove),
        )
        .route("/processes/{id}/toggle", post(processes::toggle_active))
        .route("/processes/{id}/steps", put(processes::replace_steps))
        .route(
            "/processes/{id}/steps/{step_id}",
            put(processes::update_step).delete(processes::remove_step),
        )
        .route(
            "/instances",
            get(instances::list).post(instances::start),
        )
        .route("/instances/{id}", get(instances::get_one))
        .route("/instances/{id}/status", put(instances::set_status))
        .route("/instances/{id}/next", post(instances::advance))
        .route("/instances/{id}/history", get(instances::history))
        .route("/instances/{id}/summary", get(instances::summary))
        .route("/organization/members", get(organization::members))
        .route("/organization/stats", get(organization::stats))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "cadre API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Seed the member directory from the configured principals.
async fn seed_members(
    storage: &Arc<MemoryStorage>,
    config: &ServeConfig,
) -> Result<(), StorageError> {
    let mut snapshot = storage.begin_snapshot().await?;
    for principal in &config.principals {
        storage
            .insert_member(
                &mut snapshot,
                NewMember {
                    user_id: principal.user_id.clone(),
                    email: principal.email.clone(),
                    organization_id: principal.organization_id.clone(),
                    role: principal.role.clone(),
                },
            )
            .await?;
    }
    storage.commit_snapshot(snapshot).await
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("received shutdown signal");
}
