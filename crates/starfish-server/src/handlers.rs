use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use starfish_core::ResourceType;
use starfish_sync::SyncOutcome;

use crate::server::AppState;

#[derive(Serialize)]
struct HealthResponse<'a> {
    status: &'a str,
}

#[derive(Serialize)]
struct ReadyResponse<'a> {
    status: &'a str,
    backend: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceQuery {
    #[serde(rename = "ServerName")]
    pub server_name: String,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.store.backend_name();
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready",
                backend,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(backend, error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    status: "unavailable",
                    backend,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Proxies one resource lookup. Remote failures come back as an
/// error-shaped body with status 200.
pub async fn get_resource(
    State(state): State<AppState>,
    Path((resource_type, resource_id)): Path<(String, String)>,
    Query(query): Query<ResourceQuery>,
) -> Response {
    let resource_type = match resource_type.parse::<ResourceType>() {
        Ok(t) => t,
        Err(e) => return not_found(e),
    };
    let result = state
        .orchestrator
        .gateway()
        .fetch_resource(resource_type, &resource_id, &query.server_name)
        .await;
    (StatusCode::OK, Json(result.to_json())).into_response()
}

pub async fn sync_all(State(state): State<AppState>) -> impl IntoResponse {
    sync_response(state.orchestrator.sync_all().await)
}

pub async fn sync_sites(State(state): State<AppState>) -> impl IntoResponse {
    sync_response(state.orchestrator.sync_sites().await)
}

pub async fn sync_resource_type(
    State(state): State<AppState>,
    Path(resource_type): Path<String>,
) -> Response {
    match resource_type.parse::<ResourceType>() {
        Ok(t) => sync_response(state.orchestrator.sync_resource_type(t).await).into_response(),
        Err(e) => not_found(e),
    }
}

fn sync_response(outcome: SyncOutcome) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "result": outcome.into_summary() })),
    )
}

fn not_found(err: impl std::fmt::Display) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}
