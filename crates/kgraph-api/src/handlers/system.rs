//! Health, rate limit status, OpenAPI document and the default route.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use tracing::warn;
use utoipa::OpenApi;

use crate::openapi::ApiDoc;
use crate::AppState;

/// Service health, including a store round trip.
///
/// Returns 503 when the store cannot be reached.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    responses(
        (status = 200, description = "Service healthy"),
        (status = 503, description = "Store unreachable"),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let backend = state.store.backend();
    match state.store.count().await {
        Ok(topics) => Json(serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "store": backend,
            "topics": topics,
        }))
        .into_response(),
        Err(e) => {
            warn!(subsystem = "api", store = backend, error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "degraded",
                    "version": env!("CARGO_PKG_VERSION"),
                    "store": backend,
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// Whether the global rate limiter is active.
#[utoipa::path(
    get,
    path = "/api/v1/rate-limit/status",
    tag = "System",
    responses((status = 200, description = "Rate limiter state"))
)]
pub async fn rate_limit_status(State(state): State<AppState>) -> impl IntoResponse {
    if state.rate_limiter.is_some() {
        Json(serde_json::json!({
            "enabled": true,
            "message": "Rate limiting is active"
        }))
    } else {
        Json(serde_json::json!({
            "enabled": false,
            "message": "Rate limiting is disabled"
        }))
    }
}

/// The OpenAPI document as YAML.
pub async fn openapi_yaml() -> Response {
    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => ([(header::CONTENT_TYPE, "application/yaml")], yaml).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// Any route that matches nothing else.
pub async fn default_route() -> Html<&'static str> {
    Html("Default request!")
}
