//! # kgraph-api
//!
//! HTTP API for topics with links and bidirectional connections.
//!
//! The router is built here so integration tests can drive it in-process;
//! `main.rs` only wires configuration, logging and the listener.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod query_types;

use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::{Config, SwaggerUi};

use kgraph_core::TopicRepository;

use crate::config::ServerConfig;
use crate::handlers::{system, topics};
use crate::middleware::{
    build_rate_limiter, cors_layer, rate_limit_middleware, GlobalRateLimiter, MakeRequestUuidV7,
};
use crate::openapi::ApiDoc;

pub use config::RateLimitConfig;
pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TopicRepository>,
    /// Global rate limiter (None if rate limiting is disabled).
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    pub fn new(store: Arc<dyn TopicRepository>, rate_limit: &RateLimitConfig) -> Self {
        Self {
            store,
            rate_limiter: build_rate_limiter(rate_limit),
        }
    }
}

/// Build the full router with middleware applied.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(system::health_check))
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(
                    Config::new(["/api-docs/openapi.json"])
                        .try_it_out_enabled(true)
                        .display_request_duration(true),
                ),
        )
        .route("/openapi.yaml", get(system::openapi_yaml))
        // Topics
        .route(
            "/api/topic",
            get(topics::list_topics).post(topics::create_topic),
        )
        .route("/api/topic/titles", post(topics::topic_titles))
        .route("/api/topic/category", post(topics::category_topics))
        .route("/api/topic/search/:title", get(topics::search_topics))
        .route(
            "/api/topic/:id",
            get(topics::get_topic)
                .put(topics::update_topic)
                .delete(topics::delete_topic),
        )
        .route(
            "/api/topic/:id/connection/:other_id",
            post(topics::connect_topics).delete(topics::disconnect_topics),
        )
        .route("/api/topic/:id/link", post(topics::add_link))
        .route(
            "/api/topic/:id/link/:link_id",
            axum::routing::delete(topics::remove_link),
        )
        .route("/api/v1/rate-limit/status", get(system::rate_limit_status))
        .fallback(system::default_route)
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors_layer(&config.allowed_origins))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .with_state(state)
}
