//! End-to-end tests for the topic API over the in-memory store.
//!
//! Requests go through the full router (middleware included) with
//! `tower::ServiceExt::oneshot`, so no listener or database is needed.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use async_trait::async_trait;
use kgraph_api::config::{RateLimitConfig, ServerConfig};
use kgraph_api::{build_router, AppState};
use kgraph_db::{
    Error, Link, ListTopicsRequest, MemoryTopicRepository, NewLink, Result, Topic, TopicInput,
    TopicRepository, TopicTitle,
};

fn app_with(config: ServerConfig) -> Router {
    app_over(Arc::new(MemoryTopicRepository::new()), config)
}

fn app_over(store: Arc<dyn TopicRepository>, config: ServerConfig) -> Router {
    let state = AppState::new(store, &config.rate_limit);
    build_router(state, &config)
}

/// Store whose backing database is gone: every call fails.
struct UnreachableStore;

impl UnreachableStore {
    fn error() -> Error {
        Error::Internal("connection refused by db.internal:5432".to_string())
    }
}

#[async_trait]
impl TopicRepository for UnreachableStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn list(&self, _req: ListTopicsRequest) -> Result<Vec<Topic>> {
        Err(Self::error())
    }

    async fn fetch(&self, _id: i64) -> Result<Topic> {
        Err(Self::error())
    }

    async fn insert(&self, _input: TopicInput) -> Result<i64> {
        Err(Self::error())
    }

    async fn update(&self, _id: i64, _input: TopicInput) -> Result<Topic> {
        Err(Self::error())
    }

    async fn delete(&self, _id: i64) -> Result<()> {
        Err(Self::error())
    }

    async fn titles(&self, _ids: &[i64]) -> Result<Vec<TopicTitle>> {
        Err(Self::error())
    }

    async fn search_title(&self, _substring: &str, _limit: i64) -> Result<Vec<Topic>> {
        Err(Self::error())
    }

    async fn connect(&self, _first: i64, _second: i64) -> Result<()> {
        Err(Self::error())
    }

    async fn disconnect(&self, _first: i64, _second: i64) -> Result<()> {
        Err(Self::error())
    }

    async fn add_link(&self, _id: i64, _link: NewLink) -> Result<Link> {
        Err(Self::error())
    }

    async fn remove_link(&self, _id: i64, _link_id: i64) -> Result<()> {
        Err(Self::error())
    }

    async fn count(&self) -> Result<i64> {
        Err(Self::error())
    }
}

fn app() -> Router {
    app_with(ServerConfig::for_memory_store())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

async fn create(app: &Router, body: Value) -> i64 {
    let (status, created) = send(app, Method::POST, "/api/topic", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", created);
    created["id"].as_i64().unwrap()
}

async fn create_titled(app: &Router, title: &str) -> i64 {
    create(app, json!({ "title": title, "value": "body" })).await
}

fn error_of(body: &Value) -> &str {
    body["error"].as_str().unwrap_or_default()
}

// =============================================================================
// CRUD
// =============================================================================

#[tokio::test]
async fn test_create_and_get_topic() {
    let app = app();
    let id = create(
        &app,
        json!({
            "title": "Rust",
            "value": "A systems language",
            "category": "languages",
            "links": [
                { "type": "wiki", "url": "https://en.wikipedia.org/wiki/Rust", "title": "Wikipedia" },
                { "url": "https://www.rust-lang.org" }
            ]
        }),
    )
    .await;

    let (status, topic) = send(&app, Method::GET, &format!("/api/topic/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(topic["id"], id);
    assert_eq!(topic["title"], "Rust");
    assert_eq!(topic["category"], "languages");
    assert_eq!(topic["links"][0]["id"], 1);
    assert_eq!(topic["links"][0]["type"], "wiki");
    assert_eq!(topic["links"][1]["id"], 2);
    assert_eq!(topic["connections"], json!([]));
    assert!(topic["created"].is_string());
}

#[tokio::test]
async fn test_create_requires_title_and_value() {
    let app = app();

    let (status, body) = send(&app, Method::POST, "/api/topic", Some(json!({ "value": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_of(&body).starts_with("Not correct topic structure"));

    let (status, _) = send(&app, Method::POST, "/api/topic", Some(json!({ "title": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_rejects_malformed_json() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/topic")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_topic_bad_and_missing_ids() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/topic/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "Bad parameter: id");

    let (status, body) = send(&app, Method::GET, "/api/topic/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_of(&body), "Topic 999 not found");
}

#[tokio::test]
async fn test_get_topic_with_field_projection() {
    let app = app();
    let id = create_titled(&app, "Projected").await;

    let (status, topic) = send(
        &app,
        Method::GET,
        &format!("/api/topic/{}?fields=title", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(topic, json!({ "id": id, "title": "Projected" }));
}

#[tokio::test]
async fn test_update_topic_replaces_fields() {
    let app = app();
    let id = create_titled(&app, "Before").await;

    let (status, topic) = send(
        &app,
        Method::PUT,
        &format!("/api/topic/{}", id),
        Some(json!({ "title": "After", "value": "new", "status": "draft" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(topic["title"], "After");
    assert_eq!(topic["status"], "draft");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/topic/4242",
        Some(json!({ "title": "t", "value": "v" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_connection_errors() {
    let app = app();
    let id = create_titled(&app, "Self").await;
    let uri = format!("/api/topic/{}", id);

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(json!({ "title": "t", "value": "v", "connections": [id] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "A topic cannot be connected to itself");

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(json!({ "title": "t", "value": "v", "connections": [777] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_of(&body), "Topic 777 not found");

    // Neither failed update touched the stored topic.
    let (_, topic) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(topic["title"], "Self");
    assert_eq!(topic["connections"], json!([]));
}

#[tokio::test]
async fn test_delete_topic() {
    let app = app();
    let id = create_titled(&app, "Short lived").await;

    let (status, body) = send(&app, Method::DELETE, &format!("/api/topic/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/topic/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// LISTING
// =============================================================================

#[tokio::test]
async fn test_list_topics_newest_first_with_paging() {
    let app = app();
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(create_titled(&app, &format!("topic {}", i)).await);
    }

    let (status, page) = send(&app, Method::GET, "/api/topic?count=2&offset=1", None).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<i64> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_i64().unwrap())
        .collect();
    assert_eq!(listed, vec![ids[3], ids[2]]);

    let (_, all) = send(&app, Method::GET, "/api/topic", None).await;
    assert_eq!(all.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_list_topics_rejects_bad_paging() {
    let app = app();
    for uri in [
        "/api/topic?count=0",
        "/api/topic?count=101",
        "/api/topic?offset=-1",
        "/api/topic?count=lots",
    ] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["error"].is_string(), "{}", uri);
    }
}

#[tokio::test]
async fn test_list_topics_by_category_query() {
    let app = app();
    create(&app, json!({ "title": "a", "value": "v", "category": "x" })).await;
    let b = create(&app, json!({ "title": "b", "value": "v", "category": "y" })).await;

    let (status, page) = send(&app, Method::GET, "/api/topic?category=y&fields=title", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page, json!([{ "id": b, "title": "b" }]));
}

#[tokio::test]
async fn test_category_topics_returns_summaries() {
    let app = app();
    create(&app, json!({ "title": "a", "value": "v", "category": "history" })).await;
    create(&app, json!({ "title": "b", "value": "v", "category": "history" })).await;
    create(&app, json!({ "title": "c", "value": "v", "category": "science" })).await;

    let (status, page) = send(
        &app,
        Method::POST,
        "/api/topic/category",
        Some(json!({ "category": "history" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = page.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], "b");
    assert!(items[0].get("value").is_none());
    assert!(items[0].get("links").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/topic/category",
        Some(json!({ "category": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "Bad parameter: category");
}

// =============================================================================
// TITLES AND SEARCH
// =============================================================================

#[tokio::test]
async fn test_titles_in_request_order() {
    let app = app();
    let a = create_titled(&app, "Alpha").await;
    let b = create_titled(&app, "Beta").await;

    let (status, titles) = send(
        &app,
        Method::POST,
        "/api/topic/titles",
        Some(json!({ "ids": [b, a.to_string(), "junk", 777] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        titles,
        json!([{ "id": b, "title": "Beta" }, { "id": a, "title": "Alpha" }])
    );
}

#[tokio::test]
async fn test_titles_errors() {
    let app = app();

    let (status, body) = send(&app, Method::POST, "/api/topic/titles", Some(json!({ "ids": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "Bad parameters: ids");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/topic/titles",
        Some(json!({ "ids": ["nope", -1] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/api/topic/titles", Some(json!({ "ids": [31337] }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_by_title_substring() {
    let app = app();
    let a = create_titled(&app, "Graph Theory").await;
    create_titled(&app, "Set theory").await;
    create_titled(&app, "Topology").await;

    let (status, hits) = send(&app, Method::GET, "/api/topic/search/THEORY", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits.as_array().unwrap().len(), 2);

    let (_, hits) = send(&app, Method::GET, "/api/topic/search/graph?fields=title", None).await;
    assert_eq!(hits, json!([{ "id": a, "title": "Graph Theory" }]));

    let (status, hits) = send(&app, Method::GET, "/api/topic/search/zzz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits, json!([]));

    let (status, _) = send(&app, Method::GET, "/api/topic/search/%20", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// CONNECTIONS
// =============================================================================

#[tokio::test]
async fn test_connect_and_disconnect_topics() {
    let app = app();
    let a = create_titled(&app, "A").await;
    let b = create_titled(&app, "B").await;

    let uri = format!("/api/topic/{}/connection/{}", a, b);
    let (status, _) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, topic_a) = send(&app, Method::GET, &format!("/api/topic/{}", a), None).await;
    let (_, topic_b) = send(&app, Method::GET, &format!("/api/topic/{}", b), None).await;
    assert_eq!(topic_a["connections"], json!([b]));
    assert_eq!(topic_b["connections"], json!([a]));

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, topic_b) = send(&app, Method::GET, &format!("/api/topic/{}", b), None).await;
    assert_eq!(topic_b["connections"], json!([]));

    // Disconnecting again is a no-op
    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_connect_errors() {
    let app = app();
    let a = create_titled(&app, "A").await;

    let (status, _) = send(&app, Method::POST, &format!("/api/topic/{}/connection/{}", a, a), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, &format!("/api/topic/{}/connection/999", a), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::POST, &format!("/api/topic/{}/connection/x", a), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "Bad parameter: id");
}

#[tokio::test]
async fn test_create_with_connections_mirrors_and_delete_detaches() {
    let app = app();
    let a = create_titled(&app, "A").await;
    let b = create(&app, json!({ "title": "B", "value": "v", "connections": [a] })).await;

    let (_, topic_a) = send(&app, Method::GET, &format!("/api/topic/{}", a), None).await;
    assert_eq!(topic_a["connections"], json!([b]));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/topic",
        Some(json!({ "title": "C", "value": "v", "connections": [12345] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, Method::DELETE, &format!("/api/topic/{}", b), None).await;
    let (_, topic_a) = send(&app, Method::GET, &format!("/api/topic/{}", a), None).await;
    assert_eq!(topic_a["connections"], json!([]));
}

// =============================================================================
// LINKS
// =============================================================================

#[tokio::test]
async fn test_add_and_remove_link() {
    let app = app();
    let id = create_titled(&app, "Linked").await;
    let uri = format!("/api/topic/{}/link", id);

    let (status, link) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "link": { "type": "video", "url": "https://example.com/v", "title": "Talk" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(link["id"], 1);
    assert_eq!(link["type"], "video");

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "link": { "id": 1, "url": "https://example.com/dup" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, Method::DELETE, &format!("{}/1", uri), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::DELETE, &format!("{}/1", uri), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(error_of(&body).starts_with("Not found"));

    let (_, topic) = send(&app, Method::GET, &format!("/api/topic/{}", id), None).await;
    assert_eq!(topic["links"], json!([]));
}

#[tokio::test]
async fn test_add_link_validation() {
    let app = app();
    let id = create_titled(&app, "Linked").await;
    let uri = format!("/api/topic/{}/link", id);

    let (status, body) = send(&app, Method::POST, &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "Bad parameter: link");

    let (status, _) = send(&app, Method::POST, &uri, Some(json!({ "link": { "title": "no url" } }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/topic/999/link",
        Some(json!({ "link": { "url": "https://example.com" } })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::DELETE, &format!("{}/zero", uri), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "Bad parameter: idlink");
}

// =============================================================================
// SYSTEM
// =============================================================================

#[tokio::test]
async fn test_health_reports_store() {
    let app = app();
    create_titled(&app, "one").await;

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["topics"], 1);
}

#[tokio::test]
async fn test_health_degraded_when_store_unreachable() {
    let app = app_over(Arc::new(UnreachableStore), ServerConfig::for_memory_store());

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["store"], "postgres");
}

#[tokio::test]
async fn test_store_failure_is_an_opaque_500() {
    let app = app_over(Arc::new(UnreachableStore), ServerConfig::for_memory_store());

    let (status, body) = send(&app, Method::GET, "/api/topic/1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Internal server error" }));
}

#[tokio::test]
async fn test_unknown_route_falls_back_to_default() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/something/else", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("Default request!".to_string()));
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_openapi_yaml_served() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/openapi.yaml", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("/api/topic"));
}

#[tokio::test]
async fn test_rate_limit_rejects_when_exhausted() {
    let config = ServerConfig {
        rate_limit: RateLimitConfig {
            enabled: true,
            requests: 2,
            period_secs: 3600,
        },
        ..ServerConfig::for_memory_store()
    };
    let app = app_with(config);

    let (status, body) = send(&app, Method::GET, "/api/v1/rate-limit/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], true);

    let (status, _) = send(&app, Method::GET, "/api/topic", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, Method::GET, "/api/topic", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].is_string());
}
