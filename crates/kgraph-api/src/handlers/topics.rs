//! Topic HTTP handlers.
//!
//! Every handler validates its path and body, performs one store call, and
//! maps the result to a response. Errors become `{"error": ...}` bodies via
//! [`ApiError`].

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::Value as JsonValue;
use tracing::debug;

use kgraph_core::defaults::{SEARCH_LIMIT, TITLES_MAX_IDS};
use kgraph_core::{Link, Topic, TopicInput, TopicSummary, TopicTitle};

use crate::error::ApiError;
use crate::query_types::{
    page_request, parse_id, AddLinkBody, CategoryBody, CreatedTopic, FieldsQuery, ListTopicsQuery,
    TitlesBody,
};
use crate::AppState;

/// List topics, newest first.
///
/// # Returns
/// - 200 OK with an array of (projected) topics
/// - 400 Bad Request if `count` or `offset` is out of range
#[utoipa::path(
    get,
    path = "/api/topic",
    tag = "Topics",
    params(ListTopicsQuery),
    responses(
        (status = 200, description = "Topics, newest first", body = [Topic]),
        (status = 400, description = "Invalid pagination"),
    )
)]
pub async fn list_topics(
    State(state): State<AppState>,
    query: Result<Query<ListTopicsQuery>, QueryRejection>,
) -> Result<Json<Vec<JsonValue>>, ApiError> {
    let Query(query) = query?;
    let selection = query.selection();
    let req = page_request(query.count, query.offset, query.category)?;

    let topics = state.store.list(req).await?;
    Ok(Json(selection.apply_all(&topics)?))
}

/// Get a topic by id.
#[utoipa::path(
    get,
    path = "/api/topic/{id}",
    tag = "Topics",
    params(
        ("id" = i64, Path, description = "Topic id"),
        FieldsQuery,
    ),
    responses(
        (status = 200, description = "The topic", body = Topic),
        (status = 400, description = "Bad parameter: id"),
        (status = 404, description = "Topic not found"),
    )
)]
pub async fn get_topic(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    query: Result<Query<FieldsQuery>, QueryRejection>,
) -> Result<Json<JsonValue>, ApiError> {
    let id = parse_id(&raw_id, "id")?;
    let Query(query) = query?;

    let topic = state.store.fetch(id).await?;
    Ok(Json(query.selection().apply(&topic)?))
}

/// Create a topic.
///
/// Title and value are required. Connections listed in the body must point
/// at existing topics and are recorded on both sides.
#[utoipa::path(
    post,
    path = "/api/topic",
    tag = "Topics",
    request_body = TopicInput,
    responses(
        (status = 201, description = "Topic created", body = CreatedTopic),
        (status = 400, description = "Not correct topic structure"),
        (status = 404, description = "A connected topic does not exist"),
    )
)]
pub async fn create_topic(
    State(state): State<AppState>,
    payload: Result<Json<TopicInput>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedTopic>), ApiError> {
    let Json(input) = payload?;
    let id = state.store.insert(input).await?;
    Ok((StatusCode::CREATED, Json(CreatedTopic { id })))
}

/// Replace a topic's fields, links and connections.
#[utoipa::path(
    put,
    path = "/api/topic/{id}",
    tag = "Topics",
    params(("id" = i64, Path, description = "Topic id")),
    request_body = TopicInput,
    responses(
        (status = 200, description = "Updated topic", body = Topic),
        (status = 400, description = "Bad id or topic structure"),
        (status = 404, description = "Topic not found"),
    )
)]
pub async fn update_topic(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<TopicInput>, JsonRejection>,
) -> Result<Json<Topic>, ApiError> {
    let id = parse_id(&raw_id, "id")?;
    let Json(input) = payload?;
    let topic = state.store.update(id, input).await?;
    Ok(Json(topic))
}

/// Delete a topic and detach it from every connected topic.
#[utoipa::path(
    delete,
    path = "/api/topic/{id}",
    tag = "Topics",
    params(("id" = i64, Path, description = "Topic id")),
    responses(
        (status = 204, description = "Topic deleted"),
        (status = 400, description = "Bad parameter: id"),
        (status = 404, description = "Topic not found"),
    )
)]
pub async fn delete_topic(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id, "id")?;
    state.store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Titles for a list of topic ids.
#[utoipa::path(
    post,
    path = "/api/topic/titles",
    tag = "Topics",
    request_body = TitlesBody,
    responses(
        (status = 200, description = "Titles in request order", body = [TopicTitle]),
        (status = 400, description = "Bad parameters: ids"),
        (status = 404, description = "None of the ids exist"),
    )
)]
pub async fn topic_titles(
    State(state): State<AppState>,
    payload: Result<Json<TitlesBody>, JsonRejection>,
) -> Result<Json<Vec<TopicTitle>>, ApiError> {
    let Json(body) = payload?;
    let ids = body.valid_ids();
    if ids.is_empty() || ids.len() > TITLES_MAX_IDS {
        return Err(ApiError::BadRequest("Bad parameters: ids".to_string()));
    }

    let titles = state.store.titles(&ids).await?;
    if titles.is_empty() {
        return Err(ApiError::NotFound("Not found".to_string()));
    }
    Ok(Json(titles))
}

/// Search topics whose title contains a substring (case-insensitive).
#[utoipa::path(
    get,
    path = "/api/topic/search/{title}",
    tag = "Topics",
    params(
        ("title" = String, Path, description = "Title substring"),
        FieldsQuery,
    ),
    responses(
        (status = 200, description = "Matching topics, possibly empty", body = [Topic]),
        (status = 400, description = "Bad parameter: title"),
    )
)]
pub async fn search_topics(
    State(state): State<AppState>,
    Path(title): Path<String>,
    query: Result<Query<FieldsQuery>, QueryRejection>,
) -> Result<Json<Vec<JsonValue>>, ApiError> {
    let Query(query) = query?;
    let substring = title.trim();
    if substring.is_empty() {
        return Err(ApiError::bad_parameter("title"));
    }

    let hits = state.store.search_title(substring, SEARCH_LIMIT).await?;
    debug!(
        subsystem = "api",
        op = "search_title",
        result_count = hits.len(),
        "Title search"
    );
    Ok(Json(query.selection().apply_all(&hits)?))
}

/// Topic summaries for one category, newest first.
#[utoipa::path(
    post,
    path = "/api/topic/category",
    tag = "Topics",
    request_body = CategoryBody,
    responses(
        (status = 200, description = "Summaries, newest first", body = [TopicSummary]),
        (status = 400, description = "Bad parameter: category or pagination"),
    )
)]
pub async fn category_topics(
    State(state): State<AppState>,
    payload: Result<Json<CategoryBody>, JsonRejection>,
) -> Result<Json<Vec<TopicSummary>>, ApiError> {
    let Json(body) = payload?;
    if body.category.trim().is_empty() {
        return Err(ApiError::bad_parameter("category"));
    }
    let req = page_request(body.count, body.offset, Some(body.category))?;

    let topics = state.store.list(req).await?;
    Ok(Json(topics.iter().map(Topic::summary).collect()))
}

/// Connect two topics in both directions.
#[utoipa::path(
    post,
    path = "/api/topic/{id}/connection/{other_id}",
    tag = "Connections",
    params(
        ("id" = i64, Path, description = "First topic id"),
        ("other_id" = i64, Path, description = "Second topic id"),
    ),
    responses(
        (status = 200, description = "Topics connected"),
        (status = 400, description = "Bad ids or self-connection"),
        (status = 404, description = "Topic not found"),
    )
)]
pub async fn connect_topics(
    State(state): State<AppState>,
    Path((raw_first, raw_second)): Path<(String, String)>,
) -> Result<Json<JsonValue>, ApiError> {
    let first = parse_id(&raw_first, "id")?;
    let second = parse_id(&raw_second, "id")?;
    state.store.connect(first, second).await?;
    Ok(Json(serde_json::json!({ "connected": true })))
}

/// Remove the connection between two topics.
#[utoipa::path(
    delete,
    path = "/api/topic/{id}/connection/{other_id}",
    tag = "Connections",
    params(
        ("id" = i64, Path, description = "First topic id"),
        ("other_id" = i64, Path, description = "Second topic id"),
    ),
    responses(
        (status = 200, description = "Topics disconnected"),
        (status = 400, description = "Bad parameter: id"),
        (status = 404, description = "Topic not found"),
    )
)]
pub async fn disconnect_topics(
    State(state): State<AppState>,
    Path((raw_first, raw_second)): Path<(String, String)>,
) -> Result<Json<JsonValue>, ApiError> {
    let first = parse_id(&raw_first, "id")?;
    let second = parse_id(&raw_second, "id")?;
    state.store.disconnect(first, second).await?;
    Ok(Json(serde_json::json!({ "disconnected": true })))
}

/// Attach a link to a topic.
#[utoipa::path(
    post,
    path = "/api/topic/{id}/link",
    tag = "Links",
    params(("id" = i64, Path, description = "Topic id")),
    request_body = AddLinkBody,
    responses(
        (status = 200, description = "Stored link", body = Link),
        (status = 400, description = "Bad parameter: id or link"),
        (status = 404, description = "Topic not found"),
        (status = 409, description = "Link id already used on this topic"),
    )
)]
pub async fn add_link(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<AddLinkBody>, JsonRejection>,
) -> Result<Json<Link>, ApiError> {
    let id = parse_id(&raw_id, "id")?;
    let Json(body) = payload?;
    let link = body.link.ok_or_else(|| ApiError::bad_parameter("link"))?;

    let stored = state.store.add_link(id, link).await?;
    Ok(Json(stored))
}

/// Remove a link from a topic.
#[utoipa::path(
    delete,
    path = "/api/topic/{id}/link/{link_id}",
    tag = "Links",
    params(
        ("id" = i64, Path, description = "Topic id"),
        ("link_id" = i64, Path, description = "Link id"),
    ),
    responses(
        (status = 200, description = "Link removed"),
        (status = 400, description = "Bad parameter: id or idlink"),
        (status = 404, description = "Topic or link not found"),
    )
)]
pub async fn remove_link(
    State(state): State<AppState>,
    Path((raw_id, raw_link_id)): Path<(String, String)>,
) -> Result<Json<JsonValue>, ApiError> {
    let id = parse_id(&raw_id, "id")?;
    let link_id = parse_id(&raw_link_id, "idlink")?;
    state.store.remove_link(id, link_id).await?;
    Ok(Json(serde_json::json!({ "removed": true })))
}
