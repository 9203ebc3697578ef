//! Core traits for kgraph abstractions.
//!
//! These traits define the interfaces that concrete stores must satisfy,
//! enabling pluggable backends and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// TOPIC REPOSITORY
// =============================================================================

/// Repository for topic documents, their links and connections.
#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Short backend name for health reporting ("postgres", "memory").
    fn backend(&self) -> &'static str;

    /// List topics, newest first.
    async fn list(&self, req: ListTopicsRequest) -> Result<Vec<Topic>>;

    /// Fetch a topic by id.
    async fn fetch(&self, id: i64) -> Result<Topic>;

    /// Insert a new topic and mirror its connections. Returns the new id.
    async fn insert(&self, input: TopicInput) -> Result<i64>;

    /// Replace a topic's content, links and connections.
    async fn update(&self, id: i64, input: TopicInput) -> Result<Topic>;

    /// Delete a topic and detach it from every connected topic.
    async fn delete(&self, id: i64) -> Result<()>;

    /// Titles for the given ids, in request order. Missing ids are skipped.
    async fn titles(&self, ids: &[i64]) -> Result<Vec<TopicTitle>>;

    /// Case-insensitive substring search on titles, newest first.
    async fn search_title(&self, substring: &str, limit: i64) -> Result<Vec<Topic>>;

    /// Connect two topics in both directions.
    async fn connect(&self, first: i64, second: i64) -> Result<()>;

    /// Remove the connection between two topics in both directions.
    async fn disconnect(&self, first: i64, second: i64) -> Result<()>;

    /// Append a link to a topic. Returns the stored link.
    async fn add_link(&self, id: i64, link: NewLink) -> Result<Link>;

    /// Remove a link from a topic by link id.
    async fn remove_link(&self, id: i64, link_id: i64) -> Result<()>;

    /// Number of stored topics.
    async fn count(&self) -> Result<i64>;
}
