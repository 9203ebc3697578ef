//! Core data models for kgraph.
//!
//! These types are shared across all kgraph crates and represent
//! the core domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults::{MAX_LINK_URL_LEN, MAX_TITLE_LEN};
use crate::error::{Error, Result};

// =============================================================================
// TOPIC TYPES
// =============================================================================

/// A topic document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Topic {
    pub id: i64,
    pub title: String,
    pub value: String,
    pub category: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    /// Ids of connected topics. Connections are stored on both ends.
    #[serde(default)]
    pub connections: Vec<i64>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Topic {
    /// Build a new topic from validated input.
    pub fn from_input(id: i64, input: TopicInput, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: input.title,
            value: input.value,
            category: input.category,
            status: input.status,
            links: input.links.into_iter().map(NewLink::into_link).collect(),
            connections: dedup_ids(input.connections),
            created: now,
            modified: now,
        }
    }

    /// Replace the mutable fields with `input`, keeping id and `created`.
    pub fn apply(&mut self, input: TopicInput, now: DateTime<Utc>) {
        self.title = input.title;
        self.value = input.value;
        self.category = input.category;
        self.status = input.status;
        self.links = input.links.into_iter().map(NewLink::into_link).collect();
        self.connections = dedup_ids(input.connections);
        self.modified = now;
    }

    pub fn summary(&self) -> TopicSummary {
        TopicSummary {
            id: self.id,
            title: self.title.clone(),
            category: self.category.clone(),
            status: self.status.clone(),
            connections: self.connections.clone(),
            created: self.created,
        }
    }

    /// Next free link id on this topic.
    pub fn next_link_id(&self) -> Result<i64> {
        next_link_id_after(self.links.iter().map(|l| l.id).max().unwrap_or(0))
    }

    /// Validate and append a link, assigning the next free id when none is given.
    pub fn add_link(&mut self, link: NewLink, now: DateTime<Utc>) -> Result<Link> {
        link.validate()?;
        let id = match link.requested_id() {
            Some(id) => id,
            None => self.next_link_id()?,
        };
        if self.links.iter().any(|l| l.id == id) {
            return Err(Error::Conflict(format!(
                "Link {} already exists on topic {}",
                id, self.id
            )));
        }
        let stored = NewLink {
            id: Some(id),
            ..link
        }
        .into_link();
        self.links.push(stored.clone());
        self.modified = now;
        Ok(stored)
    }

    /// Remove the link with `link_id`.
    pub fn remove_link(&mut self, link_id: i64, now: DateTime<Utc>) -> Result<()> {
        let before = self.links.len();
        self.links.retain(|l| l.id != link_id);
        if self.links.len() == before {
            return Err(Error::NotFound(format!(
                "Link {} on topic {}",
                link_id, self.id
            )));
        }
        self.modified = now;
        Ok(())
    }

    /// Fail when `first` and `second` name the same topic.
    pub fn ensure_distinct(first: i64, second: i64) -> Result<()> {
        if first == second {
            return Err(Error::InvalidInput(
                "A topic cannot be connected to itself".to_string(),
            ));
        }
        Ok(())
    }

    /// Add `other` to connections unless already present. Returns true if added.
    pub fn connect_to(&mut self, other: i64) -> bool {
        if self.connections.contains(&other) {
            return false;
        }
        self.connections.push(other);
        true
    }

    /// Remove `other` from connections. Returns true if it was present.
    pub fn disconnect_from(&mut self, other: i64) -> bool {
        let before = self.connections.len();
        self.connections.retain(|&c| c != other);
        before != self.connections.len()
    }
}

/// Topic fields returned by category listings (no value, no links).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TopicSummary {
    pub id: i64,
    pub title: String,
    pub category: Option<String>,
    pub status: Option<String>,
    pub connections: Vec<i64>,
    pub created: DateTime<Utc>,
}

/// Id and title pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TopicTitle {
    pub id: i64,
    pub title: String,
}

/// Body for creating or replacing a topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TopicInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub value: String,
    pub category: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub links: Vec<NewLink>,
    #[serde(default)]
    pub connections: Vec<i64>,
}

impl TopicInput {
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_connections(mut self, connections: Vec<i64>) -> Self {
        self.connections = connections;
        self
    }

    /// Check the topic structure.
    ///
    /// Title and value are required. Links are numbered in order when they
    /// carry no id, so after validation every link has a unique positive id.
    pub fn validate(&mut self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Not correct topic structure: title is required".to_string(),
            ));
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(Error::InvalidInput(format!(
                "Not correct topic structure: title must be {} characters or less",
                MAX_TITLE_LEN
            )));
        }
        if self.value.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Not correct topic structure: value is required".to_string(),
            ));
        }
        if let Some(bad) = self.connections.iter().find(|&&c| c <= 0) {
            return Err(Error::InvalidInput(format!(
                "Not correct topic structure: connection id {} should be more than 0",
                bad
            )));
        }

        for link in &self.links {
            link.validate()?;
        }
        let mut next_id = self
            .links
            .iter()
            .filter_map(NewLink::requested_id)
            .max()
            .unwrap_or(0);
        let mut seen = std::collections::HashSet::new();
        for link in &mut self.links {
            let id = match link.requested_id() {
                Some(id) => id,
                None => {
                    next_id = next_link_id_after(next_id)?;
                    next_id
                }
            };
            link.id = Some(id);
            if !seen.insert(id) {
                return Err(Error::InvalidInput(format!(
                    "Not correct topic structure: duplicate link id {}",
                    id
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// LINK TYPES
// =============================================================================

/// External reference attached to a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Link {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// A link as submitted by a client. The id is assigned when absent or 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NewLink {
    pub id: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
}

impl NewLink {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Bad parameter: link url is required".to_string(),
            ));
        }
        if self.url.len() > MAX_LINK_URL_LEN {
            return Err(Error::InvalidInput(format!(
                "Bad parameter: link url must be {} bytes or less",
                MAX_LINK_URL_LEN
            )));
        }
        if let Some(id) = self.id {
            if id < 0 {
                return Err(Error::InvalidInput(
                    "Bad parameter: link id should not be negative".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The id the client asked for. 0 counts as absent.
    pub fn requested_id(&self) -> Option<i64> {
        self.id.filter(|&id| id > 0)
    }

    /// Convert to a stored link. A missing id becomes 0; callers assign ids first.
    pub fn into_link(self) -> Link {
        Link {
            id: self.id.unwrap_or(0),
            kind: self.kind,
            url: self.url,
            title: self.title,
        }
    }
}

// =============================================================================
// LISTING
// =============================================================================

/// Request for listing topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListTopicsRequest {
    /// Maximum results
    pub count: i64,
    /// Pagination offset
    pub offset: i64,
    /// Exact category filter
    pub category: Option<String>,
}

impl Default for ListTopicsRequest {
    fn default() -> Self {
        Self {
            count: crate::defaults::PAGE_SIZE,
            offset: 0,
            category: None,
        }
    }
}

/// The id following `current`, or an error once ids are exhausted.
fn next_link_id_after(current: i64) -> Result<i64> {
    current
        .max(0)
        .checked_add(1)
        .ok_or_else(|| Error::Conflict("No free link id left on this topic".to_string()))
}

fn dedup_ids(ids: Vec<i64>) -> Vec<i64> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
