//! Query parameters and request bodies for the topic endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use kgraph_core::defaults::{PAGE_OFFSET, PAGE_SIZE, PAGE_SIZE_MAX};
use kgraph_core::{FieldSelection, ListTopicsRequest, NewLink};

use crate::error::ApiError;

/// Parse a path segment as a positive topic id.
pub fn parse_id(raw: &str, name: &str) -> Result<i64, ApiError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::bad_parameter(name)),
    }
}

/// Validate pagination and build a list request.
pub fn page_request(
    count: Option<i64>,
    offset: Option<i64>,
    category: Option<String>,
) -> Result<ListTopicsRequest, ApiError> {
    let count = count.unwrap_or(PAGE_SIZE);
    if !(1..=PAGE_SIZE_MAX).contains(&count) {
        return Err(ApiError::BadRequest(format!(
            "count must be between 1 and {}",
            PAGE_SIZE_MAX
        )));
    }
    let offset = offset.unwrap_or(PAGE_OFFSET);
    if offset < 0 {
        return Err(ApiError::BadRequest("offset must be >= 0".to_string()));
    }
    let category = category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    Ok(ListTopicsRequest {
        count,
        offset,
        category,
    })
}

/// Query for `GET /api/topic`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTopicsQuery {
    /// Page size (1-100, default 10)
    pub count: Option<i64>,
    /// Number of topics to skip
    pub offset: Option<i64>,
    /// Exact category filter
    pub category: Option<String>,
    /// Dot-separated field projection, e.g. `title.value`
    pub fields: Option<String>,
}

impl ListTopicsQuery {
    pub fn selection(&self) -> FieldSelection {
        FieldSelection::parse(self.fields.as_deref())
    }
}

/// Field projection only.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FieldsQuery {
    /// Dot-separated field projection, e.g. `title.value`
    pub fields: Option<String>,
}

impl FieldsQuery {
    pub fn selection(&self) -> FieldSelection {
        FieldSelection::parse(self.fields.as_deref())
    }
}

/// A topic id as sent by clients: a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(untagged)]
pub enum TopicIdValue {
    Number(i64),
    Text(String),
}

impl TopicIdValue {
    /// The id if it is a positive integer.
    pub fn as_id(&self) -> Option<i64> {
        let id = match self {
            TopicIdValue::Number(n) => *n,
            TopicIdValue::Text(s) => s.trim().parse().ok()?,
        };
        (id > 0).then_some(id)
    }
}

/// Body for `POST /api/topic/titles`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct TitlesBody {
    #[serde(default)]
    pub ids: Vec<TopicIdValue>,
}

impl TitlesBody {
    /// Valid ids, in order, invalid entries dropped.
    pub fn valid_ids(&self) -> Vec<i64> {
        self.ids.iter().filter_map(TopicIdValue::as_id).collect()
    }
}

/// Body for `POST /api/topic/category`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct CategoryBody {
    #[serde(default)]
    pub category: String,
    pub count: Option<i64>,
    pub offset: Option<i64>,
}

/// Body for `POST /api/topic/{id}/link`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct AddLinkBody {
    pub link: Option<NewLink>,
}

/// Response for a created topic.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreatedTopic {
    pub id: i64,
}
