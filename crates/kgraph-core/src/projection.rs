//! Field projection for topic responses.
//!
//! Clients pass `fields=title.value` to receive only some top-level fields.
//! The topic id is always returned.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::trace;

use crate::error::Result;

/// Top-level topic fields that can be selected.
pub const TOPIC_FIELDS: &[&str] = &[
    "id",
    "title",
    "value",
    "category",
    "status",
    "links",
    "connections",
    "created",
    "modified",
];

/// A parsed `fields` selector. `All` keeps every field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldSelection {
    #[default]
    All,
    Only(Vec<String>),
}

impl FieldSelection {
    /// Parse a dot-separated field list. Unknown names are dropped; if none
    /// remain the selection falls back to all fields.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return FieldSelection::All;
        };

        let mut fields: Vec<String> = Vec::new();
        for name in raw.split('.').map(str::trim).filter(|s| !s.is_empty()) {
            if !TOPIC_FIELDS.contains(&name) {
                trace!(field = name, "Ignoring unknown projection field");
                continue;
            }
            if !fields.iter().any(|f| f == name) {
                fields.push(name.to_string());
            }
        }

        if fields.is_empty() {
            FieldSelection::All
        } else {
            FieldSelection::Only(fields)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, FieldSelection::All)
    }

    /// Serialize `item` and keep only the selected fields (plus `id`).
    pub fn apply<T: Serialize>(&self, item: &T) -> Result<JsonValue> {
        let value = serde_json::to_value(item)?;
        let fields = match self {
            FieldSelection::All => return Ok(value),
            FieldSelection::Only(fields) => fields,
        };

        let JsonValue::Object(object) = value else {
            return Ok(value);
        };

        let projected: Map<String, JsonValue> = object
            .into_iter()
            .filter(|(key, _)| key == "id" || fields.iter().any(|f| f == key))
            .collect();
        Ok(JsonValue::Object(projected))
    }

    /// Apply the selection to every item of a slice.
    pub fn apply_all<T: Serialize>(&self, items: &[T]) -> Result<Vec<JsonValue>> {
        items.iter().map(|item| self.apply(item)).collect()
    }
}
