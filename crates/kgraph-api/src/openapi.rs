//! OpenAPI document, served as JSON for Swagger UI and as YAML at `/openapi.yaml`.

use utoipa::OpenApi;

use kgraph_core::{Link, NewLink, Topic, TopicInput, TopicSummary, TopicTitle};

use crate::handlers::{system, topics};
use crate::query_types::{AddLinkBody, CategoryBody, CreatedTopic, TitlesBody, TopicIdValue};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "kgraph API",
        description = "Topics with links and bidirectional connections"
    ),
    paths(
        topics::list_topics,
        topics::get_topic,
        topics::create_topic,
        topics::update_topic,
        topics::delete_topic,
        topics::topic_titles,
        topics::search_topics,
        topics::category_topics,
        topics::connect_topics,
        topics::disconnect_topics,
        topics::add_link,
        topics::remove_link,
        system::health_check,
        system::rate_limit_status,
    ),
    components(schemas(
        Topic,
        TopicInput,
        TopicSummary,
        TopicTitle,
        Link,
        NewLink,
        TitlesBody,
        TopicIdValue,
        CategoryBody,
        AddLinkBody,
        CreatedTopic,
    )),
    tags(
        (name = "Topics", description = "Topic CRUD, titles, search and categories"),
        (name = "Connections", description = "Bidirectional topic connections"),
        (name = "Links", description = "External links attached to topics"),
        (name = "System", description = "Health checks and system info")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_topic_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/topic"));
        assert!(paths.contains_key("/api/topic/{id}"));
        assert!(paths.contains_key("/api/topic/{id}/connection/{other_id}"));
        assert!(paths.contains_key("/api/topic/{id}/link/{link_id}"));
        assert!(paths.contains_key("/health"));
    }

    #[test]
    fn test_document_renders_yaml() {
        let yaml = ApiDoc::openapi().to_yaml().unwrap();
        assert!(yaml.contains("kgraph API"));
    }
}
