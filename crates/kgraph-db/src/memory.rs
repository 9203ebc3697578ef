//! In-process topic store.
//!
//! Topics are kept as documents in a map keyed by id. All mutations take the
//! single write lock, so updates spanning two documents are atomic with
//! respect to concurrent requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use kgraph_core::{
    Error, Link, ListTopicsRequest, NewLink, Result, Topic, TopicInput, TopicRepository,
    TopicTitle,
};

#[derive(Debug, Default)]
struct MemoryState {
    topics: BTreeMap<i64, Topic>,
    last_id: i64,
}

impl MemoryState {
    fn require(&self, id: i64) -> Result<()> {
        if self.topics.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::TopicNotFound(id))
        }
    }

    fn get_mut(&mut self, id: i64) -> Result<&mut Topic> {
        self.topics.get_mut(&id).ok_or(Error::TopicNotFound(id))
    }

    /// Add `id` to the connections of each target. Returns how many changed.
    fn attach(&mut self, id: i64, targets: &[i64], now: chrono::DateTime<Utc>) -> usize {
        let mut changed = 0;
        for target in targets {
            if let Some(topic) = self.topics.get_mut(target) {
                if topic.connect_to(id) {
                    topic.modified = now;
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Remove `id` from the connections of each target. Returns how many changed.
    fn detach(&mut self, id: i64, targets: &[i64], now: chrono::DateTime<Utc>) -> usize {
        let mut changed = 0;
        for target in targets {
            if let Some(topic) = self.topics.get_mut(target) {
                if topic.disconnect_from(id) {
                    topic.modified = now;
                    changed += 1;
                }
            }
        }
        changed
    }
}

/// Newest first, ties broken by id.
fn newest_first(a: &Topic, b: &Topic) -> std::cmp::Ordering {
    b.created.cmp(&a.created).then(b.id.cmp(&a.id))
}

/// In-memory implementation of TopicRepository.
#[derive(Debug, Clone, Default)]
pub struct MemoryTopicRepository {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryTopicRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TopicRepository for MemoryTopicRepository {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list(&self, req: ListTopicsRequest) -> Result<Vec<Topic>> {
        let state = self.state.read().await;
        let mut topics: Vec<&Topic> = state
            .topics
            .values()
            .filter(|t| match &req.category {
                Some(category) => t.category.as_deref() == Some(category.as_str()),
                None => true,
            })
            .collect();
        topics.sort_by(|a, b| newest_first(a, b));

        let result: Vec<Topic> = topics
            .into_iter()
            .skip(req.offset.max(0) as usize)
            .take(req.count.max(0) as usize)
            .cloned()
            .collect();

        debug!(
            subsystem = "db",
            component = "memory_topics",
            op = "list",
            result_count = result.len(),
            "Listed topics"
        );
        Ok(result)
    }

    async fn fetch(&self, id: i64) -> Result<Topic> {
        let state = self.state.read().await;
        state.topics.get(&id).cloned().ok_or(Error::TopicNotFound(id))
    }

    async fn insert(&self, mut input: TopicInput) -> Result<i64> {
        input.validate()?;
        let now = Utc::now();

        let mut state = self.state.write().await;
        for target in &input.connections {
            state.require(*target)?;
        }

        state.last_id += 1;
        let id = state.last_id;
        let topic = Topic::from_input(id, input, now);
        let mirrored = state.attach(id, &topic.connections, now);
        state.topics.insert(id, topic);

        info!(
            subsystem = "db",
            component = "memory_topics",
            op = "insert",
            topic_id = id,
            affected_count = mirrored,
            "Topic created"
        );
        Ok(id)
    }

    async fn update(&self, id: i64, mut input: TopicInput) -> Result<Topic> {
        input.validate()?;
        for target in &input.connections {
            Topic::ensure_distinct(id, *target)?;
        }
        let now = Utc::now();

        let mut state = self.state.write().await;
        state.require(id)?;
        for target in &input.connections {
            state.require(*target)?;
        }

        let topic = state.get_mut(id)?;
        let previous = topic.connections.clone();
        topic.apply(input, now);
        let updated = topic.clone();

        let removed: Vec<i64> = previous
            .into_iter()
            .filter(|c| !updated.connections.contains(c))
            .collect();
        let detached = state.detach(id, &removed, now);
        let attached = state.attach(id, &updated.connections, now);

        info!(
            subsystem = "db",
            component = "memory_topics",
            op = "update",
            topic_id = id,
            attached = attached,
            detached = detached,
            "Topic updated"
        );
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        state.topics.remove(&id).ok_or(Error::TopicNotFound(id))?;

        let mut detached = 0;
        for topic in state.topics.values_mut() {
            if topic.disconnect_from(id) {
                topic.modified = now;
                detached += 1;
            }
        }

        info!(
            subsystem = "db",
            component = "memory_topics",
            op = "delete",
            topic_id = id,
            affected_count = detached,
            "Topic deleted"
        );
        Ok(())
    }

    async fn titles(&self, ids: &[i64]) -> Result<Vec<TopicTitle>> {
        let state = self.state.read().await;
        let mut seen = Vec::with_capacity(ids.len());
        let mut titles = Vec::with_capacity(ids.len());
        for id in ids {
            if seen.contains(id) {
                continue;
            }
            seen.push(*id);
            if let Some(topic) = state.topics.get(id) {
                titles.push(TopicTitle {
                    id: topic.id,
                    title: topic.title.clone(),
                });
            }
        }
        Ok(titles)
    }

    async fn search_title(&self, substring: &str, limit: i64) -> Result<Vec<Topic>> {
        let needle = substring.to_lowercase();
        let state = self.state.read().await;
        let mut hits: Vec<&Topic> = state
            .topics
            .values()
            .filter(|t| t.title.to_lowercase().contains(&needle))
            .collect();
        hits.sort_by(|a, b| newest_first(a, b));
        Ok(hits
            .into_iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn connect(&self, first: i64, second: i64) -> Result<()> {
        Topic::ensure_distinct(first, second)?;
        let now = Utc::now();
        let mut state = self.state.write().await;
        state.require(first)?;
        state.require(second)?;

        state.attach(first, &[second], now);
        state.attach(second, &[first], now);

        info!(
            subsystem = "db",
            component = "memory_topics",
            op = "connect",
            topic_id = first,
            other_topic_id = second,
            "Topics connected"
        );
        Ok(())
    }

    async fn disconnect(&self, first: i64, second: i64) -> Result<()> {
        Topic::ensure_distinct(first, second)?;
        let now = Utc::now();
        let mut state = self.state.write().await;
        state.require(first)?;
        state.require(second)?;

        state.detach(first, &[second], now);
        state.detach(second, &[first], now);

        info!(
            subsystem = "db",
            component = "memory_topics",
            op = "disconnect",
            topic_id = first,
            other_topic_id = second,
            "Topics disconnected"
        );
        Ok(())
    }

    async fn add_link(&self, id: i64, link: NewLink) -> Result<Link> {
        let mut state = self.state.write().await;
        let stored = state.get_mut(id)?.add_link(link, Utc::now())?;
        info!(
            subsystem = "db",
            component = "memory_topics",
            op = "add_link",
            topic_id = id,
            link_id = stored.id,
            "Link added"
        );
        Ok(stored)
    }

    async fn remove_link(&self, id: i64, link_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        state.get_mut(id)?.remove_link(link_id, Utc::now())?;
        info!(
            subsystem = "db",
            component = "memory_topics",
            op = "remove_link",
            topic_id = id,
            link_id = link_id,
            "Link removed"
        );
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.state.read().await.topics.len() as i64)
    }
}
