//! PostgreSQL topic repository.
//!
//! Each topic is one row. Links live in a JSONB array and connections in a
//! `BIGINT[]` that is mirrored on both connected rows. Every mutation that
//! touches more than one row runs in a single transaction and locks the rows
//! it needs with `FOR UPDATE`, always in ascending id order.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info};

use kgraph_core::{
    Error, Link, ListTopicsRequest, NewLink, Result, Topic, TopicInput, TopicRepository,
    TopicTitle,
};

use crate::escape_like;

/// How often update and delete retry when a topic's connections change
/// while its rows are being locked.
const LOCK_ATTEMPTS: usize = 3;

const TOPIC_COLUMNS: &str =
    "id, title, value, category, status, links, connections, created_at_utc, modified_at_utc";

/// PostgreSQL implementation of TopicRepository.
#[derive(Clone)]
pub struct PgTopicRepository {
    pool: Pool<Postgres>,
}

impl PgTopicRepository {
    /// Create a new PgTopicRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Lock the given topics for the rest of the transaction.
    ///
    /// Missing ids are silently absent from the result.
    async fn lock_topics(tx: &mut Transaction<'_, Postgres>, ids: &[i64]) -> Result<Vec<Topic>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let sql = format!(
            "SELECT {} FROM topic WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            TOPIC_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(map_topic).collect()
    }

    /// Lock one topic and return its current row.
    async fn lock_topic(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<Topic> {
        let sql = format!("SELECT {} FROM topic WHERE id = $1 FOR UPDATE", TOPIC_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::TopicNotFound(id))?;
        map_topic(&row)
    }

    /// Ids connected to `id` in either direction, read without locking.
    async fn neighbour_ids(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<Vec<i64>> {
        sqlx::query_scalar(
            "SELECT unnest(connections) FROM topic WHERE id = $1
             UNION
             SELECT id FROM topic WHERE $1 = ANY(connections)",
        )
        .bind(id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)
    }

    /// Begin a transaction holding locks on `id`, its neighbours and `extra`.
    ///
    /// Rows are locked in ascending id order. The neighbour set is read before
    /// locking, so a connect committed in between can grow it; that is checked
    /// once `id` is locked and the transaction starts over.
    async fn begin_locked(
        &self,
        id: i64,
        extra: &[i64],
    ) -> Result<(Transaction<'static, Postgres>, Vec<Topic>)> {
        for attempt in 1..=LOCK_ATTEMPTS {
            let mut tx = self.pool.begin().await.map_err(Error::Database)?;

            let mut wanted = Self::neighbour_ids(&mut tx, id).await?;
            wanted.push(id);
            wanted.extend_from_slice(extra);
            let locked = Self::lock_topics(&mut tx, &wanted).await?;
            if !locked.iter().any(|t| t.id == id) {
                return Err(Error::TopicNotFound(id));
            }

            let current = Self::neighbour_ids(&mut tx, id).await?;
            if current.iter().all(|n| wanted.contains(n)) {
                return Ok((tx, locked));
            }

            tx.rollback().await.map_err(Error::Database)?;
            debug!(
                subsystem = "db",
                component = "pg_topics",
                topic_id = id,
                attempt = attempt,
                "Connections changed while locking, retrying"
            );
        }
        Err(Error::Conflict(format!(
            "Topic {} is being modified concurrently",
            id
        )))
    }

    /// Add `id` to the connections of every topic in `targets`.
    async fn attach(
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        targets: &[i64],
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if targets.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE topic SET connections = array_append(connections, $1), modified_at_utc = $2
             WHERE id = ANY($3) AND NOT ($1 = ANY(connections))",
        )
        .bind(id)
        .bind(now)
        .bind(targets.to_vec())
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    /// Remove `id` from the connections of every topic in `targets`.
    async fn detach(
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        targets: &[i64],
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if targets.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE topic SET connections = array_remove(connections, $1), modified_at_utc = $2
             WHERE id = ANY($3) AND $1 = ANY(connections)",
        )
        .bind(id)
        .bind(now)
        .bind(targets.to_vec())
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn save_links(
        tx: &mut Transaction<'_, Postgres>,
        topic: &Topic,
    ) -> Result<()> {
        sqlx::query("UPDATE topic SET links = $2, modified_at_utc = $3 WHERE id = $1")
            .bind(topic.id)
            .bind(Json(topic.links.clone()))
            .bind(topic.modified)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

fn map_topic(row: &PgRow) -> Result<Topic> {
    let links: Json<Vec<Link>> = row.try_get("links").map_err(Error::Database)?;
    Ok(Topic {
        id: row.try_get("id").map_err(Error::Database)?,
        title: row.try_get("title").map_err(Error::Database)?,
        value: row.try_get("value").map_err(Error::Database)?,
        category: row.try_get("category").map_err(Error::Database)?,
        status: row.try_get("status").map_err(Error::Database)?,
        links: links.0,
        connections: row.try_get("connections").map_err(Error::Database)?,
        created: row.try_get("created_at_utc").map_err(Error::Database)?,
        modified: row.try_get("modified_at_utc").map_err(Error::Database)?,
    })
}

fn require_all(found: &[Topic], wanted: &[i64]) -> Result<()> {
    match wanted.iter().find(|w| !found.iter().any(|t| t.id == **w)) {
        Some(missing) => Err(Error::TopicNotFound(*missing)),
        None => Ok(()),
    }
}

#[async_trait]
impl TopicRepository for PgTopicRepository {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn list(&self, req: ListTopicsRequest) -> Result<Vec<Topic>> {
        let start = Instant::now();
        let sql = format!(
            "SELECT {} FROM topic
             WHERE ($1::text IS NULL OR category = $1)
             ORDER BY created_at_utc DESC, id DESC
             LIMIT $2 OFFSET $3",
            TOPIC_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(req.category.as_deref())
            .bind(req.count)
            .bind(req.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let topics = rows.iter().map(map_topic).collect::<Result<Vec<_>>>()?;
        debug!(
            subsystem = "db",
            component = "pg_topics",
            op = "list",
            count = req.count,
            offset = req.offset,
            category = req.category.as_deref().unwrap_or(""),
            result_count = topics.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Listed topics"
        );
        Ok(topics)
    }

    async fn fetch(&self, id: i64) -> Result<Topic> {
        let sql = format!("SELECT {} FROM topic WHERE id = $1", TOPIC_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::TopicNotFound(id))?;
        map_topic(&row)
    }

    async fn insert(&self, mut input: TopicInput) -> Result<i64> {
        input.validate()?;
        let now = Utc::now();
        let topic = Topic::from_input(0, input, now);

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        if !topic.connections.is_empty() {
            let found = Self::lock_topics(&mut tx, &topic.connections).await?;
            require_all(&found, &topic.connections)?;
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO topic (title, value, category, status, links, connections, created_at_utc, modified_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING id",
        )
        .bind(&topic.title)
        .bind(&topic.value)
        .bind(&topic.category)
        .bind(&topic.status)
        .bind(Json(topic.links.clone()))
        .bind(topic.connections.clone())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let mirrored = Self::attach(&mut tx, id, &topic.connections, now).await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "pg_topics",
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

        let (mut tx, locked) = self.begin_locked(id, &input.connections).await?;
        let mut topic = locked
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(Error::TopicNotFound(id))?;
        require_all(&locked, &input.connections)?;

        let previous = topic.connections.clone();
        topic.apply(input, now);

        let removed: Vec<i64> = previous
            .iter()
            .filter(|c| !topic.connections.contains(c))
            .copied()
            .collect();
        let detached = Self::detach(&mut tx, id, &removed, now).await?;
        let attached = Self::attach(&mut tx, id, &topic.connections, now).await?;

        sqlx::query(
            "UPDATE topic SET title = $2, value = $3, category = $4, status = $5,
                links = $6, connections = $7, modified_at_utc = $8
             WHERE id = $1",
        )
        .bind(id)
        .bind(&topic.title)
        .bind(&topic.value)
        .bind(&topic.category)
        .bind(&topic.status)
        .bind(Json(topic.links.clone()))
        .bind(topic.connections.clone())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "pg_topics",
            op = "update",
            topic_id = id,
            attached = attached,
            detached = detached,
            "Topic updated"
        );
        Ok(topic)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let now = Utc::now();
        let (mut tx, _) = self.begin_locked(id, &[]).await?;

        // Catches one-sided references too, not only the recorded connections.
        let detached = sqlx::query(
            "UPDATE topic SET connections = array_remove(connections, $1), modified_at_utc = $2
             WHERE $1 = ANY(connections)",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        sqlx::query("DELETE FROM topic WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "pg_topics",
            op = "delete",
            topic_id = id,
            affected_count = detached,
            "Topic deleted"
        );
        Ok(())
    }

    async fn titles(&self, ids: &[i64]) -> Result<Vec<TopicTitle>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT id, title FROM topic WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut by_id: HashMap<i64, String> = HashMap::with_capacity(rows.len());
        for row in rows {
            by_id.insert(
                row.try_get("id").map_err(Error::Database)?,
                row.try_get("title").map_err(Error::Database)?,
            );
        }

        let mut titles = Vec::with_capacity(by_id.len());
        for id in ids {
            if let Some(title) = by_id.remove(id) {
                titles.push(TopicTitle { id: *id, title });
            }
        }
        Ok(titles)
    }

    async fn search_title(&self, substring: &str, limit: i64) -> Result<Vec<Topic>> {
        let pattern = format!("%{}%", escape_like(substring));
        let sql = format!(
            "SELECT {} FROM topic
             WHERE title ILIKE $1
             ORDER BY created_at_utc DESC, id DESC
             LIMIT $2",
            TOPIC_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(map_topic).collect()
    }

    async fn connect(&self, first: i64, second: i64) -> Result<()> {
        Topic::ensure_distinct(first, second)?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let locked = Self::lock_topics(&mut tx, &[first, second]).await?;
        require_all(&locked, &[first, second])?;

        Self::attach(&mut tx, first, &[second], now).await?;
        Self::attach(&mut tx, second, &[first], now).await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "pg_topics",
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
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let locked = Self::lock_topics(&mut tx, &[first, second]).await?;
        require_all(&locked, &[first, second])?;

        Self::detach(&mut tx, first, &[second], now).await?;
        Self::detach(&mut tx, second, &[first], now).await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "pg_topics",
            op = "disconnect",
            topic_id = first,
            other_topic_id = second,
            "Topics disconnected"
        );
        Ok(())
    }

    async fn add_link(&self, id: i64, link: NewLink) -> Result<Link> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let mut topic = Self::lock_topic(&mut tx, id).await?;
        let stored = topic.add_link(link, Utc::now())?;
        Self::save_links(&mut tx, &topic).await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "pg_topics",
            op = "add_link",
            topic_id = id,
            link_id = stored.id,
            "Link added"
        );
        Ok(stored)
    }

    async fn remove_link(&self, id: i64, link_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let mut topic = Self::lock_topic(&mut tx, id).await?;
        topic.remove_link(link_id, Utc::now())?;
        Self::save_links(&mut tx, &topic).await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "pg_topics",
            op = "remove_link",
            topic_id = id,
            link_id = link_id,
            "Link removed"
        );
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topic")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_all_reports_first_missing() {
        let now = Utc::now();
        let found = vec![Topic::from_input(1, TopicInput::new("a", "b"), now)];
        assert!(require_all(&found, &[1]).is_ok());
        match require_all(&found, &[1, 4, 5]) {
            Err(Error::TopicNotFound(id)) => assert_eq!(id, 4),
            other => panic!("expected TopicNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_topic_columns_cover_mapping() {
        for column in [
            "links",
            "connections",
            "created_at_utc",
            "modified_at_utc",
        ] {
            assert!(TOPIC_COLUMNS.contains(column));
        }
    }
}
