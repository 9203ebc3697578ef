//! # kgraph-db
//!
//! Topic stores for kgraph.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgTopicRepository`], topics as PostgreSQL rows with JSONB links
//! - [`MemoryTopicRepository`], an in-process document store
//! - [`open_store`] to pick one from configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use kgraph_db::{Database, PoolConfig, TopicInput, TopicRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/kgraph", &PoolConfig::default()).await?;
//!
//!     let id = db.topics.insert(TopicInput::new("Rust", "A systems language")).await?;
//!     println!("Created topic: {}", id);
//!     Ok(())
//! }
//! ```
pub mod memory;
pub mod pool;
pub mod store;
pub mod topics;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use kgraph_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use memory::MemoryTopicRepository;
pub use pool::{connect_pool, PoolConfig};
pub use store::{open_store, StoreBackend, StoreConfig};
pub use topics::PgTopicRepository;

/// PostgreSQL database context.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Topic repository.
    pub topics: PgTopicRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            topics: PgTopicRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to `url` with the given pool settings.
    pub async fn connect(url: &str, config: &PoolConfig) -> Result<Self> {
        let pool = connect_pool(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }
}
