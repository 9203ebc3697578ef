//! Store backend selection.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use kgraph_core::{Error, Result, TopicRepository};

use crate::{Database, MemoryTopicRepository, PoolConfig};

/// Which topic store to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(Error::Config(format!(
                "unknown store backend '{}', expected 'postgres' or 'memory'",
                other
            ))),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Postgres => f.write_str("postgres"),
            StoreBackend::Memory => f.write_str("memory"),
        }
    }
}

/// Settings needed to open a store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: String,
    pub pool: PoolConfig,
    /// Apply pending migrations after connecting (PostgreSQL only).
    pub run_migrations: bool,
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: String::new(),
            pool: PoolConfig::default(),
            run_migrations: false,
        }
    }
}

/// Open the configured store.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn TopicRepository>> {
    match config.backend {
        StoreBackend::Memory => {
            info!(subsystem = "db", backend = "memory", "Using in-memory topic store");
            Ok(Arc::new(MemoryTopicRepository::new()))
        }
        StoreBackend::Postgres => {
            info!(subsystem = "db", backend = "postgres", "Connecting to database...");
            let db = Database::connect(&config.database_url, &config.pool).await?;
            if config.run_migrations {
                #[cfg(feature = "migrations")]
                {
                    info!(subsystem = "db", "Running database migrations...");
                    db.migrate().await?;
                    info!(subsystem = "db", "Database migrations complete");
                }
                #[cfg(not(feature = "migrations"))]
                tracing::warn!(
                    subsystem = "db",
                    "Migrations requested but the `migrations` feature is disabled"
                );
            }
            Ok(Arc::new(db.topics))
        }
    }
}
