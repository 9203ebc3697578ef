//! PostgreSQL pool for the topic store.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use kgraph_core::{Error, Result};

/// Pool sizing and timeouts, set from `DATABASE_MAX_CONNECTIONS` and
/// `DATABASE_ACQUIRE_TIMEOUT_SECS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// How long a request waits for a free connection before failing.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Connect a pool to `database_url`.
///
/// Connects eagerly, so an unreachable database fails at startup instead of
/// on the first request.
pub async fn connect_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    if config.max_connections == 0 {
        return Err(Error::Config(
            "DATABASE_MAX_CONNECTIONS must be at least 1".to_string(),
        ));
    }
    let start = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database pool connected"
    );
    Ok(pool)
}
