//! Server configuration from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `3000` |
//! | `STORE_BACKEND` | `postgres` (`memory` for an in-process store) |
//! | `DATABASE_URL` | `postgres://localhost/kgraph` |
//! | `DATABASE_MAX_CONNECTIONS` | `10` |
//! | `DATABASE_ACQUIRE_TIMEOUT_SECS` | `30` |
//! | `RUN_MIGRATIONS` | `true` |
//! | `ALLOWED_ORIGINS` | `http://localhost:3000` |
//! | `RATE_LIMIT_ENABLED` | `true` |
//! | `RATE_LIMIT_REQUESTS` | `100` |
//! | `RATE_LIMIT_PERIOD_SECS` | `60` |
//! | `MAX_BODY_BYTES` | `1048576` |

use std::str::FromStr;
use std::time::Duration;

use kgraph_core::defaults;
use kgraph_core::{Error, Result};
use kgraph_db::{PoolConfig, StoreBackend, StoreConfig};

/// Origins allowed when `ALLOWED_ORIGINS` is unset or empty.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000"];

/// Global request rate limiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests: u32,
    pub period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: defaults::RATE_LIMIT_REQUESTS,
            period_secs: defaults::RATE_LIMIT_PERIOD_SECS,
        }
    }
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreConfig,
    pub allowed_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    pub max_body_bytes: usize,
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("STORE_BACKEND") {
            Some(raw) if !raw.trim().is_empty() => raw.parse::<StoreBackend>()?,
            _ => StoreBackend::default(),
        };

        let pool_defaults = PoolConfig::default();
        let pool = PoolConfig {
            max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                pool_defaults.max_connections,
            )?,
            acquire_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                pool_defaults.acquire_timeout.as_secs(),
            )?),
        };
        let store = StoreConfig {
            backend,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| defaults::DATABASE_URL.to_string()),
            pool,
            run_migrations: parse_bool(&lookup, "RUN_MIGRATIONS", true),
        };

        let rate_limit = RateLimitConfig {
            enabled: parse_bool(&lookup, "RATE_LIMIT_ENABLED", true),
            requests: parse_or(&lookup, "RATE_LIMIT_REQUESTS", defaults::RATE_LIMIT_REQUESTS)?,
            period_secs: parse_or(
                &lookup,
                "RATE_LIMIT_PERIOD_SECS",
                defaults::RATE_LIMIT_PERIOD_SECS,
            )?,
        };
        if rate_limit.enabled && (rate_limit.requests == 0 || rate_limit.period_secs == 0) {
            return Err(Error::Config(
                "RATE_LIMIT_REQUESTS and RATE_LIMIT_PERIOD_SECS must be non-zero".to_string(),
            ));
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| defaults::SERVER_HOST.to_string()),
            port: parse_or(&lookup, "PORT", defaults::SERVER_PORT)?,
            store,
            allowed_origins: parse_origins(lookup("ALLOWED_ORIGINS").as_deref()),
            rate_limit,
            max_body_bytes: parse_or(&lookup, "MAX_BODY_BYTES", defaults::MAX_BODY_BYTES)?,
        })
    }

    /// Configuration for tests: in-memory store, no rate limiting.
    pub fn for_memory_store() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            store: StoreConfig::memory(),
            allowed_origins: parse_origins(None),
            rate_limit: RateLimitConfig {
                enabled: false,
                ..Default::default()
            },
            max_body_bytes: defaults::MAX_BODY_BYTES,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid {} '{}': {}", key, raw, e))),
        _ => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

/// Split a comma-separated origin list. Empty input yields the defaults.
pub fn parse_origins(raw: Option<&str>) -> Vec<String> {
    let origins: Vec<String> = raw
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() {
        DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect()
    } else {
        origins
    }
}
