//! Centralized default constants for kgraph.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic numbers.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default number of topics returned by list endpoints.
pub const PAGE_SIZE: i64 = 10;

/// Upper bound for `count` on list endpoints.
pub const PAGE_SIZE_MAX: i64 = 100;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;

/// Maximum hits returned by title search.
pub const SEARCH_LIMIT: i64 = 100;

/// Maximum ids accepted by a single titles lookup.
pub const TITLES_MAX_IDS: usize = 500;

// =============================================================================
// VALIDATION
// =============================================================================

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 512;

/// Maximum link url length in bytes.
pub const MAX_LINK_URL_LEN: usize = 4096;

// =============================================================================
// SERVER
// =============================================================================

/// Default bind host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const SERVER_PORT: u16 = 3000;

/// Default request body limit (1 MB).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Default rate limit: requests per period.
pub const RATE_LIMIT_REQUESTS: u32 = 100;

/// Default rate limit period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Default PostgreSQL URL.
pub const DATABASE_URL: &str = "postgres://localhost/kgraph";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_within_max() {
        assert!(PAGE_SIZE > 0);
        assert!(PAGE_SIZE <= PAGE_SIZE_MAX);
        assert!(SEARCH_LIMIT <= PAGE_SIZE_MAX);
    }
}
