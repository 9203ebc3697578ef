//! Structured logging field name constants for kgraph.
//!
//! All crates use these names for structured `tracing` fields so log
//! aggregation can query by the same keys across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), mutations |
//! | DEBUG | Decision points, query parameters |
//! | TRACE | Per-item iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the `x-request-id` header (UUIDv7).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event. Values: "api", "db".
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem. Examples: "pool", "pg_topics", "memory_topics".
pub const COMPONENT: &str = "component";

/// Logical operation name. Examples: "insert", "connect", "add_link".
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Topic id being operated on.
pub const TOPIC_ID: &str = "topic_id";

/// Second topic id in a connection operation.
pub const OTHER_TOPIC_ID: &str = "other_topic_id";

/// Link id on a topic.
pub const LINK_ID: &str = "link_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of topics touched by a cascading update.
pub const AFFECTED_COUNT: &str = "affected_count";
