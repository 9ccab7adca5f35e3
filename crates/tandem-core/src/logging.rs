//! Structured logging schema and field name constants for tandem.
//!
//! All crates use these constants for consistent structured logging fields.
//! This ensures log aggregation tools (Loki, Elasticsearch) can query by
//! standardized field names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (recipients, references) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "engine", "db", "worker", "fanout"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "dispatcher", "rollup", "pool", "worker"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "dispatch", "process", "claim_next", "fan_out"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Event UUID being processed.
pub const EVENT_ID: &str = "event_id";

/// Subject kind of the event being processed ("post", "comment", …).
pub const SUBJECT_KIND: &str = "subject_kind";

/// Event action variant ("created", "updated", …).
pub const ACTION: &str = "action";

/// Notification UUID being created or discarded.
pub const NOTIFICATION_ID: &str = "notification_id";

/// Recipient member UUID.
pub const MEMBER_ID: &str = "member_id";

/// Organization UUID scoping the event.
pub const ORGANIZATION_ID: &str = "organization_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of recipients computed for an event.
pub const RECIPIENT_COUNT: &str = "recipient_count";

/// Number of side effects produced by a processor run.
pub const EFFECT_COUNT: &str = "effect_count";

/// Number of outbound jobs enqueued.
pub const JOB_COUNT: &str = "job_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table or entity affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
