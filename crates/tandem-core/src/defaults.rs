//! Centralized default constants for the tandem notification engine.
//!
//! **This module is the single source of truth** for all shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// TIMELINE ROLLUP
// =============================================================================

/// Window in which timeline entries by the same actor are merged or canceled
/// instead of appended. A pin followed by an unpin inside this window leaves
/// no timeline entries at all.
pub const ROLLUP_THRESHOLD_SECONDS: i64 = 60;

// =============================================================================
// EVENT WORKER
// =============================================================================

/// Polling interval when the event log has no unprocessed rows.
pub const WORKER_POLL_INTERVAL_MS: u64 = 500;

/// Maximum number of events processed concurrently by one worker.
pub const WORKER_MAX_CONCURRENT: usize = 4;

/// A claimed-but-unfinished event becomes claimable again after this long.
/// Keeps at-least-once delivery intact when a worker dies mid-run.
pub const WORKER_RECLAIM_AFTER_SECS: i64 = 300;

/// Default worker lifecycle broadcast channel capacity.
pub const WORKER_EVENT_CAPACITY: usize = 256;

// =============================================================================
// OUTBOUND JOBS
// =============================================================================

/// Default maximum retry count for failed outbound delivery jobs.
pub const JOB_MAX_RETRIES: i32 = 3;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for notification inbox listings.
pub const PAGE_LIMIT: i64 = 50;

/// Internal "fetch everything" limit for aggregation queries.
pub const INTERNAL_FETCH_LIMIT: i64 = 10_000;
