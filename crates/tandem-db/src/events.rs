//! Event log repository implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use uuid::Uuid;

use tandem_core::{
    defaults, new_v7, Error, Event, EventAction, EventRepository, RecordEventRequest, Result,
};

use crate::refs::{actor_from_row, actor_to_columns, subject_from_row};

/// PostgreSQL implementation of EventRepository.
///
/// The event log is append-only; the only mutable columns are the
/// `claimed_at` / `processed_at` bookkeeping pair the worker maintains.
/// Claims use `FOR UPDATE SKIP LOCKED` so multiple workers never block on
/// each other, and a claim older than the reclaim window becomes claimable
/// again to preserve at-least-once delivery when a worker dies mid-run.
pub struct PgEventRepository {
    pool: Pool<Postgres>,
    /// Notify handle for event-driven worker wake.
    notify: Arc<Notify>,
}

impl PgEventRepository {
    /// Create a new PgEventRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Create a new PgEventRepository sharing an existing notify handle.
    pub fn with_notify(pool: Pool<Postgres>, notify: Arc<Notify>) -> Self {
        Self { pool, notify }
    }

    /// Get the notification handle for event-driven worker waking.
    pub fn event_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    fn parse_event_row(row: sqlx::postgres::PgRow) -> Event {
        let action: String = row.get("action");
        let changes: Option<serde_json::Value> = row.get("changes");
        Event {
            id: row.get("id"),
            actor: actor_from_row(&row, "actor_kind", "actor_id"),
            subject: subject_from_row(&row, "subject_kind", "subject_id"),
            organization_id: row.get("organization_id"),
            action: EventAction::parse(&action).unwrap_or(EventAction::Created),
            changes: changes
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default(),
            occurred_at: row.get("occurred_at"),
            skip_notifications: row.get("skip_notifications"),
            processed_at: row.get("processed_at"),
        }
    }

    const COLUMNS: &'static str = "id, actor_kind, actor_id, subject_kind, subject_id, \
         organization_id, action, changes, occurred_at, skip_notifications, processed_at";
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn record(&self, req: RecordEventRequest) -> Result<Event> {
        let id = new_v7();
        let now = Utc::now();
        let (actor_kind, actor_id) = actor_to_columns(&req.actor);
        let changes = if req.changes.is_empty() {
            None
        } else {
            Some(serde_json::to_value(&req.changes)?)
        };

        let row = sqlx::query(&format!(
            "INSERT INTO events (id, actor_kind, actor_id, subject_kind, subject_id, \
                                 organization_id, action, changes, occurred_at, skip_notifications)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {}",
            Self::COLUMNS
        ))
        .bind(id)
        .bind(actor_kind)
        .bind(actor_id)
        .bind(req.subject.kind.as_str())
        .bind(req.subject.id)
        .bind(req.organization_id)
        .bind(req.action.as_str())
        .bind(&changes)
        .bind(now)
        .bind(req.skip_notifications)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.notify.notify_waiters();
        Ok(Self::parse_event_row(row))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Event>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM events WHERE id = $1",
            Self::COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_event_row))
    }

    async fn claim_next_unprocessed(&self) -> Result<Option<Event>> {
        let now = Utc::now();
        let reclaim_cutoff = now - Duration::seconds(defaults::WORKER_RECLAIM_AFTER_SECS);

        let row = sqlx::query(&format!(
            "UPDATE events
             SET claimed_at = $1
             WHERE id = (
                 SELECT id FROM events
                 WHERE processed_at IS NULL
                   AND (claimed_at IS NULL OR claimed_at < $2)
                 ORDER BY occurred_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {}",
            Self::COLUMNS
        ))
        .bind(now)
        .bind(reclaim_cutoff)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_event_row))
    }

    async fn mark_processed(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE events SET processed_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn unprocessed_count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events WHERE processed_at IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count.0)
    }
}
