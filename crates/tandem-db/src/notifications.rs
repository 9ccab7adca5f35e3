//! Notification store implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tandem_core::{
    new_v7, CreateNotificationRequest, Error, Notification, NotificationReason,
    NotificationRepository, Result, SubjectRef,
};

use crate::refs::{opt_subject_from_row, subject_from_row};

/// PostgreSQL implementation of NotificationRepository.
///
/// The dedup invariant — at most one live notification per
/// `(member, event, reason)` — is enforced with an atomic
/// `INSERT … WHERE NOT EXISTS` so concurrent processor runs of the same
/// event cannot race a duplicate in.
pub struct PgNotificationRepository {
    pool: Pool<Postgres>,
}

impl PgNotificationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    const COLUMNS: &'static str = "id, member_id, event_id, organization_id, target_kind, \
         target_id, subtarget_kind, subtarget_id, reason, read_at, archived_at, discarded_at, \
         chat_message_ts, created_at";

    fn parse_row(row: sqlx::postgres::PgRow) -> Notification {
        let reason: String = row.get("reason");
        Notification {
            id: row.get("id"),
            member_id: row.get("member_id"),
            event_id: row.get("event_id"),
            organization_id: row.get("organization_id"),
            target: subject_from_row(&row, "target_kind", "target_id"),
            subtarget: opt_subject_from_row(&row, "subtarget_kind", "subtarget_id"),
            reason: NotificationReason::parse(&reason).unwrap_or(NotificationReason::Mention),
            read_at: row.get("read_at"),
            archived_at: row.get("archived_at"),
            discarded_at: row.get("discarded_at"),
            chat_message_ts: row.get("chat_message_ts"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn find_or_create(
        &self,
        req: CreateNotificationRequest,
    ) -> Result<(Notification, bool)> {
        let id = new_v7();
        let now = Utc::now();

        // Atomic check-and-insert prevents TOCTOU races between concurrent
        // runs of the same event.
        let inserted = sqlx::query(&format!(
            "INSERT INTO notifications (id, member_id, event_id, organization_id, target_kind, \
                                        target_id, subtarget_kind, subtarget_id, reason, created_at)
             SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
             WHERE NOT EXISTS (
                 SELECT 1 FROM notifications
                 WHERE member_id = $2 AND event_id = $3 AND reason = $9
                   AND discarded_at IS NULL
             )
             RETURNING {}",
            Self::COLUMNS
        ))
        .bind(id)
        .bind(req.member_id)
        .bind(req.event_id)
        .bind(req.organization_id)
        .bind(req.target.kind.as_str())
        .bind(req.target.id)
        .bind(req.subtarget.map(|s| s.kind.as_str()))
        .bind(req.subtarget.map(|s| s.id))
        .bind(req.reason.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some(row) = inserted {
            return Ok((Self::parse_row(row), true));
        }

        let existing = sqlx::query(&format!(
            "SELECT {} FROM notifications
             WHERE member_id = $1 AND event_id = $2 AND reason = $3 AND discarded_at IS NULL
             ORDER BY created_at ASC
             LIMIT 1",
            Self::COLUMNS
        ))
        .bind(req.member_id)
        .bind(req.event_id)
        .bind(req.reason.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match existing {
            Some(row) => Ok((Self::parse_row(row), false)),
            None => Err(Error::Internal(
                "notification upsert raced with a concurrent discard".into(),
            )),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE id = $1",
            Self::COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn live_for_event(&self, event_id: Uuid) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE event_id = $1 AND discarded_at IS NULL",
            Self::COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn live_for_member(&self, member_id: Uuid) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications
             WHERE member_id = $1 AND discarded_at IS NULL
             ORDER BY created_at DESC",
            Self::COLUMNS
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn discard_for_subject(&self, subject: SubjectRef) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "UPDATE notifications SET discarded_at = $1
             WHERE discarded_at IS NULL
               AND event_id IN (
                   SELECT id FROM events WHERE subject_kind = $2 AND subject_id = $3
               )
             RETURNING {}",
            Self::COLUMNS
        ))
        .bind(Utc::now())
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn discard_for_subject_reasons(
        &self,
        subject: SubjectRef,
        reasons: &[NotificationReason],
    ) -> Result<Vec<Notification>> {
        let reason_strings: Vec<String> =
            reasons.iter().map(|r| r.as_str().to_string()).collect();

        let rows = sqlx::query(&format!(
            "UPDATE notifications SET discarded_at = $1
             WHERE discarded_at IS NULL
               AND reason = ANY($2)
               AND event_id IN (
                   SELECT id FROM events WHERE subject_kind = $3 AND subject_id = $4
               )
             RETURNING {}",
            Self::COLUMNS
        ))
        .bind(Utc::now())
        .bind(&reason_strings)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn discard_for_member_target(
        &self,
        member_id: Uuid,
        target: SubjectRef,
    ) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "UPDATE notifications SET discarded_at = $1
             WHERE discarded_at IS NULL
               AND member_id = $2 AND target_kind = $3 AND target_id = $4
             RETURNING {}",
            Self::COLUMNS
        ))
        .bind(Utc::now())
        .bind(member_id)
        .bind(target.kind.as_str())
        .bind(target.id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn set_chat_message_ts(&self, id: Uuid, ts: &str) -> Result<()> {
        sqlx::query("UPDATE notifications SET chat_message_ts = $1 WHERE id = $2")
            .bind(ts)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn mark_read(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE notifications SET read_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn mark_unread(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE notifications SET read_at = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn archive(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE notifications SET archived_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn unarchive(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE notifications SET archived_at = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
