//! Timeline event repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tandem_core::{
    new_v7, ActorRef, Error, Result, SubjectRef, TimelineAction, TimelineCandidate, TimelineEvent,
    TimelineRepository,
};

use crate::refs::{actor_to_columns, opt_subject_from_row, subject_from_row};

/// PostgreSQL implementation of TimelineRepository.
///
/// Provides only storage primitives; the rollup state machine that decides
/// replace/cancel/append lives in the engine crate.
pub struct PgTimelineRepository {
    pool: Pool<Postgres>,
}

impl PgTimelineRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    const COLUMNS: &'static str = "id, actor_kind, actor_id, subject_kind, subject_id, \
         reference_kind, reference_id, action, metadata, created_at";

    fn parse_row(row: sqlx::postgres::PgRow) -> TimelineEvent {
        let action: String = row.get("action");
        let actor_kind: Option<String> = row.get("actor_kind");
        let actor_id: Option<Uuid> = row.get("actor_id");
        let actor = match (actor_kind.as_deref(), actor_id) {
            (Some("member"), Some(id)) => Some(ActorRef::Member(id)),
            (Some("app"), Some(id)) => Some(ActorRef::App(id)),
            _ => None,
        };
        let metadata: Option<serde_json::Value> = row.get("metadata");

        TimelineEvent {
            id: row.get("id"),
            actor,
            subject: subject_from_row(&row, "subject_kind", "subject_id"),
            reference: opt_subject_from_row(&row, "reference_kind", "reference_id"),
            action: TimelineAction::parse(&action)
                .unwrap_or(TimelineAction::SubjectReferencedInInternalRecord),
            metadata: metadata.and_then(|v| serde_json::from_value(v).ok()),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl TimelineRepository for PgTimelineRepository {
    async fn insert(
        &self,
        candidate: &TimelineCandidate,
        reference: Option<SubjectRef>,
    ) -> Result<TimelineEvent> {
        let id = new_v7();
        let now = Utc::now();
        let (actor_kind, actor_id) = candidate
            .actor
            .as_ref()
            .map(actor_to_columns)
            .unwrap_or((None, None));
        let metadata = candidate
            .metadata
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let row = sqlx::query(&format!(
            "INSERT INTO timeline_events (id, actor_kind, actor_id, subject_kind, subject_id, \
                                          reference_kind, reference_id, action, metadata, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {}",
            Self::COLUMNS
        ))
        .bind(id)
        .bind(actor_kind)
        .bind(actor_id)
        .bind(candidate.subject.kind.as_str())
        .bind(candidate.subject.id)
        .bind(reference.map(|r| r.kind.as_str()))
        .bind(reference.map(|r| r.id))
        .bind(candidate.action.as_str())
        .bind(&metadata)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_row(row))
    }

    async fn latest_for_subject_action(
        &self,
        subject: SubjectRef,
        action: TimelineAction,
    ) -> Result<Option<TimelineEvent>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM timeline_events
             WHERE subject_kind = $1 AND subject_id = $2 AND action = $3
             ORDER BY created_at DESC
             LIMIT 1",
            Self::COLUMNS
        ))
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .bind(action.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM timeline_events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn find_or_create_reference(
        &self,
        subject: SubjectRef,
        actor: Option<ActorRef>,
        reference: SubjectRef,
    ) -> Result<(TimelineEvent, bool)> {
        let id = new_v7();
        let now = Utc::now();
        let (actor_kind, actor_id) = actor
            .as_ref()
            .map(actor_to_columns)
            .unwrap_or((None, None));
        let action = TimelineAction::SubjectReferencedInInternalRecord;

        let inserted = sqlx::query(&format!(
            "INSERT INTO timeline_events (id, actor_kind, actor_id, subject_kind, subject_id, \
                                          reference_kind, reference_id, action, created_at)
             SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9
             WHERE NOT EXISTS (
                 SELECT 1 FROM timeline_events
                 WHERE subject_kind = $4 AND subject_id = $5
                   AND reference_kind = $6 AND reference_id = $7
                   AND action = $8
             )
             RETURNING {}",
            Self::COLUMNS
        ))
        .bind(id)
        .bind(actor_kind)
        .bind(actor_id)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .bind(reference.kind.as_str())
        .bind(reference.id)
        .bind(action.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some(row) = inserted {
            return Ok((Self::parse_row(row), true));
        }

        let existing = sqlx::query(&format!(
            "SELECT {} FROM timeline_events
             WHERE subject_kind = $1 AND subject_id = $2
               AND reference_kind = $3 AND reference_id = $4
               AND action = $5
             LIMIT 1",
            Self::COLUMNS
        ))
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .bind(reference.kind.as_str())
        .bind(reference.id)
        .bind(action.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok((Self::parse_row(existing), false))
    }

    async fn delete_reference(&self, subject: SubjectRef, reference: SubjectRef) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM timeline_events
             WHERE subject_kind = $1 AND subject_id = $2
               AND reference_kind = $3 AND reference_id = $4
               AND action = $5",
        )
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .bind(reference.kind.as_str())
        .bind(reference.id)
        .bind(TimelineAction::SubjectReferencedInInternalRecord.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    async fn delete_all_references_to(&self, reference: SubjectRef) -> Result<Vec<SubjectRef>> {
        let rows = sqlx::query(
            "DELETE FROM timeline_events
             WHERE reference_kind = $1 AND reference_id = $2 AND action = $3
             RETURNING subject_kind, subject_id",
        )
        .bind(reference.kind.as_str())
        .bind(reference.id)
        .bind(TimelineAction::SubjectReferencedInInternalRecord.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut subjects: Vec<SubjectRef> = Vec::new();
        for row in rows {
            let subject = subject_from_row(&row, "subject_kind", "subject_id");
            if !subjects.contains(&subject) {
                subjects.push(subject);
            }
        }
        Ok(subjects)
    }

    async fn list_for_subject(&self, subject: SubjectRef) -> Result<Vec<TimelineEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM timeline_events
             WHERE subject_kind = $1 AND subject_id = $2
             ORDER BY created_at ASC, id ASC",
            Self::COLUMNS
        ))
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }
}
