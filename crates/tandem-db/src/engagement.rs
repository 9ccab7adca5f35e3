//! Follow-up, favorite, and project-pin repository implementation.
//!
//! These are the records destroy and permission processors clean up:
//! follow-ups and favorites are hard-destroyed, project pins are discarded
//! so an unpin/re-pin round-trip keeps its identity.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tandem_core::{EngagementRepository, Error, Favorite, FollowUp, ProjectPin, Result, SubjectRef};

use crate::refs::subject_from_row;

/// PostgreSQL implementation of EngagementRepository.
pub struct PgEngagementRepository {
    pool: Pool<Postgres>,
}

impl PgEngagementRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_follow_up(row: sqlx::postgres::PgRow) -> FollowUp {
        FollowUp {
            id: row.get("id"),
            member_id: row.get("member_id"),
            subject: subject_from_row(&row, "subject_kind", "subject_id"),
            created_at: row.get("created_at"),
        }
    }

    fn parse_favorite(row: sqlx::postgres::PgRow) -> Favorite {
        Favorite {
            id: row.get("id"),
            member_id: row.get("member_id"),
            subject: subject_from_row(&row, "subject_kind", "subject_id"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl EngagementRepository for PgEngagementRepository {
    async fn destroy_follow_ups_for_subject(&self, subject: SubjectRef) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM follow_ups WHERE subject_kind = $1 AND subject_id = $2")
                .bind(subject.kind.as_str())
                .bind(subject.id)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn destroy_follow_ups_for_member_subject(
        &self,
        member_id: Uuid,
        subject: SubjectRef,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM follow_ups
             WHERE member_id = $1 AND subject_kind = $2 AND subject_id = $3",
        )
        .bind(member_id)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn follow_ups_for_subject(&self, subject: SubjectRef) -> Result<Vec<FollowUp>> {
        let rows = sqlx::query(
            "SELECT id, member_id, subject_kind, subject_id, created_at
             FROM follow_ups WHERE subject_kind = $1 AND subject_id = $2",
        )
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_follow_up).collect())
    }

    async fn destroy_favorites_for_subject(&self, subject: SubjectRef) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM favorites WHERE subject_kind = $1 AND subject_id = $2")
                .bind(subject.kind.as_str())
                .bind(subject.id)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn destroy_favorites_for_member_subject(
        &self,
        member_id: Uuid,
        subject: SubjectRef,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM favorites
             WHERE member_id = $1 AND subject_kind = $2 AND subject_id = $3",
        )
        .bind(member_id)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn favorites_for_subject(&self, subject: SubjectRef) -> Result<Vec<Favorite>> {
        let rows = sqlx::query(
            "SELECT id, member_id, subject_kind, subject_id, created_at
             FROM favorites WHERE subject_kind = $1 AND subject_id = $2",
        )
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_favorite).collect())
    }

    async fn favoriting_member_ids(&self, subject: SubjectRef) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT member_id FROM favorites
             WHERE subject_kind = $1 AND subject_id = $2
             ORDER BY created_at ASC",
        )
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn discard_project_pins_for_subject(&self, subject: SubjectRef) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE project_pins SET discarded_at = $1
             WHERE subject_kind = $2 AND subject_id = $3 AND discarded_at IS NULL",
        )
        .bind(Utc::now())
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn project_pin(&self, id: Uuid) -> Result<Option<ProjectPin>> {
        let row = sqlx::query(
            "SELECT id, project_id, subject_kind, subject_id, discarded_at, created_at
             FROM project_pins WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| ProjectPin {
            id: row.get("id"),
            project_id: row.get("project_id"),
            subject: subject_from_row(&row, "subject_kind", "subject_id"),
            discarded_at: row.get("discarded_at"),
            created_at: row.get("created_at"),
        }))
    }
}
