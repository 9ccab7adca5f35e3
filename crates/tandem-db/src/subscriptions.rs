//! Subscription repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tandem_core::{new_v7, Error, Result, SubjectRef, Subscription, SubscriptionRepository};

use crate::refs::subject_from_row;

/// PostgreSQL implementation of SubscriptionRepository.
pub struct PgSubscriptionRepository {
    pool: Pool<Postgres>,
}

impl PgSubscriptionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    const COLUMNS: &'static str = "id, member_id, subject_kind, subject_id, cascade, created_at";

    fn parse_row(row: sqlx::postgres::PgRow) -> Subscription {
        Subscription {
            id: row.get("id"),
            member_id: row.get("member_id"),
            subject: subject_from_row(&row, "subject_kind", "subject_id"),
            cascade: row.get("cascade"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn create_or_find(
        &self,
        member_id: Uuid,
        subject: SubjectRef,
        cascade: bool,
    ) -> Result<Subscription> {
        let id = new_v7();
        let now = Utc::now();

        let inserted = sqlx::query(&format!(
            "INSERT INTO subscriptions (id, member_id, subject_kind, subject_id, cascade, created_at)
             SELECT $1, $2, $3, $4, $5, $6
             WHERE NOT EXISTS (
                 SELECT 1 FROM subscriptions
                 WHERE member_id = $2 AND subject_kind = $3 AND subject_id = $4
             )
             RETURNING {}",
            Self::COLUMNS
        ))
        .bind(id)
        .bind(member_id)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .bind(cascade)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some(row) = inserted {
            return Ok(Self::parse_row(row));
        }

        let existing = sqlx::query(&format!(
            "SELECT {} FROM subscriptions
             WHERE member_id = $1 AND subject_kind = $2 AND subject_id = $3",
            Self::COLUMNS
        ))
        .bind(member_id)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_row(existing))
    }

    async fn destroy(&self, member_id: Uuid, subject: SubjectRef) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM subscriptions
             WHERE member_id = $1 AND subject_kind = $2 AND subject_id = $3",
        )
        .bind(member_id)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn subscriber_member_ids(&self, subject: SubjectRef) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT member_id FROM subscriptions
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

    async fn subscriptions_for_subject(&self, subject: SubjectRef) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions
             WHERE subject_kind = $1 AND subject_id = $2
             ORDER BY created_at ASC",
            Self::COLUMNS
        ))
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn exists(&self, member_id: Uuid, subject: SubjectRef) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM subscriptions
             WHERE member_id = $1 AND subject_kind = $2 AND subject_id = $3",
        )
        .bind(member_id)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(count.0 > 0)
    }
}
