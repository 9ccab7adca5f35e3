//! Membership and member-settings repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tandem_core::{Error, MemberSettings, MembershipRepository, Result};

/// PostgreSQL implementation of MembershipRepository.
pub struct PgMembershipRepository {
    pool: Pool<Postgres>,
}

impl PgMembershipRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    async fn project_member_ids(&self, project_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT member_id FROM project_memberships
             WHERE project_id = $1 AND discarded_at IS NULL
             ORDER BY created_at ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn is_project_member(&self, member_id: Uuid, project_id: Uuid) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM project_memberships
             WHERE member_id = $1 AND project_id = $2 AND discarded_at IS NULL",
        )
        .bind(member_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(count.0 > 0)
    }

    async fn settings(&self, member_id: Uuid) -> Result<MemberSettings> {
        let row = sqlx::query(
            "SELECT member_id, email_notifications_enabled, chat_linked, \
                    chat_notifications_enabled, notification_pause_expires_at
             FROM member_settings WHERE member_id = $1",
        )
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(match row {
            Some(row) => MemberSettings {
                member_id: row.get("member_id"),
                email_notifications_enabled: row.get("email_notifications_enabled"),
                chat_linked: row.get("chat_linked"),
                chat_notifications_enabled: row.get("chat_notifications_enabled"),
                notification_pause_expires_at: row.get("notification_pause_expires_at"),
            },
            None => MemberSettings::defaults(member_id),
        })
    }
}
