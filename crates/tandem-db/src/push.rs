//! Web-push subscription repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tandem_core::{Error, PushSubscription, PushSubscriptionRepository, Result};

/// PostgreSQL implementation of PushSubscriptionRepository.
pub struct PgPushSubscriptionRepository {
    pool: Pool<Postgres>,
}

impl PgPushSubscriptionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PushSubscriptionRepository for PgPushSubscriptionRepository {
    async fn active_for_member(&self, member_id: Uuid) -> Result<Vec<PushSubscription>> {
        let rows = sqlx::query(
            "SELECT id, member_id, endpoint, created_at
             FROM push_subscriptions
             WHERE member_id = $1 AND revoked_at IS NULL
             ORDER BY created_at ASC",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| PushSubscription {
                id: row.get("id"),
                member_id: row.get("member_id"),
                endpoint: row.get("endpoint"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
