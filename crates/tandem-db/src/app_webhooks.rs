//! App webhook registration repository implementation.
//!
//! OAuth applications register webhooks subscribed to event types
//! (`app.mentioned`, `post.created`). Delivery records and retry tracking
//! belong to the external delivery worker; the engine only needs to know
//! which registrations are active for a given event type.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tandem_core::{AppWebhook, AppWebhookRepository, Error, Result};

/// PostgreSQL implementation of AppWebhookRepository.
pub struct PgAppWebhookRepository {
    pool: Pool<Postgres>,
}

impl PgAppWebhookRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> AppWebhook {
        AppWebhook {
            id: row.get("id"),
            app_id: row.get("app_id"),
            url: row.get("url"),
            event_types: row.get("event_types"),
            active: row.get("active"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl AppWebhookRepository for PgAppWebhookRepository {
    async fn active_for_app_event(
        &self,
        app_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<AppWebhook>> {
        let rows = sqlx::query(
            "SELECT id, app_id, url, event_types, active, created_at
             FROM app_webhooks
             WHERE app_id = $1 AND active = true AND $2 = ANY(event_types)",
        )
        .bind(app_id)
        .bind(event_type)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn active_for_event(
        &self,
        organization_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<AppWebhook>> {
        let rows = sqlx::query(
            "SELECT id, app_id, url, event_types, active, created_at
             FROM app_webhooks
             WHERE organization_id = $1 AND active = true AND $2 = ANY(event_types)",
        )
        .bind(organization_id)
        .bind(event_type)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }
}
