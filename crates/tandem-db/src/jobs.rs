//! Outbound job queue implementation.
//!
//! The engine hands delivery work to external workers through this queue:
//! email scheduling, chat-integration messages, web pushes, webhook
//! deliveries, and realtime socket triggers. Claims use
//! `FOR UPDATE SKIP LOCKED` so multiple delivery workers can drain the
//! queue concurrently.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tandem_core::{defaults, new_v7, Error, JobQueue, OutboundJob, Result};

/// A claimed outbound job row, as seen by a delivery worker.
#[derive(Debug, Clone)]
pub struct OutboundJobRow {
    pub id: Uuid,
    pub job: OutboundJob,
    pub attempts: i32,
    pub max_retries: i32,
}

/// PostgreSQL implementation of the outbound JobQueue.
pub struct PgJobQueue {
    pool: Pool<Postgres>,
}

impl PgJobQueue {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Claim the next pending job for delivery.
    pub async fn claim_next(&self) -> Result<Option<OutboundJobRow>> {
        let now = Utc::now();
        let row = sqlx::query(
            "UPDATE outbound_jobs
             SET status = 'running', started_at = $1, attempts = attempts + 1
             WHERE id = (
                 SELECT id FROM outbound_jobs
                 WHERE status = 'pending'
                 ORDER BY created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id, payload, attempts, max_retries",
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: serde_json::Value = row.get("payload");
        let job: OutboundJob = serde_json::from_value(payload)?;
        Ok(Some(OutboundJobRow {
            id: row.get("id"),
            job,
            attempts: row.get("attempts"),
            max_retries: row.get("max_retries"),
        }))
    }

    /// Mark a job delivered.
    pub async fn complete(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE outbound_jobs SET status = 'completed', completed_at = $1 WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Mark a job failed. Jobs with remaining retries go back to pending;
    /// exhausted jobs stay failed.
    pub async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE outbound_jobs
             SET status = CASE WHEN attempts >= max_retries THEN 'failed' ELSE 'pending' END,
                 error_message = $1,
                 completed_at = CASE WHEN attempts >= max_retries THEN $2 ELSE NULL END
             WHERE id = $3",
        )
        .bind(error)
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Number of jobs awaiting delivery.
    pub async fn pending_count(&self) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM outbound_jobs WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(count.0)
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, job: OutboundJob) -> Result<Uuid> {
        let id = new_v7();
        let now = Utc::now();
        let payload = serde_json::to_value(&job)?;

        sqlx::query(
            "INSERT INTO outbound_jobs (id, job_type, payload, status, attempts, max_retries, created_at)
             VALUES ($1, $2, $3, 'pending', 0, $4, $5)",
        )
        .bind(id)
        .bind(job.kind())
        .bind(&payload)
        .bind(defaults::JOB_MAX_RETRIES)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }
}
