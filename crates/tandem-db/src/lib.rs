//! # tandem-db
//!
//! PostgreSQL database layer for the tandem notification engine.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for the event log, notification store,
//!   timeline, subscriptions, permissions, and supporting records
//! - The outbound delivery job queue (`FOR UPDATE SKIP LOCKED` claims)
//!
//! ## Example
//!
//! ```rust,ignore
//! use tandem_db::Database;
//! use tandem_core::{ActorRef, EventAction, EventRepository, RecordEventRequest, SubjectRef};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/tandem").await?;
//!
//!     let event = db.events.record(RecordEventRequest::new(
//!         ActorRef::Member(member_id),
//!         SubjectRef::post(post_id),
//!         organization_id,
//!         EventAction::Created,
//!     )).await?;
//!
//!     println!("Recorded event: {}", event.id);
//!     Ok(())
//! }
//! ```

pub mod app_webhooks;
pub mod content;
pub mod engagement;
pub mod events;
pub mod jobs;
pub mod memberships;
pub mod notifications;
pub mod permissions;
pub mod pool;
pub mod push;
mod refs;
pub mod subscriptions;
pub mod timeline;

// Test fixtures for integration tests.
// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL.
pub mod test_fixtures;

// Re-export core types
pub use tandem_core::*;

// Re-export repository implementations
pub use app_webhooks::PgAppWebhookRepository;
pub use content::PgContentRepository;
pub use engagement::PgEngagementRepository;
pub use events::PgEventRepository;
pub use jobs::{OutboundJobRow, PgJobQueue};
pub use memberships::PgMembershipRepository;
pub use notifications::PgNotificationRepository;
pub use permissions::{PgAccessPolicy, PgPermissionRepository};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use push::PgPushSubscriptionRepository;
pub use subscriptions::PgSubscriptionRepository;
pub use timeline::PgTimelineRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Append-only event log.
    pub events: PgEventRepository,
    /// Notification store.
    pub notifications: PgNotificationRepository,
    /// Timeline entry storage.
    pub timeline: PgTimelineRepository,
    /// Post/project/note subscriptions.
    pub subscriptions: PgSubscriptionRepository,
    /// Permission rows.
    pub permissions: PgPermissionRepository,
    /// View-access checks.
    pub access: PgAccessPolicy,
    /// Follow-ups, favorites, and project pins.
    pub engagement: PgEngagementRepository,
    /// Project memberships and member delivery settings.
    pub memberships: PgMembershipRepository,
    /// Web-push device subscriptions.
    pub push_subscriptions: PgPushSubscriptionRepository,
    /// App webhook registrations.
    pub app_webhooks: PgAppWebhookRepository,
    /// Content read-model for processors.
    pub content: PgContentRepository,
    /// Outbound delivery job queue.
    pub jobs: PgJobQueue,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            events: PgEventRepository::new(pool.clone()),
            notifications: PgNotificationRepository::new(pool.clone()),
            timeline: PgTimelineRepository::new(pool.clone()),
            subscriptions: PgSubscriptionRepository::new(pool.clone()),
            permissions: PgPermissionRepository::new(pool.clone()),
            access: PgAccessPolicy::new(pool.clone()),
            engagement: PgEngagementRepository::new(pool.clone()),
            memberships: PgMembershipRepository::new(pool.clone()),
            push_subscriptions: PgPushSubscriptionRepository::new(pool.clone()),
            app_webhooks: PgAppWebhookRepository::new(pool.clone()),
            content: PgContentRepository::new(pool.clone()),
            jobs: PgJobQueue::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
