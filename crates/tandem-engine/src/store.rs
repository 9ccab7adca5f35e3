//! Trait-object bundle of repositories the engine runs against.

use std::sync::Arc;

use tandem_core::{
    AccessPolicy, AppWebhookRepository, ContentRepository, EngagementRepository, EventRepository,
    JobQueue, MembershipRepository, NotificationRepository, PermissionRepository,
    PushSubscriptionRepository, SubscriptionRepository, TimelineRepository,
};
use tandem_db::{
    Database, PgAccessPolicy, PgAppWebhookRepository, PgContentRepository, PgEngagementRepository,
    PgEventRepository, PgJobQueue, PgMembershipRepository, PgNotificationRepository,
    PgPermissionRepository, PgPushSubscriptionRepository, PgSubscriptionRepository,
    PgTimelineRepository,
};

/// All state the dispatcher, processors, and fan-out read and mutate.
///
/// Backed by PostgreSQL in production ([`Store::postgres`]) and by in-memory
/// repositories in tests. Cloning is cheap (all fields are `Arc`s).
#[derive(Clone)]
pub struct Store {
    pub events: Arc<dyn EventRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub timeline: Arc<dyn TimelineRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub access: Arc<dyn AccessPolicy>,
    pub engagement: Arc<dyn EngagementRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub push_subscriptions: Arc<dyn PushSubscriptionRepository>,
    pub app_webhooks: Arc<dyn AppWebhookRepository>,
    pub content: Arc<dyn ContentRepository>,
    pub jobs: Arc<dyn JobQueue>,
}

impl Store {
    /// Build a store over a PostgreSQL database.
    pub fn postgres(db: &Database) -> Self {
        let pool = db.pool().clone();
        Self {
            events: Arc::new(PgEventRepository::new(pool.clone())),
            notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
            timeline: Arc::new(PgTimelineRepository::new(pool.clone())),
            subscriptions: Arc::new(PgSubscriptionRepository::new(pool.clone())),
            permissions: Arc::new(PgPermissionRepository::new(pool.clone())),
            access: Arc::new(PgAccessPolicy::new(pool.clone())),
            engagement: Arc::new(PgEngagementRepository::new(pool.clone())),
            memberships: Arc::new(PgMembershipRepository::new(pool.clone())),
            push_subscriptions: Arc::new(PgPushSubscriptionRepository::new(pool.clone())),
            app_webhooks: Arc::new(PgAppWebhookRepository::new(pool.clone())),
            content: Arc::new(PgContentRepository::new(pool.clone())),
            jobs: Arc::new(PgJobQueue::new(pool)),
        }
    }
}
