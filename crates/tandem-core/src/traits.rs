//! Core traits for tandem abstractions.
//!
//! These traits define the interfaces the engine runs against, enabling a
//! PostgreSQL backend in production and in-memory implementations in tests.
//! Every mutation exposed here is idempotent: the event queue delivers
//! at-least-once, so processors may run twice with identical outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// EVENT LOG
// =============================================================================

/// Append-only event log plus the claim bookkeeping the worker needs.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Record a new event. Called synchronously by the mutating operation,
    /// inside the same transaction as the subject's own write where the
    /// backend supports it.
    async fn record(&self, req: RecordEventRequest) -> Result<Event>;

    /// Fetch an event by id.
    async fn get(&self, id: Uuid) -> Result<Option<Event>>;

    /// Claim the next unprocessed event for dispatch. Events claimed long
    /// ago but never finished become claimable again (at-least-once).
    async fn claim_next_unprocessed(&self) -> Result<Option<Event>>;

    /// Mark an event processed. Bookkeeping only — a reclaimed duplicate
    /// run is harmless because all downstream mutations are idempotent.
    async fn mark_processed(&self, id: Uuid) -> Result<()>;

    /// Number of events awaiting processing.
    async fn unprocessed_count(&self) -> Result<i64>;
}

// =============================================================================
// NOTIFICATION STORE
// =============================================================================

/// Parameters for the notification upsert.
#[derive(Debug, Clone)]
pub struct CreateNotificationRequest {
    pub member_id: Uuid,
    pub event_id: Uuid,
    pub organization_id: Uuid,
    pub target: SubjectRef,
    pub subtarget: Option<SubjectRef>,
    pub reason: NotificationReason,
}

/// Durable per-(recipient, event, reason) notification records.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Idempotent upsert: an existing live row for
    /// `(member, event, reason)` wins over inserting a duplicate.
    /// Returns the row and whether it was newly created.
    async fn find_or_create(&self, req: CreateNotificationRequest)
        -> Result<(Notification, bool)>;

    async fn get(&self, id: Uuid) -> Result<Option<Notification>>;

    /// Live notifications created by a given event.
    async fn live_for_event(&self, event_id: Uuid) -> Result<Vec<Notification>>;

    /// Live notifications for a recipient.
    async fn live_for_member(&self, member_id: Uuid) -> Result<Vec<Notification>>;

    /// Discard live notifications whose *event subject* matches. Used by
    /// destroy processors. Returns the discarded rows so callers can clean
    /// up delivered chat messages. No-op when nothing matches.
    async fn discard_for_subject(&self, subject: SubjectRef) -> Result<Vec<Notification>>;

    /// Discard live notifications whose event subject matches and whose
    /// reason is in `reasons`. Used by unresolve retractions.
    async fn discard_for_subject_reasons(
        &self,
        subject: SubjectRef,
        reasons: &[NotificationReason],
    ) -> Result<Vec<Notification>>;

    /// Discard live notifications for one recipient pointing at a target.
    /// Used by permission revocations.
    async fn discard_for_member_target(
        &self,
        member_id: Uuid,
        target: SubjectRef,
    ) -> Result<Vec<Notification>>;

    /// Record the chat-message correlation handle after external delivery.
    async fn set_chat_message_ts(&self, id: Uuid, ts: &str) -> Result<()>;

    // Recipient-driven state transitions. These are mutation entry points
    // for the surrounding application, not computed by processors.

    async fn mark_read(&self, id: Uuid) -> Result<()>;
    async fn mark_unread(&self, id: Uuid) -> Result<()>;
    async fn archive(&self, id: Uuid) -> Result<()>;
    async fn unarchive(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// TIMELINE
// =============================================================================

/// Per-subject activity-log storage. Rollup decisions live in the engine;
/// this trait only provides the primitive reads and writes.
#[async_trait]
pub trait TimelineRepository: Send + Sync {
    /// Insert an entry as-is (no rollup applied).
    async fn insert(
        &self,
        candidate: &TimelineCandidate,
        reference: Option<SubjectRef>,
    ) -> Result<TimelineEvent>;

    /// Most recent entry for a subject with the given action.
    async fn latest_for_subject_action(
        &self,
        subject: SubjectRef,
        action: TimelineAction,
    ) -> Result<Option<TimelineEvent>>;

    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Idempotent insert of a reference entry on `subject`'s timeline
    /// pointing at `reference`. Returns the row and whether it was created.
    async fn find_or_create_reference(
        &self,
        subject: SubjectRef,
        actor: Option<ActorRef>,
        reference: SubjectRef,
    ) -> Result<(TimelineEvent, bool)>;

    /// Delete reference entries on `subject`'s timeline pointing at
    /// `reference`. Returns the number deleted.
    async fn delete_reference(&self, subject: SubjectRef, reference: SubjectRef) -> Result<u64>;

    /// Delete every reference entry (on any timeline) pointing at
    /// `reference`; used when the referencing entity is destroyed. Returns
    /// the subjects whose timelines changed.
    async fn delete_all_references_to(&self, reference: SubjectRef) -> Result<Vec<SubjectRef>>;

    /// All entries for a subject, oldest first.
    async fn list_for_subject(&self, subject: SubjectRef) -> Result<Vec<TimelineEvent>>;
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Idempotent create; an existing subscription is returned unchanged.
    async fn create_or_find(
        &self,
        member_id: Uuid,
        subject: SubjectRef,
        cascade: bool,
    ) -> Result<Subscription>;

    /// Remove a subscription. Returns whether one existed.
    async fn destroy(&self, member_id: Uuid, subject: SubjectRef) -> Result<bool>;

    /// Subscribed member ids for a subject.
    async fn subscriber_member_ids(&self, subject: SubjectRef) -> Result<Vec<Uuid>>;

    /// Full subscription rows for a subject (cascade flags included).
    async fn subscriptions_for_subject(&self, subject: SubjectRef) -> Result<Vec<Subscription>>;

    async fn exists(&self, member_id: Uuid, subject: SubjectRef) -> Result<bool>;
}

// =============================================================================
// PERMISSIONS & ACCESS
// =============================================================================

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Permission>>;

    /// Live (undiscarded) permission rows for a subject.
    async fn live_for_subject(&self, subject: SubjectRef) -> Result<Vec<Permission>>;

    /// Live permission row for one member on a subject, if any.
    async fn live_for_member_subject(
        &self,
        member_id: Uuid,
        subject: SubjectRef,
    ) -> Result<Option<Permission>>;
}

/// Queried collaborator answering "can this member currently see this
/// subject". Implementations consult project privacy, project membership,
/// and explicit permission rows.
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn can_view(&self, member_id: Uuid, subject: SubjectRef) -> Result<bool>;
}

// =============================================================================
// ENGAGEMENT RECORDS
// =============================================================================

/// Follow-ups, favorites, and project pins — the records destroy and
/// permission processors clean up.
#[async_trait]
pub trait EngagementRepository: Send + Sync {
    async fn destroy_follow_ups_for_subject(&self, subject: SubjectRef) -> Result<u64>;
    async fn destroy_follow_ups_for_member_subject(
        &self,
        member_id: Uuid,
        subject: SubjectRef,
    ) -> Result<u64>;
    async fn follow_ups_for_subject(&self, subject: SubjectRef) -> Result<Vec<FollowUp>>;

    async fn destroy_favorites_for_subject(&self, subject: SubjectRef) -> Result<u64>;
    async fn destroy_favorites_for_member_subject(
        &self,
        member_id: Uuid,
        subject: SubjectRef,
    ) -> Result<u64>;
    async fn favorites_for_subject(&self, subject: SubjectRef) -> Result<Vec<Favorite>>;

    /// Member ids who favorited a subject (used for realtime fan-out to
    /// project favoriters).
    async fn favoriting_member_ids(&self, subject: SubjectRef) -> Result<Vec<Uuid>>;

    /// Soft-delete pins of a subject. Pins are discarded, never destroyed.
    async fn discard_project_pins_for_subject(&self, subject: SubjectRef) -> Result<u64>;
    async fn project_pin(&self, id: Uuid) -> Result<Option<ProjectPin>>;
}

// =============================================================================
// MEMBERSHIPS & SETTINGS
// =============================================================================

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Kept member ids of a project.
    async fn project_member_ids(&self, project_id: Uuid) -> Result<Vec<Uuid>>;

    async fn is_project_member(&self, member_id: Uuid, project_id: Uuid) -> Result<bool>;

    /// Delivery preferences and pause state; members without an explicit
    /// settings row get [`MemberSettings::defaults`].
    async fn settings(&self, member_id: Uuid) -> Result<MemberSettings>;
}

// =============================================================================
// PUSH & WEBHOOKS
// =============================================================================

#[async_trait]
pub trait PushSubscriptionRepository: Send + Sync {
    async fn active_for_member(&self, member_id: Uuid) -> Result<Vec<PushSubscription>>;
}

#[async_trait]
pub trait AppWebhookRepository: Send + Sync {
    /// Active registrations for one app subscribed to an event type.
    async fn active_for_app_event(
        &self,
        app_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<AppWebhook>>;

    /// Active registrations (any app in the organization) subscribed to an
    /// event type.
    async fn active_for_event(
        &self,
        organization_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<AppWebhook>>;
}

// =============================================================================
// CONTENT READ-MODEL
// =============================================================================

/// Current subject state as read by processors. Content mutation belongs to
/// the surrounding application; the only writes here are activity
/// timestamps.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn post(&self, id: Uuid) -> Result<Option<Post>>;
    async fn comment(&self, id: Uuid) -> Result<Option<Comment>>;
    async fn note(&self, id: Uuid) -> Result<Option<Note>>;
    async fn project(&self, id: Uuid) -> Result<Option<Project>>;
    async fn reaction(&self, id: Uuid) -> Result<Option<Reaction>>;

    /// Kept direct replies of a comment.
    async fn reply_ids(&self, comment_id: Uuid) -> Result<Vec<Uuid>>;

    /// Creation time of the most recent kept comment on a subject, for
    /// recomputing activity after a comment is destroyed.
    async fn latest_comment_at(&self, subject: SubjectRef) -> Result<Option<DateTime<Utc>>>;

    /// Bump a subject's `last_activity_at` bookkeeping column.
    async fn set_last_activity(&self, subject: SubjectRef, at: DateTime<Utc>) -> Result<()>;
}

// =============================================================================
// OUTBOUND JOB QUEUE
// =============================================================================

/// Fire-and-forget hand-off to external delivery workers. At-least-once;
/// the engine never calls transports directly.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: OutboundJob) -> Result<Uuid>;
}
