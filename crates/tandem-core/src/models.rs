//! Core data models for the tandem notification engine.
//!
//! These types are shared across all tandem crates and represent the domain
//! entities of the fan-out pipeline: the append-only event log, per-recipient
//! notifications, rolled-up timeline entries, subscriptions, and the
//! supporting records processors read and clean up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// ENTITY REFERENCES
// =============================================================================

/// Kinds of entities that can appear as an event subject, notification target,
/// or timeline reference.
///
/// The surrounding platform stores these as polymorphic `(type, id)` pairs;
/// here they are a closed enum so dispatch is checked at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Post,
    Comment,
    Note,
    Project,
    Reaction,
    Permission,
    ProjectPin,
    FollowUp,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Post => "post",
            SubjectKind::Comment => "comment",
            SubjectKind::Note => "note",
            SubjectKind::Project => "project",
            SubjectKind::Reaction => "reaction",
            SubjectKind::Permission => "permission",
            SubjectKind::ProjectPin => "project_pin",
            SubjectKind::FollowUp => "follow_up",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "post" => Some(SubjectKind::Post),
            "comment" => Some(SubjectKind::Comment),
            "note" => Some(SubjectKind::Note),
            "project" => Some(SubjectKind::Project),
            "reaction" => Some(SubjectKind::Reaction),
            "permission" => Some(SubjectKind::Permission),
            "project_pin" => Some(SubjectKind::ProjectPin),
            "follow_up" => Some(SubjectKind::FollowUp),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reference to a concrete entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    pub kind: SubjectKind,
    pub id: Uuid,
}

impl SubjectRef {
    pub fn new(kind: SubjectKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn post(id: Uuid) -> Self {
        Self::new(SubjectKind::Post, id)
    }

    pub fn comment(id: Uuid) -> Self {
        Self::new(SubjectKind::Comment, id)
    }

    pub fn note(id: Uuid) -> Self {
        Self::new(SubjectKind::Note, id)
    }

    pub fn project(id: Uuid) -> Self {
        Self::new(SubjectKind::Project, id)
    }

    pub fn reaction(id: Uuid) -> Self {
        Self::new(SubjectKind::Reaction, id)
    }

    pub fn permission(id: Uuid) -> Self {
        Self::new(SubjectKind::Permission, id)
    }

    pub fn project_pin(id: Uuid) -> Self {
        Self::new(SubjectKind::ProjectPin, id)
    }

    pub fn follow_up(id: Uuid) -> Self {
        Self::new(SubjectKind::FollowUp, id)
    }
}

impl std::fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Who or what caused an event.
///
/// Member actors are organization memberships; app actors are OAuth
/// applications posting through the API. System events carry no actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ActorRef {
    Member(Uuid),
    App(Uuid),
    System,
}

impl ActorRef {
    /// The acting member, if the actor is a member.
    pub fn member_id(&self) -> Option<Uuid> {
        match self {
            ActorRef::Member(id) => Some(*id),
            _ => None,
        }
    }
}

// =============================================================================
// EVENT LOG
// =============================================================================

/// Domain mutation kinds recorded in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Created,
    Updated,
    Destroyed,
    Published,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Created => "created",
            EventAction::Updated => "updated",
            EventAction::Destroyed => "destroyed",
            EventAction::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(EventAction::Created),
            "updated" => Some(EventAction::Updated),
            "destroyed" => Some(EventAction::Destroyed),
            "published" => Some(EventAction::Published),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An old/new pair for one changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange<T> {
    pub from: T,
    pub to: T,
}

impl<T> FieldChange<T> {
    pub fn new(from: T, to: T) -> Self {
        Self { from, to }
    }
}

/// Previous-change tuples captured at mutation time for updated subjects.
///
/// Update processors diff against these instead of re-deriving old state,
/// which would already be gone by the time the event is processed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<FieldChange<Option<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<FieldChange<Option<Uuid>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<FieldChange<Visibility>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<FieldChange<Option<DateTime<Utc>>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_html: Option<FieldChange<Option<String>>>,
}

impl SubjectChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.project_id.is_none()
            && self.visibility.is_none()
            && self.resolved_at.is_none()
            && self.body_html.is_none()
    }
}

/// One row of the append-only event log, describing a single domain mutation.
///
/// Events are created synchronously inside the same transaction as the
/// mutation they describe, and never updated afterwards except for the
/// `processed_at` / `claimed_at` bookkeeping columns the worker maintains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub actor: ActorRef,
    pub subject: SubjectRef,
    pub organization_id: Uuid,
    pub action: EventAction,
    /// Old/new field values captured when `action` is `Updated`.
    #[serde(default, skip_serializing_if = "SubjectChanges::is_empty")]
    pub changes: SubjectChanges,
    pub occurred_at: DateTime<Utc>,
    /// Suppresses notifications, realtime events, and chat messages for this
    /// mutation (used by imports and migrations). Timeline bookkeeping still
    /// runs.
    pub skip_notifications: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn processed(&self) -> bool {
        self.processed_at.is_some()
    }

    /// The acting member, if any.
    pub fn actor_member_id(&self) -> Option<Uuid> {
        self.actor.member_id()
    }
}

/// Parameters for recording a new event.
#[derive(Debug, Clone)]
pub struct RecordEventRequest {
    pub actor: ActorRef,
    pub subject: SubjectRef,
    pub organization_id: Uuid,
    pub action: EventAction,
    pub changes: SubjectChanges,
    pub skip_notifications: bool,
}

impl RecordEventRequest {
    pub fn new(
        actor: ActorRef,
        subject: SubjectRef,
        organization_id: Uuid,
        action: EventAction,
    ) -> Self {
        Self {
            actor,
            subject,
            organization_id,
            action,
            changes: SubjectChanges::default(),
            skip_notifications: false,
        }
    }

    pub fn with_changes(mut self, changes: SubjectChanges) -> Self {
        self.changes = changes;
        self
    }

    pub fn skip_notifications(mut self) -> Self {
        self.skip_notifications = true;
        self
    }
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// Why a notification was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationReason {
    Mention,
    ParentSubscription,
    Author,
    ProjectSubscription,
    PermissionGranted,
    CommentResolved,
    CommentResolvedFromComment,
    PostResolved,
    PostResolvedFromComment,
    ProcessingComplete,
}

impl NotificationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationReason::Mention => "mention",
            NotificationReason::ParentSubscription => "parent_subscription",
            NotificationReason::Author => "author",
            NotificationReason::ProjectSubscription => "project_subscription",
            NotificationReason::PermissionGranted => "permission_granted",
            NotificationReason::CommentResolved => "comment_resolved",
            NotificationReason::CommentResolvedFromComment => "comment_resolved_from_comment",
            NotificationReason::PostResolved => "post_resolved",
            NotificationReason::PostResolvedFromComment => "post_resolved_from_comment",
            NotificationReason::ProcessingComplete => "processing_complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mention" => Some(NotificationReason::Mention),
            "parent_subscription" => Some(NotificationReason::ParentSubscription),
            "author" => Some(NotificationReason::Author),
            "project_subscription" => Some(NotificationReason::ProjectSubscription),
            "permission_granted" => Some(NotificationReason::PermissionGranted),
            "comment_resolved" => Some(NotificationReason::CommentResolved),
            "comment_resolved_from_comment" => Some(NotificationReason::CommentResolvedFromComment),
            "post_resolved" => Some(NotificationReason::PostResolved),
            "post_resolved_from_comment" => Some(NotificationReason::PostResolvedFromComment),
            "processing_complete" => Some(NotificationReason::ProcessingComplete),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-recipient, per-event alert record.
///
/// At most one live (undiscarded) notification exists per
/// `(member, event, reason)` — reprocessing an event upserts instead of
/// duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    /// Recipient organization membership.
    pub member_id: Uuid,
    pub event_id: Uuid,
    pub organization_id: Uuid,
    /// The entity the notification navigates to.
    pub target: SubjectRef,
    /// Finer-grained context inside the target (e.g. the comment on a post).
    pub subtarget: Option<SubjectRef>,
    pub reason: NotificationReason,
    pub read_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub discarded_at: Option<DateTime<Utc>>,
    /// Correlation handle of the chat-integration message delivered for this
    /// notification, set by the external delivery worker. Presence means a
    /// deletion job is needed when the notification is discarded.
    pub chat_message_ts: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn read(&self) -> bool {
        self.read_at.is_some()
    }

    pub fn archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn discarded(&self) -> bool {
        self.discarded_at.is_some()
    }

    pub fn chat_message_delivered(&self) -> bool {
        self.chat_message_ts.is_some()
    }
}

// =============================================================================
// TIMELINE
// =============================================================================

/// Activity-log entry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineAction {
    SubjectPinned,
    SubjectUnpinned,
    SubjectTitleUpdated,
    SubjectProjectUpdated,
    PostVisibilityUpdated,
    PostResolved,
    PostUnresolved,
    SubjectReferencedInInternalRecord,
}

impl TimelineAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineAction::SubjectPinned => "subject_pinned",
            TimelineAction::SubjectUnpinned => "subject_unpinned",
            TimelineAction::SubjectTitleUpdated => "subject_title_updated",
            TimelineAction::SubjectProjectUpdated => "subject_project_updated",
            TimelineAction::PostVisibilityUpdated => "post_visibility_updated",
            TimelineAction::PostResolved => "post_resolved",
            TimelineAction::PostUnresolved => "post_unresolved",
            TimelineAction::SubjectReferencedInInternalRecord => {
                "subject_referenced_in_internal_record"
            }
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "subject_pinned" => Some(TimelineAction::SubjectPinned),
            "subject_unpinned" => Some(TimelineAction::SubjectUnpinned),
            "subject_title_updated" => Some(TimelineAction::SubjectTitleUpdated),
            "subject_project_updated" => Some(TimelineAction::SubjectProjectUpdated),
            "post_visibility_updated" => Some(TimelineAction::PostVisibilityUpdated),
            "post_resolved" => Some(TimelineAction::PostResolved),
            "post_unresolved" => Some(TimelineAction::PostUnresolved),
            "subject_referenced_in_internal_record" => {
                Some(TimelineAction::SubjectReferencedInInternalRecord)
            }
            _ => None,
        }
    }

    /// The symmetric opposite action, when one exists. A fresh entry of the
    /// opposite kind by the same actor within the rollup window cancels the
    /// prior entry with nothing inserted.
    pub fn cancels(&self) -> Option<TimelineAction> {
        match self {
            TimelineAction::SubjectPinned => Some(TimelineAction::SubjectUnpinned),
            TimelineAction::SubjectUnpinned => Some(TimelineAction::SubjectPinned),
            TimelineAction::PostResolved => Some(TimelineAction::PostUnresolved),
            TimelineAction::PostUnresolved => Some(TimelineAction::PostResolved),
            _ => None,
        }
    }

    /// Whether consecutive entries of this action by the same actor merge
    /// within the rollup window (chains of edits collapse to one entry).
    pub fn merges(&self) -> bool {
        matches!(
            self,
            TimelineAction::SubjectTitleUpdated | TimelineAction::SubjectProjectUpdated
        )
    }
}

impl std::fmt::Display for TimelineAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured metadata attached to timeline entries whose action needs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineMetadata {
    Title {
        from_title: Option<String>,
        to_title: Option<String>,
    },
    Project {
        from_project_id: Option<Uuid>,
        to_project_id: Option<Uuid>,
    },
    Visibility {
        from_visibility: Visibility,
        to_visibility: Visibility,
    },
}

/// A per-subject activity-log entry, subject to rollup compaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: Uuid,
    /// May be absent for system actions.
    pub actor: Option<ActorRef>,
    /// The entity whose timeline this entry belongs to.
    pub subject: SubjectRef,
    /// The entity that referenced the subject, for reference entries.
    pub reference: Option<SubjectRef>,
    pub action: TimelineAction,
    pub metadata: Option<TimelineMetadata>,
    pub created_at: DateTime<Utc>,
}

/// A candidate timeline entry before rollup rules are applied.
#[derive(Debug, Clone)]
pub struct TimelineCandidate {
    pub actor: Option<ActorRef>,
    pub subject: SubjectRef,
    pub action: TimelineAction,
    pub metadata: Option<TimelineMetadata>,
}

impl TimelineCandidate {
    pub fn new(actor: Option<ActorRef>, subject: SubjectRef, action: TimelineAction) -> Self {
        Self {
            actor,
            subject,
            action,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: TimelineMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

/// A member's subscription to a post, project, or note.
///
/// Cascading project subscriptions auto-subscribe the member to posts
/// created in the project as a side effect of the first notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub member_id: Uuid,
    pub subject: SubjectRef,
    pub cascade: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// SUPPORTING RECORDS
// =============================================================================

/// Access level granted by a permission row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    View,
    Edit,
}

impl PermissionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionAction::View => "view",
            PermissionAction::Edit => "edit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "view" => Some(PermissionAction::View),
            "edit" => Some(PermissionAction::Edit),
            _ => None,
        }
    }
}

/// An explicit per-member grant on a subject (currently notes and projects).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub member_id: Uuid,
    pub subject: SubjectRef,
    pub action: PermissionAction,
    pub discarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Permission {
    pub fn discarded(&self) -> bool {
        self.discarded_at.is_some()
    }
}

/// A member's reminder to revisit a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub id: Uuid,
    pub member_id: Uuid,
    pub subject: SubjectRef,
    pub created_at: DateTime<Utc>,
}

/// A member's favorite of a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub id: Uuid,
    pub member_id: Uuid,
    pub subject: SubjectRef,
    pub created_at: DateTime<Utc>,
}

/// A post or note pinned to a project. Soft-deleted, never hard-destroyed,
/// so unpin/re-pin round-trips keep their identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectPin {
    pub id: Uuid,
    pub project_id: Uuid,
    pub subject: SubjectRef,
    pub discarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ProjectPin {
    pub fn discarded(&self) -> bool {
        self.discarded_at.is_some()
    }
}

/// A registered web-push device endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: Uuid,
    pub member_id: Uuid,
    pub endpoint: String,
    pub created_at: DateTime<Utc>,
}

/// Per-member delivery preferences and pause state, evaluated by the
/// fan-out layer before enqueuing channel jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSettings {
    pub member_id: Uuid,
    pub email_notifications_enabled: bool,
    /// Whether the member has linked a chat-integration account.
    pub chat_linked: bool,
    /// Whether chat notifications are enabled on the linked account.
    pub chat_notifications_enabled: bool,
    pub notification_pause_expires_at: Option<DateTime<Utc>>,
}

impl MemberSettings {
    /// Defaults for a member with no explicit settings row.
    pub fn defaults(member_id: Uuid) -> Self {
        Self {
            member_id,
            email_notifications_enabled: true,
            chat_linked: false,
            chat_notifications_enabled: false,
            notification_pause_expires_at: None,
        }
    }

    pub fn notifications_paused(&self, now: DateTime<Utc>) -> bool {
        self.notification_pause_expires_at
            .map(|expires| expires > now)
            .unwrap_or(false)
    }

    pub fn chat_notifications_active(&self) -> bool {
        self.chat_linked && self.chat_notifications_enabled
    }
}

/// An OAuth application's webhook registration.
///
/// Apps subscribed to an event type (`app.mentioned`, `post.created`)
/// receive webhook delivery jobs independently of member notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppWebhook {
    pub id: Uuid,
    pub app_id: Uuid,
    pub url: String,
    pub event_types: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl AppWebhook {
    pub fn subscribed_to(&self, event_type: &str) -> bool {
        self.active && self.event_types.iter().any(|e| e == event_type)
    }
}

// =============================================================================
// CONTENT READ-MODEL
// =============================================================================

/// Post visibility scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Default,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Default => "default",
            Visibility::Public => "public",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Visibility::Default),
            "public" => Some(Visibility::Public),
            _ => None,
        }
    }
}

/// Current state of a post as read by processors.
///
/// Processors never mutate content fields; they only bump
/// `last_activity_at`-style bookkeeping through the content repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    /// Parent post when this post is an iteration of another.
    pub parent_id: Option<Uuid>,
    /// Authoring member; absent for integration-authored posts.
    pub author_id: Option<Uuid>,
    pub title: String,
    pub body_html: String,
    pub draft: bool,
    pub visibility: Visibility,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by_id: Option<Uuid>,
    pub resolved_comment_id: Option<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
}

impl Post {
    pub fn subject_ref(&self) -> SubjectRef {
        SubjectRef::post(self.id)
    }

    pub fn resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// Current state of a comment (on a post or a note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// The post or note the comment belongs to.
    pub subject: SubjectRef,
    /// Parent comment when this comment is a reply.
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub body_html: String,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by_id: Option<Uuid>,
    pub discarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn subject_ref(&self) -> SubjectRef {
        SubjectRef::comment(self.id)
    }

    pub fn reply(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// Current state of a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub author_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: Option<String>,
    pub body_html: String,
    pub content_updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Note {
    pub fn subject_ref(&self) -> SubjectRef {
        SubjectRef::note(self.id)
    }
}

/// Current state of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub private: bool,
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn subject_ref(&self) -> SubjectRef {
        SubjectRef::project(self.id)
    }
}

/// Current state of a reaction (on a post or comment).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// The post or comment reacted to.
    pub subject: SubjectRef,
    pub member_id: Uuid,
    pub content: String,
}

// =============================================================================
// OUTBOUND JOBS
// =============================================================================

/// Descriptor for a fire-and-forget delivery job consumed by external
/// workers. The engine only decides *that* and *to whom* delivery happens;
/// transports live outside this system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundJob {
    ScheduleEmail {
        member_id: Uuid,
        notification_created_at: DateTime<Utc>,
    },
    DeliverChatMessage {
        notification_id: Uuid,
    },
    DeleteChatMessage {
        notification_id: Uuid,
    },
    DeliverPush {
        notification_id: Uuid,
        push_subscription_id: Uuid,
    },
    DeliverWebhook {
        webhook_id: Uuid,
        event_type: String,
        payload: JsonValue,
    },
    TriggerRealtimeEvent {
        channel: String,
        event: String,
        payload: JsonValue,
    },
}

impl OutboundJob {
    /// Stable job-kind discriminator used as the queue's type column.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundJob::ScheduleEmail { .. } => "schedule_email",
            OutboundJob::DeliverChatMessage { .. } => "deliver_chat_message",
            OutboundJob::DeleteChatMessage { .. } => "delete_chat_message",
            OutboundJob::DeliverPush { .. } => "deliver_push",
            OutboundJob::DeliverWebhook { .. } => "deliver_webhook",
            OutboundJob::TriggerRealtimeEvent { .. } => "trigger_realtime_event",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_kind_round_trip() {
        for kind in [
            SubjectKind::Post,
            SubjectKind::Comment,
            SubjectKind::Note,
            SubjectKind::Project,
            SubjectKind::Reaction,
            SubjectKind::Permission,
            SubjectKind::ProjectPin,
            SubjectKind::FollowUp,
        ] {
            assert_eq!(SubjectKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SubjectKind::parse("bogus"), None);
    }

    #[test]
    fn test_event_action_round_trip() {
        for action in [
            EventAction::Created,
            EventAction::Updated,
            EventAction::Destroyed,
            EventAction::Published,
        ] {
            assert_eq!(EventAction::parse(action.as_str()), Some(action));
        }
    }

    #[test]
    fn test_notification_reason_round_trip() {
        for reason in [
            NotificationReason::Mention,
            NotificationReason::ParentSubscription,
            NotificationReason::Author,
            NotificationReason::ProjectSubscription,
            NotificationReason::PermissionGranted,
            NotificationReason::CommentResolved,
            NotificationReason::CommentResolvedFromComment,
            NotificationReason::PostResolved,
            NotificationReason::PostResolvedFromComment,
            NotificationReason::ProcessingComplete,
        ] {
            assert_eq!(NotificationReason::parse(reason.as_str()), Some(reason));
        }
    }

    #[test]
    fn test_timeline_action_cancellation_pairs_are_symmetric() {
        assert_eq!(
            TimelineAction::SubjectPinned.cancels(),
            Some(TimelineAction::SubjectUnpinned)
        );
        assert_eq!(
            TimelineAction::SubjectUnpinned.cancels(),
            Some(TimelineAction::SubjectPinned)
        );
        assert_eq!(
            TimelineAction::PostResolved.cancels(),
            Some(TimelineAction::PostUnresolved)
        );
        assert_eq!(
            TimelineAction::PostUnresolved.cancels(),
            Some(TimelineAction::PostResolved)
        );
        assert_eq!(TimelineAction::SubjectTitleUpdated.cancels(), None);
        assert_eq!(
            TimelineAction::SubjectReferencedInInternalRecord.cancels(),
            None
        );
    }

    #[test]
    fn test_timeline_action_merge_families() {
        assert!(TimelineAction::SubjectTitleUpdated.merges());
        assert!(TimelineAction::SubjectProjectUpdated.merges());
        assert!(!TimelineAction::SubjectPinned.merges());
        assert!(!TimelineAction::PostVisibilityUpdated.merges());
    }

    #[test]
    fn test_actor_ref_member_id() {
        let id = Uuid::new_v4();
        assert_eq!(ActorRef::Member(id).member_id(), Some(id));
        assert_eq!(ActorRef::App(id).member_id(), None);
        assert_eq!(ActorRef::System.member_id(), None);
    }

    #[test]
    fn test_member_settings_pause_expiry() {
        let now = Utc::now();
        let mut settings = MemberSettings::defaults(Uuid::new_v4());
        assert!(!settings.notifications_paused(now));

        settings.notification_pause_expires_at = Some(now + chrono::Duration::hours(1));
        assert!(settings.notifications_paused(now));

        settings.notification_pause_expires_at = Some(now - chrono::Duration::hours(1));
        assert!(!settings.notifications_paused(now));
    }

    #[test]
    fn test_member_settings_chat_requires_link() {
        let mut settings = MemberSettings::defaults(Uuid::new_v4());
        settings.chat_notifications_enabled = true;
        assert!(!settings.chat_notifications_active());

        settings.chat_linked = true;
        assert!(settings.chat_notifications_active());
    }

    #[test]
    fn test_app_webhook_subscription_filter() {
        let webhook = AppWebhook {
            id: Uuid::new_v4(),
            app_id: Uuid::new_v4(),
            url: "https://example.com/hooks".to_string(),
            event_types: vec!["app.mentioned".to_string()],
            active: true,
            created_at: Utc::now(),
        };
        assert!(webhook.subscribed_to("app.mentioned"));
        assert!(!webhook.subscribed_to("post.created"));

        let inactive = AppWebhook {
            active: false,
            ..webhook
        };
        assert!(!inactive.subscribed_to("app.mentioned"));
    }

    #[test]
    fn test_subject_changes_empty() {
        assert!(SubjectChanges::default().is_empty());

        let changes = SubjectChanges {
            title: Some(FieldChange::new(None, Some("New".to_string()))),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_subject_changes_serde_round_trip() {
        let changes = SubjectChanges {
            title: Some(FieldChange::new(
                Some("Old".to_string()),
                Some("New".to_string()),
            )),
            resolved_at: Some(FieldChange::new(None, Some(Utc::now()))),
            ..Default::default()
        };
        let json = serde_json::to_string(&changes).unwrap();
        let parsed: SubjectChanges = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.title, changes.title);
        assert!(parsed.project_id.is_none());
    }

    #[test]
    fn test_timeline_metadata_serde_round_trip() {
        let meta = TimelineMetadata::Title {
            from_title: Some("Draft plan".to_string()),
            to_title: Some("Launch plan".to_string()),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "title");
        assert_eq!(json["from_title"], "Draft plan");

        let parsed: TimelineMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, meta);

        // Distinct shapes stay distinct through the tag.
        let meta = TimelineMetadata::Project {
            from_project_id: Some(Uuid::nil()),
            to_project_id: None,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "project");
        let parsed: TimelineMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn test_outbound_job_kind() {
        let job = OutboundJob::DeliverPush {
            notification_id: Uuid::nil(),
            push_subscription_id: Uuid::nil(),
        };
        assert_eq!(job.kind(), "deliver_push");

        let job = OutboundJob::TriggerRealtimeEvent {
            channel: "organization-x".to_string(),
            event: "posts-stale".to_string(),
            payload: serde_json::json!({}),
        };
        assert_eq!(job.kind(), "trigger_realtime_event");
    }

    #[test]
    fn test_outbound_job_serde_tagged() {
        let job = OutboundJob::DeliverChatMessage {
            notification_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["type"], "deliver_chat_message");

        let parsed: OutboundJob = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, job);
    }

    #[test]
    fn test_notification_state_predicates() {
        let notification = Notification {
            id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            target: SubjectRef::post(Uuid::new_v4()),
            subtarget: None,
            reason: NotificationReason::Mention,
            read_at: None,
            archived_at: None,
            discarded_at: None,
            chat_message_ts: None,
            created_at: Utc::now(),
        };
        assert!(!notification.read());
        assert!(!notification.archived());
        assert!(!notification.discarded());
        assert!(!notification.chat_message_delivered());
    }
}
