//! Realtime socket event names, channel naming, and payload shapes.
//!
//! The engine broadcasts UI-refresh hints over channel-scoped socket events.
//! Delivery itself is external — the engine enqueues
//! [`OutboundJob::TriggerRealtimeEvent`](crate::models::OutboundJob)
//! descriptors consumed by the socket gateway. This module pins down the
//! channel naming scheme and the JSON payload shapes so producer and
//! consumer agree.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::SubjectRef;

// ─── Event names ───────────────────────────────────────────────────────────

/// A notification row was created for the recipient.
pub const NEW_NOTIFICATION: &str = "new-notification";

/// The recipient's notification list changed out from under them.
pub const NOTIFICATIONS_STALE: &str = "notifications-stale";

/// A qualifying post mutation happened in the organization.
pub const POSTS_STALE: &str = "posts-stale";

/// A post was published in the organization.
pub const NEW_POST: &str = "new-post";

/// A post was published in a project the recipient belongs to or favorited.
pub const NEW_POST_IN_PROJECT: &str = "new-post-in-project";

/// A subject's timeline entries changed.
pub const TIMELINE_EVENTS_STALE: &str = "timeline-events-stale";

/// Project membership state changed.
pub const PROJECT_MEMBERSHIPS_STALE: &str = "project-memberships-stale";

// ─── Channel naming ────────────────────────────────────────────────────────

/// Private channel of one member.
pub fn member_channel(member_id: Uuid) -> String {
    format!("private-member-{member_id}")
}

/// Organization-wide channel.
pub fn organization_channel(organization_id: Uuid) -> String {
    format!("private-organization-{organization_id}")
}

/// Channel scoped to one subject (post, note, …) for timeline staleness.
pub fn subject_channel(subject: SubjectRef) -> String {
    format!("private-{}-{}", subject.kind, subject.id)
}

// ─── Payloads ──────────────────────────────────────────────────────────────

/// Payload of [`POSTS_STALE`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostsStalePayload {
    pub member_id: Option<Uuid>,
    pub project_ids: Vec<Uuid>,
}

/// Payload of [`NEW_POST`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPostPayload {
    pub post_id: Uuid,
    pub member_id: Option<Uuid>,
}

/// Payload of [`NEW_POST_IN_PROJECT`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPostInProjectPayload {
    pub project_id: Uuid,
}

/// Payload of [`NEW_NOTIFICATION`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotificationPayload {
    pub notification_id: Uuid,
    /// Hint for the socket client to suppress its local push banner while
    /// the recipient has notifications paused.
    pub skip_push: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubjectKind;

    #[test]
    fn test_channel_names_are_scoped() {
        let id = Uuid::nil();
        assert_eq!(
            member_channel(id),
            format!("private-member-{id}"),
        );
        assert_eq!(
            organization_channel(id),
            format!("private-organization-{id}"),
        );
        assert_eq!(
            subject_channel(SubjectRef::new(SubjectKind::Post, id)),
            format!("private-post-{id}"),
        );
        assert_eq!(
            subject_channel(SubjectRef::new(SubjectKind::Note, id)),
            format!("private-note-{id}"),
        );
    }

    #[test]
    fn test_posts_stale_payload_serde() {
        let payload = PostsStalePayload {
            member_id: None,
            project_ids: vec![Uuid::nil()],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["member_id"].is_null());
        assert_eq!(json["project_ids"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_new_notification_payload_serde() {
        let payload = NewNotificationPayload {
            notification_id: Uuid::nil(),
            skip_push: true,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["skip_push"], true);
    }
}
