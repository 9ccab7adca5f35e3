//! Side-effect values produced by processors, and the applier that
//! executes them.
//!
//! Processors are pure decision logic: they read current state and return
//! an ordered [`Effects`] list. The applier executes effects through the
//! store with idempotent upserts and discards, enforces the cross-cutting
//! notification invariants (no self-actor notification, reason priority via
//! the per-run notified set, permission-aware visibility), and triggers the
//! per-channel delivery fan-out for every notification actually created.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use tandem_core::{
    realtime, AccessPolicy, ContentRepository, CreateNotificationRequest, EngagementRepository,
    Event, JobQueue, Notification, NotificationReason, NotificationRepository, OutboundJob, Result,
    SubjectRef, SubscriptionRepository, TimelineCandidate, TimelineRepository,
};

use crate::notify;
use crate::rollup;
use crate::store::Store;

/// One side effect of processing an event.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Upsert a notification for a recipient. Subject to the applier's
    /// guards: actor exclusion, per-run dedup (first reason wins), view
    /// access, and the `skip_notifications` event flag.
    Notify {
        member_id: Uuid,
        reason: NotificationReason,
        target: SubjectRef,
        subtarget: Option<SubjectRef>,
    },
    /// Discard live notifications whose event subject matches.
    DiscardForSubject { subject: SubjectRef },
    /// Discard live notifications whose event subject matches, filtered by
    /// reason.
    DiscardForSubjectReasons {
        subject: SubjectRef,
        reasons: Vec<NotificationReason>,
    },
    /// Discard live notifications for one recipient pointing at a target.
    DiscardForMemberTarget {
        member_id: Uuid,
        target: SubjectRef,
    },
    /// Subscribe a member to a subject (access-gated, idempotent).
    Subscribe { member_id: Uuid, subject: SubjectRef },
    /// Remove a member's subscription to a subject.
    Unsubscribe { member_id: Uuid, subject: SubjectRef },
    /// Record a timeline entry through the rollup engine.
    Timeline(TimelineCandidate),
    /// Ensure a reference entry exists on `subject`'s timeline pointing at
    /// `reference`.
    AddReference {
        subject: SubjectRef,
        reference: SubjectRef,
    },
    /// Remove the reference entry on `subject`'s timeline pointing at
    /// `reference`.
    RemoveReference {
        subject: SubjectRef,
        reference: SubjectRef,
    },
    /// Remove every reference entry pointing at `reference`, across all
    /// timelines. Used when the referencing entity is destroyed.
    RemoveAllReferencesTo { reference: SubjectRef },
    /// Destroy all follow-ups for a subject.
    DestroyFollowUpsForSubject { subject: SubjectRef },
    /// Destroy one member's follow-ups for a subject.
    DestroyFollowUpsForMember { member_id: Uuid, subject: SubjectRef },
    /// Destroy all favorites for a subject.
    DestroyFavoritesForSubject { subject: SubjectRef },
    /// Destroy one member's favorites for a subject.
    DestroyFavoritesForMember { member_id: Uuid, subject: SubjectRef },
    /// Soft-delete project pins of a subject.
    DiscardProjectPins { subject: SubjectRef },
    /// Bump a subject's activity timestamp.
    SetLastActivity {
        subject: SubjectRef,
        at: DateTime<Utc>,
    },
    /// Enqueue an outbound delivery job as-is.
    Enqueue(OutboundJob),
}

/// Ordered list of effects with builder helpers.
#[derive(Debug, Default)]
pub struct Effects {
    items: Vec<Effect>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: Effect) {
        self.items.push(effect);
    }

    pub fn extend(&mut self, effects: impl IntoIterator<Item = Effect>) {
        self.items.extend(effects);
    }

    pub fn notify(
        &mut self,
        member_id: Uuid,
        reason: NotificationReason,
        target: SubjectRef,
        subtarget: Option<SubjectRef>,
    ) {
        self.push(Effect::Notify {
            member_id,
            reason,
            target,
            subtarget,
        });
    }

    pub fn subscribe(&mut self, member_id: Uuid, subject: SubjectRef) {
        self.push(Effect::Subscribe { member_id, subject });
    }

    pub fn unsubscribe(&mut self, member_id: Uuid, subject: SubjectRef) {
        self.push(Effect::Unsubscribe { member_id, subject });
    }

    pub fn timeline(&mut self, candidate: TimelineCandidate) {
        self.push(Effect::Timeline(candidate));
    }

    pub fn enqueue(&mut self, job: OutboundJob) {
        self.push(Effect::Enqueue(job));
    }

    /// Enqueue a realtime socket trigger.
    pub fn realtime(&mut self, channel: String, event: &str, payload: JsonValue) {
        self.push(Effect::Enqueue(OutboundJob::TriggerRealtimeEvent {
            channel,
            event: event.to_string(),
            payload,
        }));
    }

    pub fn set_last_activity(&mut self, subject: SubjectRef, at: DateTime<Utc>) {
        self.push(Effect::SetLastActivity { subject, at });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.items.iter()
    }
}

impl IntoIterator for Effects {
    type Item = Effect;
    type IntoIter = std::vec::IntoIter<Effect>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Counters summarizing one apply pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApplyStats {
    pub notifications_created: usize,
    pub notifications_discarded: usize,
    pub timeline_changes: usize,
    pub jobs_enqueued: usize,
}

/// Execute effects in order through the store.
///
/// Safe to run twice for the same event: every mutation is an idempotent
/// upsert or discard, and fan-out only fires for notifications that were
/// actually created by this pass.
pub async fn apply(store: &Store, event: &Event, effects: Effects) -> Result<ApplyStats> {
    let mut stats = ApplyStats::default();
    // Recipients already notified in this run; makes the first emitted
    // reason win when one member qualifies under several.
    let mut notified: HashSet<Uuid> = HashSet::new();

    for effect in effects {
        match effect {
            Effect::Notify {
                member_id,
                reason,
                target,
                subtarget,
            } => {
                if event.skip_notifications {
                    continue;
                }
                if event.actor_member_id() == Some(member_id) {
                    continue;
                }
                if notified.contains(&member_id) {
                    continue;
                }
                if !store.access.can_view(member_id, target).await? {
                    debug!(
                        member_id = %member_id,
                        target = %target,
                        "Skipping notification: recipient cannot view target"
                    );
                    continue;
                }

                let (notification, created) = store
                    .notifications
                    .find_or_create(CreateNotificationRequest {
                        member_id,
                        event_id: event.id,
                        organization_id: event.organization_id,
                        target,
                        subtarget,
                        reason,
                    })
                    .await?;
                notified.insert(member_id);

                if created {
                    stats.notifications_created += 1;
                    stats.jobs_enqueued += notify::fan_out(store, &notification).await?;
                }
            }

            Effect::DiscardForSubject { subject } => {
                let discarded = store.notifications.discard_for_subject(subject).await?;
                stats.jobs_enqueued += discard_cleanup(store, &discarded).await?;
                stats.notifications_discarded += discarded.len();
            }
            Effect::DiscardForSubjectReasons { subject, reasons } => {
                let discarded = store
                    .notifications
                    .discard_for_subject_reasons(subject, &reasons)
                    .await?;
                stats.jobs_enqueued += discard_cleanup(store, &discarded).await?;
                stats.notifications_discarded += discarded.len();
            }
            Effect::DiscardForMemberTarget { member_id, target } => {
                let discarded = store
                    .notifications
                    .discard_for_member_target(member_id, target)
                    .await?;
                stats.jobs_enqueued += discard_cleanup(store, &discarded).await?;
                stats.notifications_discarded += discarded.len();
            }

            Effect::Subscribe { member_id, subject } => {
                if store.access.can_view(member_id, subject).await? {
                    store
                        .subscriptions
                        .create_or_find(member_id, subject, false)
                        .await?;
                }
            }
            Effect::Unsubscribe { member_id, subject } => {
                store.subscriptions.destroy(member_id, subject).await?;
            }

            Effect::Timeline(candidate) => {
                let subject = candidate.subject;
                rollup::record(store.timeline.as_ref(), candidate, Utc::now()).await?;
                stats.timeline_changes += 1;
                stats.jobs_enqueued += timeline_stale(store, subject).await?;
            }
            Effect::AddReference { subject, reference } => {
                let (_, created) = store
                    .timeline
                    .find_or_create_reference(subject, Some(event.actor), reference)
                    .await?;
                if created {
                    stats.timeline_changes += 1;
                    stats.jobs_enqueued += timeline_stale(store, subject).await?;
                }
            }
            Effect::RemoveReference { subject, reference } => {
                let removed = store.timeline.delete_reference(subject, reference).await?;
                if removed > 0 {
                    stats.timeline_changes += 1;
                    stats.jobs_enqueued += timeline_stale(store, subject).await?;
                }
            }
            Effect::RemoveAllReferencesTo { reference } => {
                let subjects = store.timeline.delete_all_references_to(reference).await?;
                for subject in subjects {
                    stats.timeline_changes += 1;
                    stats.jobs_enqueued += timeline_stale(store, subject).await?;
                }
            }

            Effect::DestroyFollowUpsForSubject { subject } => {
                store.engagement.destroy_follow_ups_for_subject(subject).await?;
            }
            Effect::DestroyFollowUpsForMember { member_id, subject } => {
                store
                    .engagement
                    .destroy_follow_ups_for_member_subject(member_id, subject)
                    .await?;
            }
            Effect::DestroyFavoritesForSubject { subject } => {
                store.engagement.destroy_favorites_for_subject(subject).await?;
            }
            Effect::DestroyFavoritesForMember { member_id, subject } => {
                store
                    .engagement
                    .destroy_favorites_for_member_subject(member_id, subject)
                    .await?;
            }
            Effect::DiscardProjectPins { subject } => {
                store
                    .engagement
                    .discard_project_pins_for_subject(subject)
                    .await?;
            }

            Effect::SetLastActivity { subject, at } => {
                store.content.set_last_activity(subject, at).await?;
            }

            Effect::Enqueue(job) => {
                store.jobs.enqueue(job).await?;
                stats.jobs_enqueued += 1;
            }
        }
    }

    Ok(stats)
}

/// Post-discard cleanup: delete delivered chat messages and nudge each
/// recipient's client to refresh. Returns the number of jobs enqueued.
async fn discard_cleanup(store: &Store, discarded: &[Notification]) -> Result<usize> {
    let mut enqueued = 0;
    for notification in discarded {
        if notification.chat_message_delivered() {
            store
                .jobs
                .enqueue(OutboundJob::DeleteChatMessage {
                    notification_id: notification.id,
                })
                .await?;
            enqueued += 1;
        }
        store
            .jobs
            .enqueue(OutboundJob::TriggerRealtimeEvent {
                channel: realtime::member_channel(notification.member_id),
                event: realtime::NOTIFICATIONS_STALE.to_string(),
                payload: JsonValue::Null,
            })
            .await?;
        enqueued += 1;
    }
    Ok(enqueued)
}

/// Nudge subject-timeline viewers to refresh.
async fn timeline_stale(store: &Store, subject: SubjectRef) -> Result<usize> {
    store
        .jobs
        .enqueue(OutboundJob::TriggerRealtimeEvent {
            channel: realtime::subject_channel(subject),
            event: realtime::TIMELINE_EVENTS_STALE.to_string(),
            payload: JsonValue::Null,
        })
        .await?;
    Ok(1)
}
