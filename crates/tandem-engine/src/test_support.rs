//! In-memory store implementations and data builders for engine tests.
//!
//! The engine runs against the repository traits, so tests exercise the
//! full dispatch → process → apply → fan-out pipeline without a database.
//! `MemBackend` implements every trait over one mutex-guarded state bag and
//! exposes fixture helpers for seeding content and inspecting outcomes.
//!
//! Always compiled (not `#[cfg(test)]`) so scenario tests in `src/tests/`
//! and downstream consumers' tests can both use it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use tandem_core::*;

use crate::store::Store;

#[derive(Default)]
struct MemState {
    events: Vec<Event>,
    claimed: HashSet<Uuid>,
    notifications: Vec<Notification>,
    timeline: Vec<TimelineEvent>,
    subscriptions: Vec<Subscription>,
    permissions: Vec<Permission>,
    follow_ups: Vec<FollowUp>,
    favorites: Vec<Favorite>,
    pins: Vec<ProjectPin>,
    project_memberships: Vec<(Uuid, Uuid)>, // (project_id, member_id)
    settings: HashMap<Uuid, MemberSettings>,
    pushes: Vec<PushSubscription>,
    webhooks: Vec<(Uuid, AppWebhook)>, // (organization_id, webhook)
    posts: HashMap<Uuid, Post>,
    comments: HashMap<Uuid, Comment>,
    notes: HashMap<Uuid, Note>,
    projects: HashMap<Uuid, Project>,
    reactions: HashMap<Uuid, Reaction>,
    jobs: Vec<OutboundJob>,
}

/// In-memory backend implementing every store trait.
#[derive(Default)]
pub struct MemBackend {
    state: Mutex<MemState>,
}

/// Build a [`Store`] whose every repository is the given backend.
pub fn mem_store(backend: &Arc<MemBackend>) -> Store {
    Store {
        events: backend.clone(),
        notifications: backend.clone(),
        timeline: backend.clone(),
        subscriptions: backend.clone(),
        permissions: backend.clone(),
        access: backend.clone(),
        engagement: backend.clone(),
        memberships: backend.clone(),
        push_subscriptions: backend.clone(),
        app_webhooks: backend.clone(),
        content: backend.clone(),
        jobs: backend.clone(),
    }
}

impl MemBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // ─── Content fixtures ──────────────────────────────────────────────

    pub fn add_post(&self, post: Post) {
        self.state.lock().unwrap().posts.insert(post.id, post);
    }

    pub fn update_post(&self, id: Uuid, f: impl FnOnce(&mut Post)) {
        if let Some(post) = self.state.lock().unwrap().posts.get_mut(&id) {
            f(post);
        }
    }

    pub fn add_comment(&self, comment: Comment) {
        self.state
            .lock()
            .unwrap()
            .comments
            .insert(comment.id, comment);
    }

    pub fn update_comment(&self, id: Uuid, f: impl FnOnce(&mut Comment)) {
        if let Some(comment) = self.state.lock().unwrap().comments.get_mut(&id) {
            f(comment);
        }
    }

    pub fn add_note(&self, note: Note) {
        self.state.lock().unwrap().notes.insert(note.id, note);
    }

    pub fn update_note(&self, id: Uuid, f: impl FnOnce(&mut Note)) {
        if let Some(note) = self.state.lock().unwrap().notes.get_mut(&id) {
            f(note);
        }
    }

    pub fn add_project(&self, project: Project) {
        self.state
            .lock()
            .unwrap()
            .projects
            .insert(project.id, project);
    }

    pub fn add_reaction(&self, reaction: Reaction) {
        self.state
            .lock()
            .unwrap()
            .reactions
            .insert(reaction.id, reaction);
    }

    // ─── Relationship fixtures ─────────────────────────────────────────

    pub fn add_subscription(&self, member_id: Uuid, subject: SubjectRef, cascade: bool) {
        self.state.lock().unwrap().subscriptions.push(Subscription {
            id: new_v7(),
            member_id,
            subject,
            cascade,
            created_at: Utc::now(),
        });
    }

    pub fn add_permission(&self, permission: Permission) {
        self.state.lock().unwrap().permissions.push(permission);
    }

    pub fn discard_permission(&self, id: Uuid) {
        if let Some(p) = self
            .state
            .lock()
            .unwrap()
            .permissions
            .iter_mut()
            .find(|p| p.id == id)
        {
            p.discarded_at = Some(Utc::now());
        }
    }

    pub fn add_follow_up(&self, member_id: Uuid, subject: SubjectRef) -> Uuid {
        let id = new_v7();
        self.state.lock().unwrap().follow_ups.push(FollowUp {
            id,
            member_id,
            subject,
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_favorite(&self, member_id: Uuid, subject: SubjectRef) -> Uuid {
        let id = new_v7();
        self.state.lock().unwrap().favorites.push(Favorite {
            id,
            member_id,
            subject,
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_pin(&self, pin: ProjectPin) {
        self.state.lock().unwrap().pins.push(pin);
    }

    pub fn set_pin_discarded(&self, id: Uuid, discarded: bool) {
        if let Some(pin) = self.state.lock().unwrap().pins.iter_mut().find(|p| p.id == id) {
            pin.discarded_at = if discarded { Some(Utc::now()) } else { None };
        }
    }

    pub fn add_project_membership(&self, project_id: Uuid, member_id: Uuid) {
        self.state
            .lock()
            .unwrap()
            .project_memberships
            .push((project_id, member_id));
    }

    pub fn set_settings(&self, settings: MemberSettings) {
        self.state
            .lock()
            .unwrap()
            .settings
            .insert(settings.member_id, settings);
    }

    pub fn add_push_subscription(&self, member_id: Uuid) -> Uuid {
        let id = new_v7();
        self.state.lock().unwrap().pushes.push(PushSubscription {
            id,
            member_id,
            endpoint: format!("https://push.example.com/{id}"),
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_app_webhook(&self, organization_id: Uuid, webhook: AppWebhook) {
        self.state
            .lock()
            .unwrap()
            .webhooks
            .push((organization_id, webhook));
    }

    // ─── Inspection helpers ────────────────────────────────────────────

    /// All outbound jobs enqueued so far, in order.
    pub fn enqueued_jobs(&self) -> Vec<OutboundJob> {
        self.state.lock().unwrap().jobs.clone()
    }

    pub fn clear_jobs(&self) {
        self.state.lock().unwrap().jobs.clear();
    }

    /// Shift every timeline entry into the past, for exercising the rollup
    /// threshold without sleeping.
    pub fn age_timeline(&self, seconds: i64) {
        for entry in self.state.lock().unwrap().timeline.iter_mut() {
            entry.created_at -= Duration::seconds(seconds);
        }
    }

    fn event_subject(state: &MemState, event_id: Uuid) -> Option<SubjectRef> {
        state.events.iter().find(|e| e.id == event_id).map(|e| e.subject)
    }

    fn can_view_sync(state: &MemState, member_id: Uuid, subject: SubjectRef) -> bool {
        match subject.kind {
            SubjectKind::Post => match state.posts.get(&subject.id) {
                None => false,
                Some(post) => {
                    if post.author_id == Some(member_id) {
                        return true;
                    }
                    match post.project_id {
                        Some(project_id) => {
                            Self::can_view_sync(state, member_id, SubjectRef::project(project_id))
                        }
                        None => true,
                    }
                }
            },
            SubjectKind::Note => match state.notes.get(&subject.id) {
                None => false,
                Some(note) => {
                    if note.author_id == member_id {
                        return true;
                    }
                    let permitted = state.permissions.iter().any(|p| {
                        p.member_id == member_id
                            && p.subject == subject
                            && p.discarded_at.is_none()
                    });
                    if permitted {
                        return true;
                    }
                    match note.project_id {
                        Some(project_id) => {
                            Self::can_view_sync(state, member_id, SubjectRef::project(project_id))
                        }
                        None => false,
                    }
                }
            },
            SubjectKind::Project => match state.projects.get(&subject.id) {
                None => false,
                Some(project) => {
                    !project.private
                        || state
                            .project_memberships
                            .iter()
                            .any(|(p, m)| *p == subject.id && *m == member_id)
                }
            },
            SubjectKind::Comment => match state.comments.get(&subject.id) {
                None => false,
                Some(comment) => Self::can_view_sync(state, member_id, comment.subject),
            },
            SubjectKind::Reaction => match state.reactions.get(&subject.id) {
                None => false,
                Some(reaction) => Self::can_view_sync(state, member_id, reaction.subject),
            },
            SubjectKind::Permission | SubjectKind::ProjectPin | SubjectKind::FollowUp => true,
        }
    }
}

// ─── Trait implementations ─────────────────────────────────────────────

#[async_trait]
impl EventRepository for MemBackend {
    async fn record(&self, req: RecordEventRequest) -> Result<Event> {
        let event = Event {
            id: new_v7(),
            actor: req.actor,
            subject: req.subject,
            organization_id: req.organization_id,
            action: req.action,
            changes: req.changes,
            occurred_at: Utc::now(),
            skip_notifications: req.skip_notifications,
            processed_at: None,
        };
        self.state.lock().unwrap().events.push(event.clone());
        Ok(event)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Event>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn claim_next_unprocessed(&self) -> Result<Option<Event>> {
        let mut state = self.state.lock().unwrap();
        let next = state
            .events
            .iter()
            .find(|e| e.processed_at.is_none() && !state.claimed.contains(&e.id))
            .cloned();
        if let Some(event) = &next {
            state.claimed.insert(event.id);
        }
        Ok(next)
    }

    async fn mark_processed(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.claimed.remove(&id);
        if let Some(event) = state.events.iter_mut().find(|e| e.id == id) {
            event.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn unprocessed_count(&self) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.processed_at.is_none())
            .count() as i64)
    }
}

#[async_trait]
impl NotificationRepository for MemBackend {
    async fn find_or_create(
        &self,
        req: CreateNotificationRequest,
    ) -> Result<(Notification, bool)> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.notifications.iter().find(|n| {
            n.member_id == req.member_id
                && n.event_id == req.event_id
                && n.reason == req.reason
                && n.discarded_at.is_none()
        }) {
            return Ok((existing.clone(), false));
        }

        let notification = Notification {
            id: new_v7(),
            member_id: req.member_id,
            event_id: req.event_id,
            organization_id: req.organization_id,
            target: req.target,
            subtarget: req.subtarget,
            reason: req.reason,
            read_at: None,
            archived_at: None,
            discarded_at: None,
            chat_message_ts: None,
            created_at: Utc::now(),
        };
        state.notifications.push(notification.clone());
        Ok((notification, true))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned())
    }

    async fn live_for_event(&self, event_id: Uuid) -> Result<Vec<Notification>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .notifications
            .iter()
            .filter(|n| n.event_id == event_id && n.discarded_at.is_none())
            .cloned()
            .collect())
    }

    async fn live_for_member(&self, member_id: Uuid) -> Result<Vec<Notification>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .notifications
            .iter()
            .filter(|n| n.member_id == member_id && n.discarded_at.is_none())
            .cloned()
            .collect())
    }

    async fn discard_for_subject(&self, subject: SubjectRef) -> Result<Vec<Notification>> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let matching_events: HashSet<Uuid> = state
            .events
            .iter()
            .filter(|e| e.subject == subject)
            .map(|e| e.id)
            .collect();
        let mut discarded = Vec::new();
        for n in state.notifications.iter_mut() {
            if n.discarded_at.is_none() && matching_events.contains(&n.event_id) {
                n.discarded_at = Some(now);
                discarded.push(n.clone());
            }
        }
        Ok(discarded)
    }

    async fn discard_for_subject_reasons(
        &self,
        subject: SubjectRef,
        reasons: &[NotificationReason],
    ) -> Result<Vec<Notification>> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let matching_events: HashSet<Uuid> = state
            .events
            .iter()
            .filter(|e| e.subject == subject)
            .map(|e| e.id)
            .collect();
        let mut discarded = Vec::new();
        for n in state.notifications.iter_mut() {
            if n.discarded_at.is_none()
                && reasons.contains(&n.reason)
                && matching_events.contains(&n.event_id)
            {
                n.discarded_at = Some(now);
                discarded.push(n.clone());
            }
        }
        Ok(discarded)
    }

    async fn discard_for_member_target(
        &self,
        member_id: Uuid,
        target: SubjectRef,
    ) -> Result<Vec<Notification>> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let mut discarded = Vec::new();
        for n in state.notifications.iter_mut() {
            if n.discarded_at.is_none() && n.member_id == member_id && n.target == target {
                n.discarded_at = Some(now);
                discarded.push(n.clone());
            }
        }
        Ok(discarded)
    }

    async fn set_chat_message_ts(&self, id: Uuid, ts: &str) -> Result<()> {
        if let Some(n) = self
            .state
            .lock()
            .unwrap()
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
        {
            n.chat_message_ts = Some(ts.to_string());
        }
        Ok(())
    }

    async fn mark_read(&self, id: Uuid) -> Result<()> {
        if let Some(n) = self
            .state
            .lock()
            .unwrap()
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
        {
            n.read_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_unread(&self, id: Uuid) -> Result<()> {
        if let Some(n) = self
            .state
            .lock()
            .unwrap()
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
        {
            n.read_at = None;
        }
        Ok(())
    }

    async fn archive(&self, id: Uuid) -> Result<()> {
        if let Some(n) = self
            .state
            .lock()
            .unwrap()
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
        {
            n.archived_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn unarchive(&self, id: Uuid) -> Result<()> {
        if let Some(n) = self
            .state
            .lock()
            .unwrap()
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
        {
            n.archived_at = None;
        }
        Ok(())
    }
}

#[async_trait]
impl TimelineRepository for MemBackend {
    async fn insert(
        &self,
        candidate: &TimelineCandidate,
        reference: Option<SubjectRef>,
    ) -> Result<TimelineEvent> {
        let entry = TimelineEvent {
            id: new_v7(),
            actor: candidate.actor,
            subject: candidate.subject,
            reference,
            action: candidate.action,
            metadata: candidate.metadata.clone(),
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().timeline.push(entry.clone());
        Ok(entry)
    }

    async fn latest_for_subject_action(
        &self,
        subject: SubjectRef,
        action: TimelineAction,
    ) -> Result<Option<TimelineEvent>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .timeline
            .iter()
            .filter(|e| e.subject == subject && e.action == action)
            .max_by_key(|e| e.created_at)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.state.lock().unwrap().timeline.retain(|e| e.id != id);
        Ok(())
    }

    async fn find_or_create_reference(
        &self,
        subject: SubjectRef,
        actor: Option<ActorRef>,
        reference: SubjectRef,
    ) -> Result<(TimelineEvent, bool)> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.timeline.iter().find(|e| {
            e.subject == subject
                && e.reference == Some(reference)
                && e.action == TimelineAction::SubjectReferencedInInternalRecord
        }) {
            return Ok((existing.clone(), false));
        }

        let entry = TimelineEvent {
            id: new_v7(),
            actor,
            subject,
            reference: Some(reference),
            action: TimelineAction::SubjectReferencedInInternalRecord,
            metadata: None,
            created_at: Utc::now(),
        };
        state.timeline.push(entry.clone());
        Ok((entry, true))
    }

    async fn delete_reference(&self, subject: SubjectRef, reference: SubjectRef) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.timeline.len();
        state.timeline.retain(|e| {
            !(e.subject == subject
                && e.reference == Some(reference)
                && e.action == TimelineAction::SubjectReferencedInInternalRecord)
        });
        Ok((before - state.timeline.len()) as u64)
    }

    async fn delete_all_references_to(&self, reference: SubjectRef) -> Result<Vec<SubjectRef>> {
        let mut state = self.state.lock().unwrap();
        let mut subjects = Vec::new();
        for e in state.timeline.iter() {
            if e.reference == Some(reference)
                && e.action == TimelineAction::SubjectReferencedInInternalRecord
                && !subjects.contains(&e.subject)
            {
                subjects.push(e.subject);
            }
        }
        state.timeline.retain(|e| {
            !(e.reference == Some(reference)
                && e.action == TimelineAction::SubjectReferencedInInternalRecord)
        });
        Ok(subjects)
    }

    async fn list_for_subject(&self, subject: SubjectRef) -> Result<Vec<TimelineEvent>> {
        let mut entries: Vec<TimelineEvent> = self
            .state
            .lock()
            .unwrap()
            .timeline
            .iter()
            .filter(|e| e.subject == subject)
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.created_at, e.id));
        Ok(entries)
    }
}

#[async_trait]
impl SubscriptionRepository for MemBackend {
    async fn create_or_find(
        &self,
        member_id: Uuid,
        subject: SubjectRef,
        cascade: bool,
    ) -> Result<Subscription> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .subscriptions
            .iter()
            .find(|s| s.member_id == member_id && s.subject == subject)
        {
            return Ok(existing.clone());
        }
        let subscription = Subscription {
            id: new_v7(),
            member_id,
            subject,
            cascade,
            created_at: Utc::now(),
        };
        state.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn destroy(&self, member_id: Uuid, subject: SubjectRef) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.subscriptions.len();
        state
            .subscriptions
            .retain(|s| !(s.member_id == member_id && s.subject == subject));
        Ok(state.subscriptions.len() < before)
    }

    async fn subscriber_member_ids(&self, subject: SubjectRef) -> Result<Vec<Uuid>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .filter(|s| s.subject == subject)
            .map(|s| s.member_id)
            .collect())
    }

    async fn subscriptions_for_subject(&self, subject: SubjectRef) -> Result<Vec<Subscription>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .filter(|s| s.subject == subject)
            .cloned()
            .collect())
    }

    async fn exists(&self, member_id: Uuid, subject: SubjectRef) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .any(|s| s.member_id == member_id && s.subject == subject))
    }
}

#[async_trait]
impl PermissionRepository for MemBackend {
    async fn get(&self, id: Uuid) -> Result<Option<Permission>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .permissions
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn live_for_subject(&self, subject: SubjectRef) -> Result<Vec<Permission>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .permissions
            .iter()
            .filter(|p| p.subject == subject && p.discarded_at.is_none())
            .cloned()
            .collect())
    }

    async fn live_for_member_subject(
        &self,
        member_id: Uuid,
        subject: SubjectRef,
    ) -> Result<Option<Permission>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .permissions
            .iter()
            .find(|p| {
                p.member_id == member_id && p.subject == subject && p.discarded_at.is_none()
            })
            .cloned())
    }
}

#[async_trait]
impl AccessPolicy for MemBackend {
    async fn can_view(&self, member_id: Uuid, subject: SubjectRef) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(Self::can_view_sync(&state, member_id, subject))
    }
}

#[async_trait]
impl EngagementRepository for MemBackend {
    async fn destroy_follow_ups_for_subject(&self, subject: SubjectRef) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.follow_ups.len();
        state.follow_ups.retain(|f| f.subject != subject);
        Ok((before - state.follow_ups.len()) as u64)
    }

    async fn destroy_follow_ups_for_member_subject(
        &self,
        member_id: Uuid,
        subject: SubjectRef,
    ) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.follow_ups.len();
        state
            .follow_ups
            .retain(|f| !(f.member_id == member_id && f.subject == subject));
        Ok((before - state.follow_ups.len()) as u64)
    }

    async fn follow_ups_for_subject(&self, subject: SubjectRef) -> Result<Vec<FollowUp>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .follow_ups
            .iter()
            .filter(|f| f.subject == subject)
            .cloned()
            .collect())
    }

    async fn destroy_favorites_for_subject(&self, subject: SubjectRef) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.favorites.len();
        state.favorites.retain(|f| f.subject != subject);
        Ok((before - state.favorites.len()) as u64)
    }

    async fn destroy_favorites_for_member_subject(
        &self,
        member_id: Uuid,
        subject: SubjectRef,
    ) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.favorites.len();
        state
            .favorites
            .retain(|f| !(f.member_id == member_id && f.subject == subject));
        Ok((before - state.favorites.len()) as u64)
    }

    async fn favorites_for_subject(&self, subject: SubjectRef) -> Result<Vec<Favorite>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .favorites
            .iter()
            .filter(|f| f.subject == subject)
            .cloned()
            .collect())
    }

    async fn favoriting_member_ids(&self, subject: SubjectRef) -> Result<Vec<Uuid>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .favorites
            .iter()
            .filter(|f| f.subject == subject)
            .map(|f| f.member_id)
            .collect())
    }

    async fn discard_project_pins_for_subject(&self, subject: SubjectRef) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let mut discarded = 0;
        for pin in state.pins.iter_mut() {
            if pin.subject == subject && pin.discarded_at.is_none() {
                pin.discarded_at = Some(now);
                discarded += 1;
            }
        }
        Ok(discarded)
    }

    async fn project_pin(&self, id: Uuid) -> Result<Option<ProjectPin>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .pins
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }
}

#[async_trait]
impl MembershipRepository for MemBackend {
    async fn project_member_ids(&self, project_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .project_memberships
            .iter()
            .filter(|(p, _)| *p == project_id)
            .map(|(_, m)| *m)
            .collect())
    }

    async fn is_project_member(&self, member_id: Uuid, project_id: Uuid) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .project_memberships
            .iter()
            .any(|(p, m)| *p == project_id && *m == member_id))
    }

    async fn settings(&self, member_id: Uuid) -> Result<MemberSettings> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .settings
            .get(&member_id)
            .cloned()
            .unwrap_or_else(|| MemberSettings::defaults(member_id)))
    }
}

#[async_trait]
impl PushSubscriptionRepository for MemBackend {
    async fn active_for_member(&self, member_id: Uuid) -> Result<Vec<PushSubscription>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .pushes
            .iter()
            .filter(|p| p.member_id == member_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AppWebhookRepository for MemBackend {
    async fn active_for_app_event(
        &self,
        app_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<AppWebhook>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .webhooks
            .iter()
            .filter(|(_, w)| w.app_id == app_id && w.subscribed_to(event_type))
            .map(|(_, w)| w.clone())
            .collect())
    }

    async fn active_for_event(
        &self,
        organization_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<AppWebhook>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .webhooks
            .iter()
            .filter(|(org, w)| *org == organization_id && w.subscribed_to(event_type))
            .map(|(_, w)| w.clone())
            .collect())
    }
}

#[async_trait]
impl ContentRepository for MemBackend {
    async fn post(&self, id: Uuid) -> Result<Option<Post>> {
        Ok(self.state.lock().unwrap().posts.get(&id).cloned())
    }

    async fn comment(&self, id: Uuid) -> Result<Option<Comment>> {
        Ok(self.state.lock().unwrap().comments.get(&id).cloned())
    }

    async fn note(&self, id: Uuid) -> Result<Option<Note>> {
        Ok(self.state.lock().unwrap().notes.get(&id).cloned())
    }

    async fn project(&self, id: Uuid) -> Result<Option<Project>> {
        Ok(self.state.lock().unwrap().projects.get(&id).cloned())
    }

    async fn reaction(&self, id: Uuid) -> Result<Option<Reaction>> {
        Ok(self.state.lock().unwrap().reactions.get(&id).cloned())
    }

    async fn reply_ids(&self, comment_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .comments
            .values()
            .filter(|c| c.parent_id == Some(comment_id) && c.discarded_at.is_none())
            .map(|c| c.id)
            .collect())
    }

    async fn latest_comment_at(&self, subject: SubjectRef) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .comments
            .values()
            .filter(|c| c.subject == subject && c.discarded_at.is_none())
            .map(|c| c.created_at)
            .max())
    }

    async fn set_last_activity(&self, subject: SubjectRef, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match subject.kind {
            SubjectKind::Post => {
                if let Some(post) = state.posts.get_mut(&subject.id) {
                    post.last_activity_at = at;
                }
            }
            SubjectKind::Note => {
                if let Some(note) = state.notes.get_mut(&subject.id) {
                    note.last_activity_at = at;
                }
            }
            SubjectKind::Project => {
                if let Some(project) = state.projects.get_mut(&subject.id) {
                    project.last_activity_at = Some(at);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[async_trait]
impl JobQueue for MemBackend {
    async fn enqueue(&self, job: OutboundJob) -> Result<Uuid> {
        self.state.lock().unwrap().jobs.push(job);
        Ok(new_v7())
    }
}

// ─── Fixture builders ──────────────────────────────────────────────────

/// A published post with no project, parent, or body references.
pub fn make_post(organization_id: Uuid, author_id: Option<Uuid>) -> Post {
    let now = Utc::now();
    Post {
        id: new_v7(),
        organization_id,
        project_id: None,
        parent_id: None,
        author_id,
        title: "Weekly sync notes".to_string(),
        body_html: "<p>Hello team</p>".to_string(),
        draft: false,
        visibility: Visibility::Default,
        resolved_at: None,
        resolved_by_id: None,
        resolved_comment_id: None,
        published_at: Some(now),
        last_activity_at: now,
    }
}

/// A kept top-level comment on `subject`.
pub fn make_comment(organization_id: Uuid, subject: SubjectRef, author_id: Uuid) -> Comment {
    Comment {
        id: new_v7(),
        organization_id,
        subject,
        parent_id: None,
        author_id,
        body_html: "<p>Nice work</p>".to_string(),
        resolved_at: None,
        resolved_by_id: None,
        discarded_at: None,
        created_at: Utc::now(),
    }
}

pub fn make_note(organization_id: Uuid, author_id: Uuid) -> Note {
    let now = Utc::now();
    Note {
        id: new_v7(),
        organization_id,
        author_id,
        project_id: None,
        title: Some("Planning doc".to_string()),
        body_html: "<p>Notes</p>".to_string(),
        content_updated_at: now,
        last_activity_at: now,
    }
}

pub fn make_project(organization_id: Uuid, private: bool) -> Project {
    Project {
        id: new_v7(),
        organization_id,
        name: "Engineering".to_string(),
        private,
        last_activity_at: None,
    }
}

pub fn make_reaction(organization_id: Uuid, subject: SubjectRef, member_id: Uuid) -> Reaction {
    Reaction {
        id: new_v7(),
        organization_id,
        subject,
        member_id,
        content: "👍".to_string(),
    }
}

pub fn make_permission(member_id: Uuid, subject: SubjectRef) -> Permission {
    Permission {
        id: new_v7(),
        member_id,
        subject,
        action: PermissionAction::View,
        discarded_at: None,
        created_at: Utc::now(),
    }
}

pub fn make_pin(project_id: Uuid, subject: SubjectRef) -> ProjectPin {
    ProjectPin {
        id: new_v7(),
        project_id,
        subject,
        discarded_at: None,
        created_at: Utc::now(),
    }
}

pub fn make_app_webhook(app_id: Uuid, event_types: &[&str]) -> AppWebhook {
    AppWebhook {
        id: new_v7(),
        app_id,
        url: "https://hooks.example.com/app".to_string(),
        event_types: event_types.iter().map(|s| s.to_string()).collect(),
        active: true,
        created_at: Utc::now(),
    }
}
