//! Post event processors.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value as JsonValue};

use tandem_core::{
    parse_mentions, realtime, AppWebhookRepository, ContentRepository, EngagementRepository,
    Event, MembershipRepository, NotificationReason, OutboundJob, Post, Result, SubjectRef,
    SubscriptionRepository, TimelineAction, TimelineCandidate, TimelineMetadata,
};

use crate::dispatcher::EventProcessor;
use crate::effects::{Effect, Effects};
use crate::processors::{APP_MENTIONED, POST_CREATED};
use crate::references;
use crate::store::Store;

fn webhook_payload(post: &Post) -> JsonValue {
    json!({
        "post_id": post.id,
        "organization_id": post.organization_id,
        "project_id": post.project_id,
    })
}

/// Effects shared by post creation and publication: recipients, app
/// webhooks, realtime hints, activity bump, and reference detection.
/// Draft gating happens in the callers.
async fn publication_effects(event: &Event, store: &Store, post: &Post) -> Result<Effects> {
    let mut fx = Effects::new();
    let post_ref = post.subject_ref();
    let mentions = parse_mentions(&post.body_html);

    if !event.skip_notifications {
        // Mentions first — when a member is both mentioned and subscribed,
        // the mention reason wins.
        for member in &mentions.member_ids {
            fx.subscribe(*member, post_ref);
            fx.notify(*member, NotificationReason::Mention, post_ref, None);
        }

        if let Some(parent_id) = post.parent_id {
            let parent_ref = SubjectRef::post(parent_id);
            for member in store.subscriptions.subscriber_member_ids(parent_ref).await? {
                fx.notify(member, NotificationReason::ParentSubscription, post_ref, None);
            }
        }

        if let Some(project_id) = post.project_id {
            let project_ref = SubjectRef::project(project_id);
            for subscription in store
                .subscriptions
                .subscriptions_for_subject(project_ref)
                .await?
            {
                if subscription.cascade {
                    fx.subscribe(subscription.member_id, post_ref);
                }
                fx.notify(
                    subscription.member_id,
                    NotificationReason::ProjectSubscription,
                    post_ref,
                    None,
                );
            }
        }
    }

    // App-mention webhooks: a parallel fan-out, not gated by the internal
    // notification model.
    for app_id in &mentions.app_ids {
        for webhook in store
            .app_webhooks
            .active_for_app_event(*app_id, APP_MENTIONED)
            .await?
        {
            fx.enqueue(OutboundJob::DeliverWebhook {
                webhook_id: webhook.id,
                event_type: APP_MENTIONED.to_string(),
                payload: webhook_payload(post),
            });
        }
    }

    // post.created webhooks, suppressed when the post lives in a private
    // project.
    let project = match post.project_id {
        Some(id) => store.content.project(id).await?,
        None => None,
    };
    let private_project = project.as_ref().map(|p| p.private).unwrap_or(false);
    if !private_project {
        for webhook in store
            .app_webhooks
            .active_for_event(post.organization_id, POST_CREATED)
            .await?
        {
            fx.enqueue(OutboundJob::DeliverWebhook {
                webhook_id: webhook.id,
                event_type: POST_CREATED.to_string(),
                payload: webhook_payload(post),
            });
        }
    }

    if !event.skip_notifications {
        let org_channel = realtime::organization_channel(post.organization_id);
        fx.realtime(
            org_channel.clone(),
            realtime::NEW_POST,
            serde_json::to_value(realtime::NewPostPayload {
                post_id: post.id,
                member_id: post.author_id,
            })?,
        );
        fx.realtime(
            org_channel,
            realtime::POSTS_STALE,
            serde_json::to_value(realtime::PostsStalePayload {
                member_id: post.author_id,
                project_ids: post.project_id.into_iter().collect(),
            })?,
        );

        if let Some(project_id) = post.project_id {
            let project_ref = SubjectRef::project(project_id);
            let members = store.memberships.project_member_ids(project_id).await?;
            let mut interested = members.clone();
            for favoriter in store.engagement.favoriting_member_ids(project_ref).await? {
                if !interested.contains(&favoriter) {
                    interested.push(favoriter);
                }
            }
            for member in interested {
                if Some(member) == post.author_id {
                    continue;
                }
                fx.realtime(
                    realtime::member_channel(member),
                    realtime::NEW_POST_IN_PROJECT,
                    serde_json::to_value(realtime::NewPostInProjectPayload { project_id })?,
                );
            }
            for member in members {
                fx.realtime(
                    realtime::member_channel(member),
                    realtime::PROJECT_MEMBERSHIPS_STALE,
                    JsonValue::Null,
                );
            }
        }
    }

    if let Some(project_id) = post.project_id {
        fx.set_last_activity(SubjectRef::project(project_id), Utc::now());
    }

    fx.extend(
        references::diff_effects(
            store,
            post.organization_id,
            post_ref,
            post_ref,
            None,
            &post.body_html,
        )
        .await?,
    );

    Ok(fx)
}

/// Handles `(post, created)`.
pub struct PostCreatedProcessor;

#[async_trait]
impl EventProcessor for PostCreatedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        let Some(post) = store.content.post(event.subject.id).await? else {
            return Ok(Effects::new());
        };
        // Drafts produce nothing: no notifications, no timeline entries,
        // no webhooks. Publication fires a separate event later.
        if post.draft {
            return Ok(Effects::new());
        }
        publication_effects(event, store, &post).await
    }
}

/// Handles `(post, published)` — a draft becoming visible. Recipient
/// computation matches creation, with the whole body treated as new.
pub struct PostPublishedProcessor;

#[async_trait]
impl EventProcessor for PostPublishedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        let Some(post) = store.content.post(event.subject.id).await? else {
            return Ok(Effects::new());
        };
        if post.draft {
            // Stale publish event racing a re-draft; current state wins.
            return Ok(Effects::new());
        }
        publication_effects(event, store, &post).await
    }
}

/// Handles `(post, updated)`.
pub struct PostUpdatedProcessor;

#[async_trait]
impl EventProcessor for PostUpdatedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        let Some(post) = store.content.post(event.subject.id).await? else {
            return Ok(Effects::new());
        };
        if post.draft {
            return Ok(Effects::new());
        }

        let mut fx = Effects::new();
        let post_ref = post.subject_ref();
        let changes = &event.changes;

        if !event.skip_notifications {
            // Only newly mentioned members are notified; prior mentions are
            // never renotified.
            if let Some(body) = &changes.body_html {
                let current = body.to.as_deref().unwrap_or(&post.body_html);
                for member in
                    tandem_core::new_member_mentions(body.from.as_deref(), current)
                {
                    fx.subscribe(member, post_ref);
                    fx.notify(member, NotificationReason::Mention, post_ref, None);
                }
                for app_id in tandem_core::new_app_mentions(body.from.as_deref(), current) {
                    for webhook in store
                        .app_webhooks
                        .active_for_app_event(app_id, APP_MENTIONED)
                        .await?
                    {
                        fx.enqueue(OutboundJob::DeliverWebhook {
                            webhook_id: webhook.id,
                            event_type: APP_MENTIONED.to_string(),
                            payload: webhook_payload(&post),
                        });
                    }
                }
            }

            // Resolution transitions. Current state wins over event order:
            // a late-arriving unresolve still discards whatever
            // resolved-reason rows exist.
            if let Some(resolved) = &changes.resolved_at {
                let was_resolved = resolved.from.is_some();
                if !was_resolved && post.resolved() {
                    if let (Some(comment_id), Some(resolved_by)) =
                        (post.resolved_comment_id, post.resolved_by_id)
                    {
                        if let Some(comment) = store.content.comment(comment_id).await? {
                            if comment.author_id != resolved_by {
                                fx.notify(
                                    comment.author_id,
                                    NotificationReason::PostResolvedFromComment,
                                    post_ref,
                                    Some(comment.subject_ref()),
                                );
                            }
                        }
                    }
                    for member in store.subscriptions.subscriber_member_ids(post_ref).await? {
                        if Some(member) == post.resolved_by_id {
                            continue;
                        }
                        fx.notify(member, NotificationReason::PostResolved, post_ref, None);
                    }
                } else if was_resolved && !post.resolved() {
                    fx.push(Effect::DiscardForSubjectReasons {
                        subject: post_ref,
                        reasons: vec![
                            NotificationReason::PostResolved,
                            NotificationReason::PostResolvedFromComment,
                        ],
                    });
                }
            }
        }

        // Timeline bookkeeping runs regardless of skip_notifications.
        if let Some(title) = &changes.title {
            fx.timeline(
                TimelineCandidate::new(
                    Some(event.actor),
                    post_ref,
                    TimelineAction::SubjectTitleUpdated,
                )
                .with_metadata(TimelineMetadata::Title {
                    from_title: title.from.clone(),
                    to_title: title.to.clone(),
                }),
            );
        }
        if changes.resolved_at.is_some() {
            let action = if post.resolved() {
                TimelineAction::PostResolved
            } else {
                TimelineAction::PostUnresolved
            };
            fx.timeline(TimelineCandidate::new(Some(event.actor), post_ref, action));
        }
        if let Some(project) = &changes.project_id {
            fx.timeline(
                TimelineCandidate::new(
                    Some(event.actor),
                    post_ref,
                    TimelineAction::SubjectProjectUpdated,
                )
                .with_metadata(TimelineMetadata::Project {
                    from_project_id: project.from,
                    to_project_id: project.to,
                }),
            );
            // Both the old and new project see activity from the move.
            for project_id in [project.from, project.to].into_iter().flatten() {
                fx.set_last_activity(SubjectRef::project(project_id), Utc::now());
            }
        }
        if let Some(visibility) = &changes.visibility {
            fx.timeline(
                TimelineCandidate::new(
                    Some(event.actor),
                    post_ref,
                    TimelineAction::PostVisibilityUpdated,
                )
                .with_metadata(TimelineMetadata::Visibility {
                    from_visibility: visibility.from,
                    to_visibility: visibility.to,
                }),
            );
        }

        if let Some(body) = &changes.body_html {
            let current = body.to.as_deref().unwrap_or(&post.body_html);
            fx.extend(
                references::diff_effects(
                    store,
                    post.organization_id,
                    post_ref,
                    post_ref,
                    body.from.as_deref(),
                    current,
                )
                .await?,
            );
        }

        if !event.skip_notifications {
            let mut project_ids: Vec<_> = post.project_id.into_iter().collect();
            if let Some(project) = &changes.project_id {
                if let Some(previous) = project.from {
                    if !project_ids.contains(&previous) {
                        project_ids.push(previous);
                    }
                }
            }
            fx.realtime(
                realtime::organization_channel(post.organization_id),
                realtime::POSTS_STALE,
                serde_json::to_value(realtime::PostsStalePayload {
                    member_id: post.author_id,
                    project_ids,
                })?,
            );
        }

        Ok(fx)
    }
}

/// Handles `(post, destroyed)`.
///
/// Works off the subject identity alone so it stays a valid cleanup pass
/// even when the post row is already gone.
pub struct PostDestroyedProcessor;

#[async_trait]
impl EventProcessor for PostDestroyedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        let mut fx = Effects::new();
        let post_ref = event.subject;

        fx.push(Effect::DiscardForSubject { subject: post_ref });
        fx.push(Effect::DestroyFollowUpsForSubject { subject: post_ref });
        fx.push(Effect::DestroyFavoritesForSubject { subject: post_ref });
        fx.push(Effect::DiscardProjectPins { subject: post_ref });
        fx.push(Effect::RemoveAllReferencesTo {
            reference: post_ref,
        });

        if !event.skip_notifications {
            let project_ids = match store.content.post(post_ref.id).await? {
                Some(post) => post.project_id.into_iter().collect(),
                None => Vec::new(),
            };
            fx.realtime(
                realtime::organization_channel(event.organization_id),
                realtime::POSTS_STALE,
                serde_json::to_value(realtime::PostsStalePayload {
                    member_id: event.actor_member_id(),
                    project_ids,
                })?,
            );
        }

        Ok(fx)
    }
}
