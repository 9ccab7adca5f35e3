//! Comment event processors.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use tandem_core::{
    parse_mentions, realtime, AppWebhookRepository, Comment, ContentRepository, Event,
    NotificationReason, OutboundJob, Result, SubjectKind, SubjectRef, SubscriptionRepository,
};

use crate::dispatcher::EventProcessor;
use crate::effects::{Effect, Effects};
use crate::processors::APP_MENTIONED;
use crate::references;
use crate::store::Store;

/// Realtime staleness hint when a post gains or loses a comment.
async fn posts_stale_effects(
    store: &Store,
    event: &Event,
    comment: &Comment,
    fx: &mut Effects,
) -> Result<()> {
    if event.skip_notifications || comment.subject.kind != SubjectKind::Post {
        return Ok(());
    }
    let Some(post) = store.content.post(comment.subject.id).await? else {
        return Ok(());
    };
    fx.realtime(
        realtime::organization_channel(post.organization_id),
        realtime::POSTS_STALE,
        serde_json::to_value(realtime::PostsStalePayload {
            member_id: post.author_id,
            project_ids: post.project_id.into_iter().collect(),
        })?,
    );
    Ok(())
}

/// Handles `(comment, created)`.
pub struct CommentCreatedProcessor;

#[async_trait]
impl EventProcessor for CommentCreatedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        let Some(comment) = store.content.comment(event.subject.id).await? else {
            return Ok(Effects::new());
        };

        let mut fx = Effects::new();
        let comment_ref = comment.subject_ref();
        let mentions = parse_mentions(&comment.body_html);

        if !event.skip_notifications {
            // Mentions first so the mention reason wins for members who are
            // also subscribed to the subject.
            for member in &mentions.member_ids {
                if *member == comment.author_id {
                    continue;
                }
                fx.subscribe(*member, comment.subject);
                fx.notify(
                    *member,
                    NotificationReason::Mention,
                    comment.subject,
                    Some(comment_ref),
                );
            }

            for member in store
                .subscriptions
                .subscriber_member_ids(comment.subject)
                .await?
            {
                if member == comment.author_id {
                    continue;
                }
                fx.notify(
                    member,
                    NotificationReason::ParentSubscription,
                    comment.subject,
                    Some(comment_ref),
                );
            }
        }

        // App mentions only fire for comments on posts.
        if comment.subject.kind == SubjectKind::Post {
            for app_id in &mentions.app_ids {
                for webhook in store
                    .app_webhooks
                    .active_for_app_event(*app_id, APP_MENTIONED)
                    .await?
                {
                    fx.enqueue(OutboundJob::DeliverWebhook {
                        webhook_id: webhook.id,
                        event_type: APP_MENTIONED.to_string(),
                        payload: json!({
                            "comment_id": comment.id,
                            "organization_id": comment.organization_id,
                        }),
                    });
                }
            }
        }

        posts_stale_effects(store, event, &comment, &mut fx).await?;

        fx.set_last_activity(comment.subject, Utc::now());

        fx.extend(
            references::diff_effects(
                store,
                comment.organization_id,
                comment_ref,
                comment.subject,
                None,
                &comment.body_html,
            )
            .await?,
        );

        Ok(fx)
    }
}

/// Handles `(comment, updated)`.
pub struct CommentUpdatedProcessor;

#[async_trait]
impl EventProcessor for CommentUpdatedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        let Some(comment) = store.content.comment(event.subject.id).await? else {
            return Ok(Effects::new());
        };

        let mut fx = Effects::new();
        let comment_ref = comment.subject_ref();
        let changes = &event.changes;

        if !event.skip_notifications {
            if let Some(body) = &changes.body_html {
                let current = body.to.as_deref().unwrap_or(&comment.body_html);
                for member in tandem_core::new_member_mentions(body.from.as_deref(), current) {
                    if member == comment.author_id {
                        continue;
                    }
                    fx.subscribe(member, comment.subject);
                    fx.notify(
                        member,
                        NotificationReason::Mention,
                        comment.subject,
                        Some(comment_ref),
                    );
                }
            }

            // Resolution only notifies for top-level comments, and never
            // when the author resolved their own comment. An unresolve
            // discards whatever resolved-reason rows exist, regardless of
            // which event created them.
            if changes.resolved_at.is_some() && !comment.reply() {
                if comment.resolved() {
                    if comment.resolved_by_id != Some(comment.author_id) {
                        fx.notify(
                            comment.author_id,
                            NotificationReason::CommentResolved,
                            comment.subject,
                            Some(comment_ref),
                        );
                    }
                } else {
                    fx.push(Effect::DiscardForSubjectReasons {
                        subject: comment_ref,
                        reasons: vec![
                            NotificationReason::CommentResolved,
                            NotificationReason::CommentResolvedFromComment,
                        ],
                    });
                }
            }
        }

        if let Some(body) = &changes.body_html {
            let current = body.to.as_deref().unwrap_or(&comment.body_html);
            fx.extend(
                references::diff_effects(
                    store,
                    comment.organization_id,
                    comment_ref,
                    comment.subject,
                    body.from.as_deref(),
                    current,
                )
                .await?,
            );
        }

        Ok(fx)
    }
}

/// Handles `(comment, destroyed)`.
pub struct CommentDestroyedProcessor;

#[async_trait]
impl EventProcessor for CommentDestroyedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        let mut fx = Effects::new();
        let comment_ref = event.subject;

        // Discard notifications for the comment and its direct replies —
        // one level, matching the comment tree depth.
        fx.push(Effect::DiscardForSubject {
            subject: comment_ref,
        });
        for reply_id in store.content.reply_ids(comment_ref.id).await? {
            fx.push(Effect::DiscardForSubject {
                subject: SubjectRef::comment(reply_id),
            });
        }

        fx.push(Effect::DestroyFollowUpsForSubject {
            subject: comment_ref,
        });
        fx.push(Effect::RemoveAllReferencesTo {
            reference: comment_ref,
        });

        // Roll the subject's activity back to its remaining comments, or to
        // its own content timestamps when none are left.
        if let Some(comment) = store.content.comment(comment_ref.id).await? {
            let fallback = match comment.subject.kind {
                SubjectKind::Post => store
                    .content
                    .post(comment.subject.id)
                    .await?
                    .and_then(|post| post.published_at),
                SubjectKind::Note => store
                    .content
                    .note(comment.subject.id)
                    .await?
                    .map(|note| note.content_updated_at),
                _ => None,
            };
            let activity = store.content.latest_comment_at(comment.subject).await?;
            if let Some(at) = activity.or(fallback) {
                fx.set_last_activity(comment.subject, at);
            }

            posts_stale_effects(store, event, &comment, &mut fx).await?;
        }

        Ok(fx)
    }
}
