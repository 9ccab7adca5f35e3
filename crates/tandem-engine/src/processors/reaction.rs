//! Reaction event processors.

use async_trait::async_trait;

use tandem_core::{ContentRepository, Event, NotificationReason, Result, SubjectKind};

use crate::dispatcher::EventProcessor;
use crate::effects::{Effect, Effects};
use crate::store::Store;

/// Handles `(reaction, created)`.
///
/// Notifies the author of the reacted-to post, comment, or reply unless the
/// reactor is the author themself. Reactions to anything else (chat
/// messages in particular) never notify.
pub struct ReactionCreatedProcessor;

#[async_trait]
impl EventProcessor for ReactionCreatedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        let Some(reaction) = store.content.reaction(event.subject.id).await? else {
            return Ok(Effects::new());
        };

        let mut fx = Effects::new();
        if event.skip_notifications {
            return Ok(fx);
        }

        match reaction.subject.kind {
            SubjectKind::Post => {
                if let Some(post) = store.content.post(reaction.subject.id).await? {
                    if let Some(author) = post.author_id {
                        if author != reaction.member_id {
                            fx.notify(
                                author,
                                NotificationReason::Author,
                                post.subject_ref(),
                                None,
                            );
                        }
                    }
                }
            }
            SubjectKind::Comment => {
                if let Some(comment) = store.content.comment(reaction.subject.id).await? {
                    if comment.author_id != reaction.member_id {
                        fx.notify(
                            comment.author_id,
                            NotificationReason::Author,
                            comment.subject,
                            Some(comment.subject_ref()),
                        );
                    }
                }
            }
            _ => {}
        }

        Ok(fx)
    }
}

/// Handles `(reaction, destroyed)`.
///
/// Retracting the reaction retracts the author notification it created.
pub struct ReactionDestroyedProcessor;

#[async_trait]
impl EventProcessor for ReactionDestroyedProcessor {
    async fn process(&self, event: &Event, _store: &Store) -> Result<Effects> {
        let mut fx = Effects::new();
        fx.push(Effect::DiscardForSubject {
            subject: event.subject,
        });
        Ok(fx)
    }
}
