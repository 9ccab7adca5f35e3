//! Note event processors.

use async_trait::async_trait;

use tandem_core::{
    parse_mentions, ContentRepository, Event, NotificationReason, Result, TimelineAction,
    TimelineCandidate, TimelineMetadata,
};

use crate::dispatcher::EventProcessor;
use crate::effects::{Effect, Effects};
use crate::references;
use crate::store::Store;

/// Handles `(note, created)`.
pub struct NoteCreatedProcessor;

#[async_trait]
impl EventProcessor for NoteCreatedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        let Some(note) = store.content.note(event.subject.id).await? else {
            return Ok(Effects::new());
        };

        let mut fx = Effects::new();
        let note_ref = note.subject_ref();

        if !event.skip_notifications {
            for member in parse_mentions(&note.body_html).member_ids {
                if member == note.author_id {
                    continue;
                }
                fx.subscribe(member, note_ref);
                fx.notify(member, NotificationReason::Mention, note_ref, None);
            }
        }

        fx.extend(
            references::diff_effects(
                store,
                note.organization_id,
                note_ref,
                note_ref,
                None,
                &note.body_html,
            )
            .await?,
        );

        Ok(fx)
    }
}

/// Handles `(note, updated)`.
pub struct NoteUpdatedProcessor;

#[async_trait]
impl EventProcessor for NoteUpdatedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        let Some(note) = store.content.note(event.subject.id).await? else {
            return Ok(Effects::new());
        };

        let mut fx = Effects::new();
        let note_ref = note.subject_ref();
        let changes = &event.changes;

        if !event.skip_notifications {
            if let Some(body) = &changes.body_html {
                let current = body.to.as_deref().unwrap_or(&note.body_html);
                for member in tandem_core::new_member_mentions(body.from.as_deref(), current) {
                    if member == note.author_id {
                        continue;
                    }
                    fx.subscribe(member, note_ref);
                    fx.notify(member, NotificationReason::Mention, note_ref, None);
                }
            }
        }

        // Rapid consecutive renames by the same actor roll up to a single
        // first-title-to-current-title entry.
        if let Some(title) = &changes.title {
            fx.timeline(
                TimelineCandidate::new(
                    Some(event.actor),
                    note_ref,
                    TimelineAction::SubjectTitleUpdated,
                )
                .with_metadata(TimelineMetadata::Title {
                    from_title: title.from.clone(),
                    to_title: title.to.clone(),
                }),
            );
        }
        if let Some(project) = &changes.project_id {
            fx.timeline(
                TimelineCandidate::new(
                    Some(event.actor),
                    note_ref,
                    TimelineAction::SubjectProjectUpdated,
                )
                .with_metadata(TimelineMetadata::Project {
                    from_project_id: project.from,
                    to_project_id: project.to,
                }),
            );
        }

        if let Some(body) = &changes.body_html {
            let current = body.to.as_deref().unwrap_or(&note.body_html);
            fx.extend(
                references::diff_effects(
                    store,
                    note.organization_id,
                    note_ref,
                    note_ref,
                    body.from.as_deref(),
                    current,
                )
                .await?,
            );
        }

        Ok(fx)
    }
}

/// Handles `(note, destroyed)`.
pub struct NoteDestroyedProcessor;

#[async_trait]
impl EventProcessor for NoteDestroyedProcessor {
    async fn process(&self, event: &Event, _store: &Store) -> Result<Effects> {
        let mut fx = Effects::new();
        let note_ref = event.subject;

        fx.push(Effect::DiscardForSubject { subject: note_ref });
        fx.push(Effect::DestroyFollowUpsForSubject { subject: note_ref });
        fx.push(Effect::DestroyFavoritesForSubject { subject: note_ref });
        fx.push(Effect::DiscardProjectPins { subject: note_ref });
        fx.push(Effect::RemoveAllReferencesTo {
            reference: note_ref,
        });

        Ok(fx)
    }
}
