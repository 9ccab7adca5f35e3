//! Project pin event processors.
//!
//! Pins drive the canonical rollup-cancellation pair: pinning writes a
//! `subject_pinned` entry on the pinned record's timeline, unpinning writes
//! `subject_unpinned`, and a quick pin/unpin round-trip by the same actor
//! nets to zero entries. Pins themselves are soft-deleted, so re-pinning
//! arrives as an `updated` event on the same row.

use async_trait::async_trait;

use tandem_core::{EngagementRepository, Event, Result, TimelineAction, TimelineCandidate};

use crate::dispatcher::EventProcessor;
use crate::effects::Effects;
use crate::store::Store;

async fn pin_timeline_effects(
    event: &Event,
    store: &Store,
    action: TimelineAction,
) -> Result<Effects> {
    let mut fx = Effects::new();
    let Some(pin) = store.engagement.project_pin(event.subject.id).await? else {
        return Ok(fx);
    };
    fx.timeline(TimelineCandidate::new(
        Some(event.actor),
        pin.subject,
        action,
    ));
    Ok(fx)
}

/// Handles `(project_pin, created)`.
pub struct ProjectPinCreatedProcessor;

#[async_trait]
impl EventProcessor for ProjectPinCreatedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        pin_timeline_effects(event, store, TimelineAction::SubjectPinned).await
    }
}

/// Handles `(project_pin, updated)` — a discarded pin being restored.
pub struct ProjectPinUpdatedProcessor;

#[async_trait]
impl EventProcessor for ProjectPinUpdatedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        let Some(pin) = store.engagement.project_pin(event.subject.id).await? else {
            return Ok(Effects::new());
        };
        if pin.discarded() {
            // Update on a still-discarded pin carries no timeline meaning.
            return Ok(Effects::new());
        }
        let mut fx = Effects::new();
        fx.timeline(TimelineCandidate::new(
            Some(event.actor),
            pin.subject,
            TimelineAction::SubjectPinned,
        ));
        Ok(fx)
    }
}

/// Handles `(project_pin, destroyed)`.
pub struct ProjectPinDestroyedProcessor;

#[async_trait]
impl EventProcessor for ProjectPinDestroyedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        pin_timeline_effects(event, store, TimelineAction::SubjectUnpinned).await
    }
}
