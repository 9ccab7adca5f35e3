//! Event dispatcher: routes events to their registered processor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use tandem_core::{Event, EventAction, Result, SubjectKind};

use crate::effects::{apply, ApplyStats, Effects};
use crate::processors;
use crate::store::Store;

/// Decision logic for one `(subject kind, action)` pair.
///
/// A processor is a pure function of the event and current store state: it
/// reads, decides, and returns effects — the applier performs all writes.
/// Processors must tolerate stale state (subject already destroyed,
/// recipient already without access) by degrading to a no-op, never by
/// raising.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects>;
}

/// Routes events to processors via a compile-time-populated registry.
pub struct Dispatcher {
    store: Store,
    registry: HashMap<(SubjectKind, EventAction), Arc<dyn EventProcessor>>,
}

impl Dispatcher {
    /// Create a dispatcher with the standard processor registry.
    pub fn new(store: Store) -> Self {
        Self {
            registry: processors::registry(),
            store,
        }
    }

    /// Create a dispatcher with no processors registered.
    pub fn empty(store: Store) -> Self {
        Self {
            registry: HashMap::new(),
            store,
        }
    }

    /// Register (or replace) a processor for a `(subject kind, action)` pair.
    pub fn register(
        &mut self,
        subject_kind: SubjectKind,
        action: EventAction,
        processor: Arc<dyn EventProcessor>,
    ) {
        self.registry.insert((subject_kind, action), processor);
    }

    /// The store this dispatcher applies effects to.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Process one event: look up the processor, run it, apply its effects.
    ///
    /// Pairs with no registered processor are intentional no-ops — many
    /// subject/action combinations have no side effects. Errors propagate
    /// to the caller's retry policy; at-least-once redelivery is safe
    /// because every downstream mutation is idempotent.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn dispatch(&self, event: &Event) -> Result<ApplyStats> {
        let key = (event.subject.kind, event.action);
        let Some(processor) = self.registry.get(&key) else {
            debug!(
                subject_kind = %event.subject.kind,
                action = %event.action,
                "No processor registered; skipping event"
            );
            return Ok(ApplyStats::default());
        };

        let start = Instant::now();
        let effects = processor.process(event, &self.store).await?;
        let effect_count = effects.len();
        let stats = apply(&self.store, event, effects).await?;

        info!(
            subject_kind = %event.subject.kind,
            action = %event.action,
            effect_count,
            notifications_created = stats.notifications_created,
            notifications_discarded = stats.notifications_discarded,
            timeline_changes = stats.timeline_changes,
            jobs_enqueued = stats.jobs_enqueued,
            duration_ms = start.elapsed().as_millis() as u64,
            "Event processed"
        );
        Ok(stats)
    }
}
