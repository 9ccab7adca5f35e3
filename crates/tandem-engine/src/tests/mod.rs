//! End-to-end scenario tests for the dispatch → process → apply pipeline.
//!
//! Every test runs the real dispatcher and processors over the in-memory
//! store from `test_support`, exercising the same code paths production
//! drives against PostgreSQL.

use std::sync::Arc;

use tandem_core::{
    ActorRef, Event, EventAction, EventRepository, RecordEventRequest, SubjectChanges, SubjectRef,
};
use uuid::Uuid;

use crate::store::Store;
use crate::test_support::{mem_store, MemBackend};

mod lifecycle_scenarios;
mod rollup_scenarios;

/// Record an event through the store, as the surrounding mutation would.
pub(crate) async fn record(
    store: &Store,
    actor: ActorRef,
    subject: SubjectRef,
    organization_id: Uuid,
    action: EventAction,
) -> Event {
    store
        .events
        .record(RecordEventRequest::new(
            actor,
            subject,
            organization_id,
            action,
        ))
        .await
        .unwrap()
}

/// Record an update event carrying previous-change tuples.
pub(crate) async fn record_with_changes(
    store: &Store,
    actor: ActorRef,
    subject: SubjectRef,
    organization_id: Uuid,
    action: EventAction,
    changes: SubjectChanges,
) -> Event {
    store
        .events
        .record(
            RecordEventRequest::new(actor, subject, organization_id, action).with_changes(changes),
        )
        .await
        .unwrap()
}

/// Backend, store, and dispatcher wired together.
pub(crate) fn harness() -> (Arc<MemBackend>, Store, crate::Dispatcher) {
    let backend = MemBackend::new();
    let store = mem_store(&backend);
    let dispatcher = crate::Dispatcher::new(store.clone());
    (backend, store, dispatcher)
}
