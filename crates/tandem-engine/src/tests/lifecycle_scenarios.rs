//! Worker loop, dispatcher routing, and stale-state degradation scenarios.

use std::time::Duration;

use tandem_core::*;
use uuid::Uuid;

use super::{harness, record};
use crate::test_support::*;
use crate::worker::{EventWorker, WorkerConfig};
use crate::Dispatcher;

#[tokio::test]
async fn worker_processes_recorded_events_end_to_end() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let subscriber = Uuid::new_v4();
    let author = Uuid::new_v4();

    let parent = make_post(org, Some(author));
    let mut iteration = make_post(org, Some(author));
    iteration.parent_id = Some(parent.id);
    backend.add_post(parent.clone());
    backend.add_post(iteration.clone());
    backend.add_subscription(subscriber, parent.subject_ref(), false);

    let event = record(
        &store,
        ActorRef::Member(author),
        iteration.subject_ref(),
        org,
        EventAction::Created,
    )
    .await;

    let worker = EventWorker::new(dispatcher, WorkerConfig::default().with_poll_interval(10));
    let handle = worker.start();

    // Wait for the worker to drain the log.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let processed = store
            .events
            .get(event.id)
            .await
            .unwrap()
            .map(|e| e.processed())
            .unwrap_or(false);
        if processed {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "worker never processed the event"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(
        store
            .notifications
            .live_for_member(subscriber)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(store.events.unprocessed_count().await.unwrap(), 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn unregistered_subject_action_pairs_are_silent_no_ops() {
    let (_backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let actor = Uuid::new_v4();

    // Projects have no creation processor by design.
    let event = record(
        &store,
        ActorRef::Member(actor),
        SubjectRef::project(Uuid::new_v4()),
        org,
        EventAction::Created,
    )
    .await;

    let stats = dispatcher.dispatch(&event).await.unwrap();
    assert_eq!(stats.notifications_created, 0);
    assert_eq!(stats.jobs_enqueued, 0);
}

#[tokio::test]
async fn events_for_missing_subjects_degrade_to_no_ops() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let actor = Uuid::new_v4();

    // No post row exists for this subject.
    let event = record(
        &store,
        ActorRef::Member(actor),
        SubjectRef::post(Uuid::new_v4()),
        org,
        EventAction::Created,
    )
    .await;

    let stats = dispatcher.dispatch(&event).await.unwrap();
    assert_eq!(stats.notifications_created, 0);
    assert!(backend.enqueued_jobs().is_empty());
}

#[tokio::test]
async fn empty_dispatcher_accepts_everything() {
    let backend = MemBackend::new();
    let store = mem_store(&backend);
    let dispatcher = Dispatcher::empty(store.clone());
    let org = Uuid::new_v4();

    let event = record(
        &store,
        ActorRef::System,
        SubjectRef::post(Uuid::new_v4()),
        org,
        EventAction::Created,
    )
    .await;

    let stats = dispatcher.dispatch(&event).await.unwrap();
    assert_eq!(stats.notifications_created, 0);
}

#[tokio::test]
async fn comment_creation_bumps_the_posts_activity_timestamp() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let author = Uuid::new_v4();
    let commenter = Uuid::new_v4();

    let mut post = make_post(org, Some(author));
    post.last_activity_at = post.last_activity_at - chrono::Duration::days(1);
    backend.add_post(post.clone());

    let comment = make_comment(org, post.subject_ref(), commenter);
    backend.add_comment(comment.clone());

    let event = record(
        &store,
        ActorRef::Member(commenter),
        comment.subject_ref(),
        org,
        EventAction::Created,
    )
    .await;
    dispatcher.dispatch(&event).await.unwrap();

    let refreshed = store.content.post(post.id).await.unwrap().unwrap();
    assert!(refreshed.last_activity_at > post.last_activity_at);
}

#[tokio::test]
async fn read_and_archive_are_recipient_driven_entry_points() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let subscriber = Uuid::new_v4();
    let author = Uuid::new_v4();

    let parent = make_post(org, Some(author));
    let mut iteration = make_post(org, Some(author));
    iteration.parent_id = Some(parent.id);
    backend.add_post(parent.clone());
    backend.add_post(iteration.clone());
    backend.add_subscription(subscriber, parent.subject_ref(), false);

    let event = record(
        &store,
        ActorRef::Member(author),
        iteration.subject_ref(),
        org,
        EventAction::Created,
    )
    .await;
    dispatcher.dispatch(&event).await.unwrap();

    let notification = store.notifications.live_for_member(subscriber).await.unwrap()[0].clone();
    assert!(!notification.read());

    store.notifications.mark_read(notification.id).await.unwrap();
    assert!(store
        .notifications
        .get(notification.id)
        .await
        .unwrap()
        .unwrap()
        .read());

    store.notifications.mark_unread(notification.id).await.unwrap();
    assert!(!store
        .notifications
        .get(notification.id)
        .await
        .unwrap()
        .unwrap()
        .read());

    store.notifications.archive(notification.id).await.unwrap();
    assert!(store
        .notifications
        .get(notification.id)
        .await
        .unwrap()
        .unwrap()
        .archived());

    store.notifications.unarchive(notification.id).await.unwrap();
    assert!(!store
        .notifications
        .get(notification.id)
        .await
        .unwrap()
        .unwrap()
        .archived());
}

#[tokio::test]
async fn worker_reports_backlog() {
    let (_backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();

    record(
        &store,
        ActorRef::System,
        SubjectRef::post(Uuid::new_v4()),
        org,
        EventAction::Created,
    )
    .await;
    record(
        &store,
        ActorRef::System,
        SubjectRef::note(Uuid::new_v4()),
        org,
        EventAction::Created,
    )
    .await;

    let worker = EventWorker::new(
        dispatcher,
        WorkerConfig::default().with_enabled(false),
    );
    assert_eq!(worker.backlog().await.unwrap(), 2);
}
