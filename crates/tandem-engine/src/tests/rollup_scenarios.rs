//! Timeline rollup and reference-reconciliation scenarios.

use tandem_core::*;
use uuid::Uuid;

use super::{harness, record, record_with_changes};
use crate::test_support::*;

#[tokio::test]
async fn pin_then_unpin_within_threshold_cancels_to_zero_entries() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let author = Uuid::new_v4();

    let project = make_project(org, false);
    let post = make_post(org, Some(author));
    backend.add_project(project.clone());
    backend.add_post(post.clone());

    let pin = make_pin(project.id, post.subject_ref());
    backend.add_pin(pin.clone());

    let pinned = record(
        &store,
        ActorRef::Member(actor),
        SubjectRef::project_pin(pin.id),
        org,
        EventAction::Created,
    )
    .await;
    dispatcher.dispatch(&pinned).await.unwrap();
    assert_eq!(
        store
            .timeline
            .list_for_subject(post.subject_ref())
            .await
            .unwrap()
            .len(),
        1
    );

    backend.set_pin_discarded(pin.id, true);
    let unpinned = record(
        &store,
        ActorRef::Member(actor),
        SubjectRef::project_pin(pin.id),
        org,
        EventAction::Destroyed,
    )
    .await;
    dispatcher.dispatch(&unpinned).await.unwrap();

    assert!(
        store
            .timeline
            .list_for_subject(post.subject_ref())
            .await
            .unwrap()
            .is_empty(),
        "pin/unpin inside the window nets to nothing"
    );
}

#[tokio::test]
async fn pin_then_unpin_across_threshold_keeps_both_entries() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let author = Uuid::new_v4();

    let project = make_project(org, false);
    let post = make_post(org, Some(author));
    backend.add_project(project.clone());
    backend.add_post(post.clone());

    let pin = make_pin(project.id, post.subject_ref());
    backend.add_pin(pin.clone());

    let pinned = record(
        &store,
        ActorRef::Member(actor),
        SubjectRef::project_pin(pin.id),
        org,
        EventAction::Created,
    )
    .await;
    dispatcher.dispatch(&pinned).await.unwrap();

    // Age the pinned entry out of the rollup window.
    backend.age_timeline(defaults::ROLLUP_THRESHOLD_SECONDS * 2);

    backend.set_pin_discarded(pin.id, true);
    let unpinned = record(
        &store,
        ActorRef::Member(actor),
        SubjectRef::project_pin(pin.id),
        org,
        EventAction::Destroyed,
    )
    .await;
    dispatcher.dispatch(&unpinned).await.unwrap();

    let entries = store
        .timeline
        .list_for_subject(post.subject_ref())
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, TimelineAction::SubjectPinned);
    assert_eq!(entries[1].action, TimelineAction::SubjectUnpinned);
}

#[tokio::test]
async fn pin_then_unpin_by_a_different_actor_keeps_both_entries() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let pinner = Uuid::new_v4();
    let unpinner = Uuid::new_v4();
    let author = Uuid::new_v4();

    let project = make_project(org, false);
    let post = make_post(org, Some(author));
    backend.add_project(project.clone());
    backend.add_post(post.clone());

    let pin = make_pin(project.id, post.subject_ref());
    backend.add_pin(pin.clone());

    let pinned = record(
        &store,
        ActorRef::Member(pinner),
        SubjectRef::project_pin(pin.id),
        org,
        EventAction::Created,
    )
    .await;
    dispatcher.dispatch(&pinned).await.unwrap();

    backend.set_pin_discarded(pin.id, true);
    let unpinned = record(
        &store,
        ActorRef::Member(unpinner),
        SubjectRef::project_pin(pin.id),
        org,
        EventAction::Destroyed,
    )
    .await;
    dispatcher.dispatch(&unpinned).await.unwrap();

    assert_eq!(
        store
            .timeline
            .list_for_subject(post.subject_ref())
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn repinning_within_threshold_rolls_back_to_the_original_entry() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let author = Uuid::new_v4();

    let project = make_project(org, false);
    let post = make_post(org, Some(author));
    backend.add_project(project.clone());
    backend.add_post(post.clone());

    let pin = make_pin(project.id, post.subject_ref());
    backend.add_pin(pin.clone());

    let pinned = record(
        &store,
        ActorRef::Member(actor),
        SubjectRef::project_pin(pin.id),
        org,
        EventAction::Created,
    )
    .await;
    dispatcher.dispatch(&pinned).await.unwrap();

    // Unpin after the window: the unpinned entry lands.
    backend.age_timeline(defaults::ROLLUP_THRESHOLD_SECONDS * 2);
    backend.set_pin_discarded(pin.id, true);
    let unpinned = record(
        &store,
        ActorRef::Member(actor),
        SubjectRef::project_pin(pin.id),
        org,
        EventAction::Destroyed,
    )
    .await;
    dispatcher.dispatch(&unpinned).await.unwrap();

    // Re-pin immediately: cancels the fresh unpinned entry, leaving only
    // the original pinned one.
    backend.set_pin_discarded(pin.id, false);
    let repinned = record(
        &store,
        ActorRef::Member(actor),
        SubjectRef::project_pin(pin.id),
        org,
        EventAction::Updated,
    )
    .await;
    dispatcher.dispatch(&repinned).await.unwrap();

    let entries = store
        .timeline
        .list_for_subject(post.subject_ref())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, TimelineAction::SubjectPinned);
}

#[tokio::test]
async fn rapid_title_edits_collapse_to_one_first_to_current_entry() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let actor = Uuid::new_v4();

    let note = make_note(org, actor);
    backend.add_note(note.clone());

    let titles = ["Roadmap", "Roadmap v2", "Roadmap final"];

    for window in titles.windows(2) {
        backend.update_note(note.id, |n| n.title = Some(window[1].to_string()));
        let event = record_with_changes(
            &store,
            ActorRef::Member(actor),
            note.subject_ref(),
            org,
            EventAction::Updated,
            SubjectChanges {
                title: Some(FieldChange::new(
                    Some(window[0].to_string()),
                    Some(window[1].to_string()),
                )),
                ..Default::default()
            },
        )
        .await;
        dispatcher.dispatch(&event).await.unwrap();
    }

    let entries = store
        .timeline
        .list_for_subject(note.subject_ref())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, TimelineAction::SubjectTitleUpdated);
    assert_eq!(
        entries[0].metadata,
        Some(TimelineMetadata::Title {
            from_title: Some("Roadmap".to_string()),
            to_title: Some("Roadmap final".to_string()),
        })
    );
}

#[tokio::test]
async fn title_edits_across_the_threshold_stay_separate() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let actor = Uuid::new_v4();

    let note = make_note(org, actor);
    backend.add_note(note.clone());

    let first = record_with_changes(
        &store,
        ActorRef::Member(actor),
        note.subject_ref(),
        org,
        EventAction::Updated,
        SubjectChanges {
            title: Some(FieldChange::new(
                Some("Roadmap".to_string()),
                Some("Roadmap v2".to_string()),
            )),
            ..Default::default()
        },
    )
    .await;
    dispatcher.dispatch(&first).await.unwrap();

    backend.age_timeline(defaults::ROLLUP_THRESHOLD_SECONDS * 2);

    let second = record_with_changes(
        &store,
        ActorRef::Member(actor),
        note.subject_ref(),
        org,
        EventAction::Updated,
        SubjectChanges {
            title: Some(FieldChange::new(
                Some("Roadmap v2".to_string()),
                Some("Roadmap final".to_string()),
            )),
            ..Default::default()
        },
    )
    .await;
    dispatcher.dispatch(&second).await.unwrap();

    assert_eq!(
        store
            .timeline
            .list_for_subject(note.subject_ref())
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn duplicate_references_collapse_to_one_timeline_entry() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let author = Uuid::new_v4();

    let referenced = make_post(org, Some(author));
    backend.add_post(referenced.clone());

    let href = format!("https://app.example.com/acme/posts/{}", referenced.id);
    let mut post = make_post(org, Some(author));
    post.body_html = format!(
        r#"<link-unfurl href="{href}"></link-unfurl><link-unfurl href="{href}"></link-unfurl>"#
    );
    backend.add_post(post.clone());

    let event = record(
        &store,
        ActorRef::Member(author),
        post.subject_ref(),
        org,
        EventAction::Created,
    )
    .await;
    dispatcher.dispatch(&event).await.unwrap();

    let entries = store
        .timeline
        .list_for_subject(referenced.subject_ref())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].action,
        TimelineAction::SubjectReferencedInInternalRecord
    );
    assert_eq!(entries[0].reference, Some(post.subject_ref()));
}

#[tokio::test]
async fn self_references_are_never_recorded() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let author = Uuid::new_v4();

    let mut post = make_post(org, Some(author));
    post.body_html = format!(
        r#"<a href="https://app.example.com/acme/posts/{}">this post</a>"#,
        post.id
    );
    backend.add_post(post.clone());

    let event = record(
        &store,
        ActorRef::Member(author),
        post.subject_ref(),
        org,
        EventAction::Created,
    )
    .await;
    dispatcher.dispatch(&event).await.unwrap();

    assert!(store
        .timeline
        .list_for_subject(post.subject_ref())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn comment_references_resolve_to_the_comments_subject() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let author = Uuid::new_v4();
    let commenter = Uuid::new_v4();

    let referenced_post = make_post(org, Some(author));
    backend.add_post(referenced_post.clone());
    let referenced_comment = make_comment(org, referenced_post.subject_ref(), commenter);
    backend.add_comment(referenced_comment.clone());

    let mut post = make_post(org, Some(author));
    post.body_html = format!(
        r#"<a href="https://app.example.com/acme/comments/{}">thread</a>"#,
        referenced_comment.id
    );
    backend.add_post(post.clone());

    let event = record(
        &store,
        ActorRef::Member(author),
        post.subject_ref(),
        org,
        EventAction::Created,
    )
    .await;
    dispatcher.dispatch(&event).await.unwrap();

    let entries = store
        .timeline
        .list_for_subject(referenced_post.subject_ref())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reference, Some(post.subject_ref()));
}

#[tokio::test]
async fn updates_reconcile_added_and_removed_references() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let author = Uuid::new_v4();

    let old_target = make_post(org, Some(author));
    let new_target = make_post(org, Some(author));
    backend.add_post(old_target.clone());
    backend.add_post(new_target.clone());

    let previous_body = format!(
        r#"<a href="https://app.example.com/acme/posts/{}">old</a>"#,
        old_target.id
    );
    let current_body = format!(
        r#"<a href="https://app.example.com/acme/posts/{}">new</a>"#,
        new_target.id
    );

    let mut post = make_post(org, Some(author));
    post.body_html = previous_body.clone();
    backend.add_post(post.clone());

    let created = record(
        &store,
        ActorRef::Member(author),
        post.subject_ref(),
        org,
        EventAction::Created,
    )
    .await;
    dispatcher.dispatch(&created).await.unwrap();
    assert_eq!(
        store
            .timeline
            .list_for_subject(old_target.subject_ref())
            .await
            .unwrap()
            .len(),
        1
    );

    backend.update_post(post.id, |p| p.body_html = current_body.clone());
    let updated = record_with_changes(
        &store,
        ActorRef::Member(author),
        post.subject_ref(),
        org,
        EventAction::Updated,
        SubjectChanges {
            body_html: Some(FieldChange::new(
                Some(previous_body),
                Some(current_body),
            )),
            ..Default::default()
        },
    )
    .await;
    dispatcher.dispatch(&updated).await.unwrap();

    assert!(store
        .timeline
        .list_for_subject(old_target.subject_ref())
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        store
            .timeline
            .list_for_subject(new_target.subject_ref())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn destroying_the_referencing_post_removes_its_reference_entries() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let author = Uuid::new_v4();

    let referenced = make_post(org, Some(author));
    backend.add_post(referenced.clone());

    let mut post = make_post(org, Some(author));
    post.body_html = format!(
        r#"<a href="https://app.example.com/acme/posts/{}">ref</a>"#,
        referenced.id
    );
    backend.add_post(post.clone());

    let created = record(
        &store,
        ActorRef::Member(author),
        post.subject_ref(),
        org,
        EventAction::Created,
    )
    .await;
    dispatcher.dispatch(&created).await.unwrap();
    assert_eq!(
        store
            .timeline
            .list_for_subject(referenced.subject_ref())
            .await
            .unwrap()
            .len(),
        1
    );

    let destroyed = record(
        &store,
        ActorRef::Member(author),
        post.subject_ref(),
        org,
        EventAction::Destroyed,
    )
    .await;
    dispatcher.dispatch(&destroyed).await.unwrap();

    assert!(store
        .timeline
        .list_for_subject(referenced.subject_ref())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn draft_references_are_ignored() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let author = Uuid::new_v4();

    let mut draft_target = make_post(org, Some(author));
    draft_target.draft = true;
    draft_target.published_at = None;
    backend.add_post(draft_target.clone());

    let mut post = make_post(org, Some(author));
    post.body_html = format!(
        r#"<a href="https://app.example.com/acme/posts/{}">draft</a>"#,
        draft_target.id
    );
    backend.add_post(post.clone());

    let event = record(
        &store,
        ActorRef::Member(author),
        post.subject_ref(),
        org,
        EventAction::Created,
    )
    .await;
    dispatcher.dispatch(&event).await.unwrap();

    assert!(store
        .timeline
        .list_for_subject(draft_target.subject_ref())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn mentions_and_references_coexist_in_one_body() {
    let (backend, store, dispatcher) = harness();
    let org = Uuid::new_v4();
    let author = Uuid::new_v4();
    let mentioned = Uuid::new_v4();

    let referenced = make_post(org, Some(author));
    backend.add_post(referenced.clone());

    let mut post = make_post(org, Some(author));
    post.body_html = format!(
        r#"<p>{} see <a href="https://app.example.com/acme/posts/{}">this</a></p>"#,
        format_member_mention(mentioned, "casey"),
        referenced.id
    );
    backend.add_post(post.clone());

    let event = record(
        &store,
        ActorRef::Member(author),
        post.subject_ref(),
        org,
        EventAction::Created,
    )
    .await;
    dispatcher.dispatch(&event).await.unwrap();

    assert_eq!(
        store
            .notifications
            .live_for_member(mentioned)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        store
            .timeline
            .list_for_subject(referenced.subject_ref())
            .await
            .unwrap()
            .len(),
        1
    );
}
