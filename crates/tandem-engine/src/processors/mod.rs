//! Per-(subject kind, action) event processors.
//!
//! Each processor reproduces the recipient and bookkeeping rules for one
//! mutation kind. The registry below is the single source of truth for
//! which pairs have side effects; everything unlisted is a deliberate
//! no-op.

use std::collections::HashMap;
use std::sync::Arc;

use tandem_core::{EventAction, SubjectKind};

use crate::dispatcher::EventProcessor;

pub mod comment;
pub mod note;
pub mod permission;
pub mod post;
pub mod project_pin;
pub mod reaction;

pub use comment::{CommentCreatedProcessor, CommentDestroyedProcessor, CommentUpdatedProcessor};
pub use note::{NoteCreatedProcessor, NoteDestroyedProcessor, NoteUpdatedProcessor};
pub use permission::{PermissionCreatedProcessor, PermissionDestroyedProcessor};
pub use post::{
    PostCreatedProcessor, PostDestroyedProcessor, PostPublishedProcessor, PostUpdatedProcessor,
};
pub use project_pin::{
    ProjectPinCreatedProcessor, ProjectPinDestroyedProcessor, ProjectPinUpdatedProcessor,
};
pub use reaction::{ReactionCreatedProcessor, ReactionDestroyedProcessor};

/// Webhook event type delivered when an app is mentioned in a body.
pub const APP_MENTIONED: &str = "app.mentioned";

/// Webhook event type delivered when a post is published.
pub const POST_CREATED: &str = "post.created";

/// Build the standard processor registry.
pub fn registry() -> HashMap<(SubjectKind, EventAction), Arc<dyn EventProcessor>> {
    let mut map: HashMap<(SubjectKind, EventAction), Arc<dyn EventProcessor>> = HashMap::new();

    map.insert(
        (SubjectKind::Post, EventAction::Created),
        Arc::new(PostCreatedProcessor),
    );
    map.insert(
        (SubjectKind::Post, EventAction::Updated),
        Arc::new(PostUpdatedProcessor),
    );
    map.insert(
        (SubjectKind::Post, EventAction::Destroyed),
        Arc::new(PostDestroyedProcessor),
    );
    map.insert(
        (SubjectKind::Post, EventAction::Published),
        Arc::new(PostPublishedProcessor),
    );

    map.insert(
        (SubjectKind::Comment, EventAction::Created),
        Arc::new(CommentCreatedProcessor),
    );
    map.insert(
        (SubjectKind::Comment, EventAction::Updated),
        Arc::new(CommentUpdatedProcessor),
    );
    map.insert(
        (SubjectKind::Comment, EventAction::Destroyed),
        Arc::new(CommentDestroyedProcessor),
    );

    map.insert(
        (SubjectKind::Note, EventAction::Created),
        Arc::new(NoteCreatedProcessor),
    );
    map.insert(
        (SubjectKind::Note, EventAction::Updated),
        Arc::new(NoteUpdatedProcessor),
    );
    map.insert(
        (SubjectKind::Note, EventAction::Destroyed),
        Arc::new(NoteDestroyedProcessor),
    );

    map.insert(
        (SubjectKind::Reaction, EventAction::Created),
        Arc::new(ReactionCreatedProcessor),
    );
    map.insert(
        (SubjectKind::Reaction, EventAction::Destroyed),
        Arc::new(ReactionDestroyedProcessor),
    );

    map.insert(
        (SubjectKind::Permission, EventAction::Created),
        Arc::new(PermissionCreatedProcessor),
    );
    map.insert(
        (SubjectKind::Permission, EventAction::Destroyed),
        Arc::new(PermissionDestroyedProcessor),
    );

    map.insert(
        (SubjectKind::ProjectPin, EventAction::Created),
        Arc::new(ProjectPinCreatedProcessor),
    );
    map.insert(
        (SubjectKind::ProjectPin, EventAction::Updated),
        Arc::new(ProjectPinUpdatedProcessor),
    );
    map.insert(
        (SubjectKind::ProjectPin, EventAction::Destroyed),
        Arc::new(ProjectPinDestroyedProcessor),
    );

    map
}
