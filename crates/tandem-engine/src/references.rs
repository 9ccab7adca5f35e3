//! Internal-reference reconciliation.
//!
//! Posts, notes, and comments can embed links to other internal records.
//! Each unique referenced record gets exactly one
//! `subject_referenced_in_internal_record` entry on *its* timeline pointing
//! back at the referencing entity. On update, only the added/removed sets
//! are reconciled — stale entries are deleted, new ones created, untouched
//! ones left alone.
//!
//! Guards: a record never references itself (for a comment, "itself" is the
//! post or note the comment lives on), duplicates within one body collapse,
//! and links to drafts or records from other organizations are ignored.

use uuid::Uuid;

use tandem_core::{parse_references, ContentRepository, Result, SubjectKind, SubjectRef};

use crate::effects::Effect;
use crate::store::Store;

/// Resolve a parsed reference to the subject whose timeline records it.
///
/// Comments resolve to their parent post/note; unknown, draft, discarded,
/// or cross-organization records resolve to nothing.
async fn resolve_target(
    store: &Store,
    organization_id: Uuid,
    reference: SubjectRef,
) -> Result<Option<SubjectRef>> {
    match reference.kind {
        SubjectKind::Post => {
            let Some(post) = store.content.post(reference.id).await? else {
                return Ok(None);
            };
            if post.organization_id != organization_id || post.draft {
                return Ok(None);
            }
            Ok(Some(post.subject_ref()))
        }
        SubjectKind::Note => {
            let Some(note) = store.content.note(reference.id).await? else {
                return Ok(None);
            };
            if note.organization_id != organization_id {
                return Ok(None);
            }
            Ok(Some(note.subject_ref()))
        }
        SubjectKind::Comment => {
            let Some(comment) = store.content.comment(reference.id).await? else {
                return Ok(None);
            };
            if comment.organization_id != organization_id || comment.discarded_at.is_some() {
                return Ok(None);
            }
            Ok(Some(comment.subject))
        }
        _ => Ok(None),
    }
}

/// Diff the reference sets of a body change and emit add/remove effects.
///
/// * `referencing` — the entity containing the body (what timeline entries
///   point back at).
/// * `own_subject` — the subject that must never record a self-reference:
///   the referencing entity itself, or for comments the post/note they
///   belong to.
pub async fn diff_effects(
    store: &Store,
    organization_id: Uuid,
    referencing: SubjectRef,
    own_subject: SubjectRef,
    previous_html: Option<&str>,
    current_html: &str,
) -> Result<Vec<Effect>> {
    let previous = previous_html.map(parse_references).unwrap_or_default();
    let current = parse_references(current_html);

    let mut effects = Vec::new();

    for reference in previous.iter().filter(|r| !current.contains(r)) {
        if let Some(target) = resolve_target(store, organization_id, *reference).await? {
            if target == own_subject {
                continue;
            }
            effects.push(Effect::RemoveReference {
                subject: target,
                reference: referencing,
            });
        }
    }

    let mut added_targets: Vec<SubjectRef> = Vec::new();
    for reference in current.iter().filter(|r| !previous.contains(r)) {
        let Some(target) = resolve_target(store, organization_id, *reference).await? else {
            continue;
        };
        if target == own_subject || added_targets.contains(&target) {
            continue;
        }
        added_targets.push(target);
        effects.push(Effect::AddReference {
            subject: target,
            reference: referencing,
        });
    }

    Ok(effects)
}
