//! Row-mapping helpers for polymorphic reference columns.
//!
//! Subjects and actors are stored as `(kind, id)` column pairs. These
//! helpers centralize the string mapping so every repository reads and
//! writes the same representation.

use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use tandem_core::{ActorRef, SubjectKind, SubjectRef};

/// Read a `(kind, id)` subject pair from a row.
pub(crate) fn subject_from_row(row: &PgRow, kind_col: &str, id_col: &str) -> SubjectRef {
    let kind: String = row.get(kind_col);
    SubjectRef {
        // Unknown kinds can only come from schema drift; map to Post so the
        // row still loads instead of poisoning whole result sets.
        kind: SubjectKind::parse(&kind).unwrap_or(SubjectKind::Post),
        id: row.get(id_col),
    }
}

/// Read an optional `(kind, id)` subject pair from a row.
pub(crate) fn opt_subject_from_row(
    row: &PgRow,
    kind_col: &str,
    id_col: &str,
) -> Option<SubjectRef> {
    let kind: Option<String> = row.get(kind_col);
    let id: Option<Uuid> = row.get(id_col);
    match (kind, id) {
        (Some(kind), Some(id)) => Some(SubjectRef {
            kind: SubjectKind::parse(&kind).unwrap_or(SubjectKind::Post),
            id,
        }),
        _ => None,
    }
}

/// Read an actor `(kind, id)` pair from a row. Null kind means system.
pub(crate) fn actor_from_row(row: &PgRow, kind_col: &str, id_col: &str) -> ActorRef {
    let kind: Option<String> = row.get(kind_col);
    let id: Option<Uuid> = row.get(id_col);
    match (kind.as_deref(), id) {
        (Some("member"), Some(id)) => ActorRef::Member(id),
        (Some("app"), Some(id)) => ActorRef::App(id),
        _ => ActorRef::System,
    }
}

/// Column values for persisting an actor.
pub(crate) fn actor_to_columns(actor: &ActorRef) -> (Option<&'static str>, Option<Uuid>) {
    match actor {
        ActorRef::Member(id) => (Some("member"), Some(*id)),
        ActorRef::App(id) => (Some("app"), Some(*id)),
        ActorRef::System => (None, None),
    }
}
