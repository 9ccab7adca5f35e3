//! Permission repository and access policy implementations.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tandem_core::{
    AccessPolicy, Error, Permission, PermissionAction, PermissionRepository, Result, SubjectKind,
    SubjectRef,
};

use crate::refs::subject_from_row;

/// PostgreSQL implementation of PermissionRepository.
pub struct PgPermissionRepository {
    pool: Pool<Postgres>,
}

impl PgPermissionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    const COLUMNS: &'static str =
        "id, member_id, subject_kind, subject_id, action, discarded_at, created_at";

    fn parse_row(row: sqlx::postgres::PgRow) -> Permission {
        let action: String = row.get("action");
        Permission {
            id: row.get("id"),
            member_id: row.get("member_id"),
            subject: subject_from_row(&row, "subject_kind", "subject_id"),
            action: PermissionAction::parse(&action).unwrap_or(PermissionAction::View),
            discarded_at: row.get("discarded_at"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl PermissionRepository for PgPermissionRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Permission>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM permissions WHERE id = $1",
            Self::COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn live_for_subject(&self, subject: SubjectRef) -> Result<Vec<Permission>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM permissions
             WHERE subject_kind = $1 AND subject_id = $2 AND discarded_at IS NULL",
            Self::COLUMNS
        ))
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn live_for_member_subject(
        &self,
        member_id: Uuid,
        subject: SubjectRef,
    ) -> Result<Option<Permission>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM permissions
             WHERE member_id = $1 AND subject_kind = $2 AND subject_id = $3
               AND discarded_at IS NULL
             LIMIT 1",
            Self::COLUMNS
        ))
        .bind(member_id)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }
}

/// PostgreSQL-backed access policy.
///
/// Visibility rules:
/// - posts inherit their project's privacy (private projects require a kept
///   project membership; the author always sees their own post);
/// - comments and reactions inherit the visibility of their subject;
/// - notes are visible to their author, members holding a live permission
///   row, or members of the note's project when one is attached;
/// - private projects require membership, public ones don't.
pub struct PgAccessPolicy {
    pool: Pool<Postgres>,
}

impl PgAccessPolicy {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn can_view_project(&self, member_id: Uuid, project_id: Uuid) -> Result<bool> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT private FROM projects WHERE id = $1")
                .bind(project_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        match row {
            None => Ok(false),
            Some((false,)) => Ok(true),
            Some((true,)) => self.is_project_member(member_id, project_id).await,
        }
    }

    async fn is_project_member(&self, member_id: Uuid, project_id: Uuid) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM project_memberships
             WHERE member_id = $1 AND project_id = $2 AND discarded_at IS NULL",
        )
        .bind(member_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(count.0 > 0)
    }

    async fn can_view_post(&self, member_id: Uuid, post_id: Uuid) -> Result<bool> {
        let row: Option<(Option<Uuid>, Option<Uuid>)> =
            sqlx::query_as("SELECT project_id, author_id FROM posts WHERE id = $1")
                .bind(post_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        let Some((project_id, author_id)) = row else {
            return Ok(false);
        };
        if author_id == Some(member_id) {
            return Ok(true);
        }
        match project_id {
            Some(project_id) => self.can_view_project(member_id, project_id).await,
            None => Ok(true),
        }
    }

    async fn can_view_note(&self, member_id: Uuid, note_id: Uuid) -> Result<bool> {
        let row: Option<(Uuid, Option<Uuid>)> =
            sqlx::query_as("SELECT author_id, project_id FROM notes WHERE id = $1")
                .bind(note_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        let Some((author_id, project_id)) = row else {
            return Ok(false);
        };
        if author_id == member_id {
            return Ok(true);
        }

        let permitted: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM permissions
             WHERE member_id = $1 AND subject_kind = 'note' AND subject_id = $2
               AND discarded_at IS NULL",
        )
        .bind(member_id)
        .bind(note_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        if permitted.0 > 0 {
            return Ok(true);
        }

        match project_id {
            Some(project_id) => self.can_view_project(member_id, project_id).await,
            None => Ok(false),
        }
    }

    async fn can_view_comment(&self, member_id: Uuid, comment_id: Uuid) -> Result<bool> {
        let row: Option<(String, Uuid)> =
            sqlx::query_as("SELECT subject_kind, subject_id FROM comments WHERE id = $1")
                .bind(comment_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        let Some((kind, id)) = row else {
            return Ok(false);
        };
        let Some(kind) = SubjectKind::parse(&kind) else {
            return Ok(false);
        };
        self.can_view(member_id, SubjectRef::new(kind, id)).await
    }

    async fn can_view_reaction(&self, member_id: Uuid, reaction_id: Uuid) -> Result<bool> {
        let row: Option<(String, Uuid)> =
            sqlx::query_as("SELECT subject_kind, subject_id FROM reactions WHERE id = $1")
                .bind(reaction_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        let Some((kind, id)) = row else {
            return Ok(false);
        };
        let Some(kind) = SubjectKind::parse(&kind) else {
            return Ok(false);
        };
        self.can_view(member_id, SubjectRef::new(kind, id)).await
    }
}

#[async_trait]
impl AccessPolicy for PgAccessPolicy {
    async fn can_view(&self, member_id: Uuid, subject: SubjectRef) -> Result<bool> {
        match subject.kind {
            SubjectKind::Post => self.can_view_post(member_id, subject.id).await,
            SubjectKind::Note => self.can_view_note(member_id, subject.id).await,
            SubjectKind::Project => self.can_view_project(member_id, subject.id).await,
            SubjectKind::Comment => self.can_view_comment(member_id, subject.id).await,
            SubjectKind::Reaction => self.can_view_reaction(member_id, subject.id).await,
            // Internal bookkeeping records have no standalone visibility.
            SubjectKind::Permission | SubjectKind::ProjectPin | SubjectKind::FollowUp => Ok(true),
        }
    }
}
