//! Content read-model repository implementation.
//!
//! Processors read the *current* state of posts, comments, notes, projects,
//! and reactions — never event-time snapshots — so out-of-order event
//! arrival converges on current truth. The only writes here are activity
//! timestamps.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tandem_core::{
    Comment, ContentRepository, Error, Note, Post, Project, Reaction, Result, SubjectKind,
    SubjectRef, Visibility,
};

use crate::refs::subject_from_row;

/// PostgreSQL implementation of ContentRepository.
pub struct PgContentRepository {
    pool: Pool<Postgres>,
}

impl PgContentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentRepository for PgContentRepository {
    async fn post(&self, id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(
            "SELECT id, organization_id, project_id, parent_id, author_id, title, body_html, \
                    draft, visibility, resolved_at, resolved_by_id, resolved_comment_id, \
                    published_at, last_activity_at
             FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| {
            let visibility: String = row.get("visibility");
            Post {
                id: row.get("id"),
                organization_id: row.get("organization_id"),
                project_id: row.get("project_id"),
                parent_id: row.get("parent_id"),
                author_id: row.get("author_id"),
                title: row.get("title"),
                body_html: row.get("body_html"),
                draft: row.get("draft"),
                visibility: Visibility::parse(&visibility).unwrap_or_default(),
                resolved_at: row.get("resolved_at"),
                resolved_by_id: row.get("resolved_by_id"),
                resolved_comment_id: row.get("resolved_comment_id"),
                published_at: row.get("published_at"),
                last_activity_at: row.get("last_activity_at"),
            }
        }))
    }

    async fn comment(&self, id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "SELECT id, organization_id, subject_kind, subject_id, parent_id, author_id, \
                    body_html, resolved_at, resolved_by_id, discarded_at, created_at
             FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| Comment {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            subject: subject_from_row(&row, "subject_kind", "subject_id"),
            parent_id: row.get("parent_id"),
            author_id: row.get("author_id"),
            body_html: row.get("body_html"),
            resolved_at: row.get("resolved_at"),
            resolved_by_id: row.get("resolved_by_id"),
            discarded_at: row.get("discarded_at"),
            created_at: row.get("created_at"),
        }))
    }

    async fn note(&self, id: Uuid) -> Result<Option<Note>> {
        let row = sqlx::query(
            "SELECT id, organization_id, author_id, project_id, title, body_html, \
                    content_updated_at, last_activity_at
             FROM notes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| Note {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            author_id: row.get("author_id"),
            project_id: row.get("project_id"),
            title: row.get("title"),
            body_html: row.get("body_html"),
            content_updated_at: row.get("content_updated_at"),
            last_activity_at: row.get("last_activity_at"),
        }))
    }

    async fn project(&self, id: Uuid) -> Result<Option<Project>> {
        let row = sqlx::query(
            "SELECT id, organization_id, name, private, last_activity_at
             FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| Project {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            name: row.get("name"),
            private: row.get("private"),
            last_activity_at: row.get("last_activity_at"),
        }))
    }

    async fn reaction(&self, id: Uuid) -> Result<Option<Reaction>> {
        let row = sqlx::query(
            "SELECT id, organization_id, subject_kind, subject_id, member_id, content
             FROM reactions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| Reaction {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            subject: subject_from_row(&row, "subject_kind", "subject_id"),
            member_id: row.get("member_id"),
            content: row.get("content"),
        }))
    }

    async fn reply_ids(&self, comment_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM comments WHERE parent_id = $1 AND discarded_at IS NULL",
        )
        .bind(comment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn latest_comment_at(&self, subject: SubjectRef) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
            "SELECT MAX(created_at) FROM comments
             WHERE subject_kind = $1 AND subject_id = $2 AND discarded_at IS NULL",
        )
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.and_then(|(max,)| max))
    }

    async fn set_last_activity(&self, subject: SubjectRef, at: DateTime<Utc>) -> Result<()> {
        let query = match subject.kind {
            SubjectKind::Post => "UPDATE posts SET last_activity_at = $1 WHERE id = $2",
            SubjectKind::Note => "UPDATE notes SET last_activity_at = $1 WHERE id = $2",
            SubjectKind::Project => "UPDATE projects SET last_activity_at = $1 WHERE id = $2",
            // Other kinds carry no activity column.
            _ => return Ok(()),
        };

        sqlx::query(query)
            .bind(at)
            .bind(subject.id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
