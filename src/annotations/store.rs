//! SQLite storage for annotations
//!
//! Lets a reload restore the shared collection. The in-memory
//! [`AnnotationSet`](super::AnnotationSet) stays the source of truth while
//! the page is open; this repository only mirrors it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::types::{Annotation, AnnotationKind};

/// Repository for annotation persistence
pub struct AnnotationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AnnotationRepository<'a> {
    /// Create a new repository
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the annotations table
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS annotations (
                id TEXT PRIMARY KEY,
                passage_id TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                end_offset INTEGER NOT NULL,
                kind TEXT NOT NULL,
                note_text TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_annotations_passage ON annotations(passage_id);
            "#,
        )
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Save an annotation (insert or update)
    pub async fn save(&self, annotation: &Annotation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO annotations (
                id, passage_id, start_offset, end_offset, kind,
                note_text, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                note_text = excluded.note_text,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&annotation.id)
        .bind(&annotation.passage_id)
        .bind(annotation.start as i64)
        .bind(annotation.end as i64)
        .bind(annotation.kind.as_str())
        .bind(&annotation.note_text)
        .bind(annotation.created_at.to_rfc3339())
        .bind(annotation.updated_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Get an annotation by ID
    pub async fn get(&self, id: &str) -> Result<Option<Annotation>> {
        let row = sqlx::query_as::<_, AnnotationRow>(
            r#"
            SELECT id, passage_id, start_offset, end_offset, kind,
                   note_text, created_at, updated_at
            FROM annotations
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| r.into_annotation()).transpose()
    }

    /// List every stored annotation, ordered by offset
    pub async fn list_all(&self) -> Result<Vec<Annotation>> {
        let rows = sqlx::query_as::<_, AnnotationRow>(
            r#"
            SELECT id, passage_id, start_offset, end_offset, kind,
                   note_text, created_at, updated_at
            FROM annotations
            ORDER BY start_offset ASC, passage_id ASC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_annotation()).collect()
    }

    /// List annotations of one passage, ordered by offset
    pub async fn list_for_passage(&self, passage_id: &str) -> Result<Vec<Annotation>> {
        let rows = sqlx::query_as::<_, AnnotationRow>(
            r#"
            SELECT id, passage_id, start_offset, end_offset, kind,
                   note_text, created_at, updated_at
            FROM annotations
            WHERE passage_id = ?
            ORDER BY start_offset ASC
            "#,
        )
        .bind(passage_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_annotation()).collect()
    }

    /// Store a new note body
    pub async fn update_note(&self, id: &str, kind: AnnotationKind, text: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE annotations SET kind = ?, note_text = ?, updated_at = ? WHERE id = ?",
        )
        .bind(kind.as_str())
        .bind(text)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete an annotation
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM annotations WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete all annotations for a passage
    pub async fn delete_for_passage(&self, passage_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM annotations WHERE passage_id = ?")
            .bind(passage_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Internal row type for SQLite queries
#[derive(sqlx::FromRow)]
struct AnnotationRow {
    id: String,
    passage_id: String,
    start_offset: i64,
    end_offset: i64,
    kind: String,
    note_text: Option<String>,
    created_at: String,
    updated_at: String,
}

impl AnnotationRow {
    fn into_annotation(self) -> Result<Annotation> {
        let kind = AnnotationKind::parse(&self.kind)
            .with_context(|| format!("unknown annotation kind {:?}", self.kind))?;

        let created_at = DateTime::parse_from_rfc3339(&self.created_at)?.with_timezone(&Utc);
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)?.with_timezone(&Utc);

        Ok(Annotation {
            id: self.id,
            passage_id: self.passage_id,
            start: usize::try_from(self.start_offset)?,
            end: usize::try_from(self.end_offset)?,
            kind,
            note_text: self.note_text,
            created_at,
            updated_at,
        })
    }
}
