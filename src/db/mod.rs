//! Database module for SQLite persistence
//!
//! Annotations are mirrored here so a restart can restore the collection.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::annotations::{AnnotationRepository, AnnotationSet};
use crate::error::Result;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    initialize_schema(&pool).await?;

    Ok(pool)
}

/// Create tables that do not exist yet
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    AnnotationRepository::new(pool).init().await?;
    Ok(())
}

/// Load every stored annotation into a fresh collection
pub async fn load_annotations(pool: &SqlitePool) -> Result<AnnotationSet> {
    let annotations = AnnotationRepository::new(pool).list_all().await?;
    tracing::info!(count = annotations.len(), "annotations restored");
    Ok(AnnotationSet::new(annotations))
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    initialize_schema(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{Annotation, TextRange};

    #[tokio::test]
    async fn test_load_restores_sorted_collection() {
        let pool = memory_pool().await;
        let repo = AnnotationRepository::new(&pool);
        repo.save(&Annotation::new_highlight("p1", TextRange::new(20, 30).unwrap()))
            .await
            .unwrap();
        repo.save(&Annotation::new_note("p1", TextRange::new(0, 4).unwrap()))
            .await
            .unwrap();

        let set = load_annotations(&pool).await.unwrap();

        let starts: Vec<usize> = set.iter().map(|a| a.start).collect();
        assert_eq!(starts, vec![0, 20]);
    }
}
