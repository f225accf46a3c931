//! Application state management

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::SqlitePool;

use crate::annotations::{AnnotationRepository, AnnotationSet, AnnotationStore, SharedAnnotations};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::notes::{spawn_autosaver, AutosaveHandle, NoteSink, SaveRequest};
use crate::passage::Passage;
use crate::render::HtmlConfig;

/// Outcome of registering passage text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    /// Same text as already registered
    Unchanged,
    /// Different text for a passage with no annotations
    Replaced,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    db: SqlitePool,
    annotations: SharedAnnotations,
    passages: RwLock<HashMap<String, Passage>>,
    html: HtmlConfig,
    autosave: AutosaveHandle,
}

impl AppState {
    /// Create a new application state around a restored collection.
    ///
    /// Starts the note autosave task, so this must run inside a tokio runtime.
    pub fn new(config: Config, db: SqlitePool, initial: AnnotationSet) -> Self {
        let annotations = SharedAnnotations::new(initial);
        let sink = Arc::new(PersistedNotes {
            annotations: annotations.clone(),
            db: db.clone(),
        });
        let autosave = spawn_autosaver(config.annotations.autosave_quiet_period(), sink);
        let html = HtmlConfig::with_class_prefix(&config.annotations.class_prefix);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                annotations,
                passages: RwLock::new(HashMap::new()),
                html,
                autosave,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    /// The shared annotation collection
    pub fn annotations(&self) -> &SharedAnnotations {
        &self.inner.annotations
    }

    pub fn html_config(&self) -> &HtmlConfig {
        &self.inner.html
    }

    pub fn autosave(&self) -> &AutosaveHandle {
        &self.inner.autosave
    }

    /// Register passage text.
    ///
    /// Stored offsets only make sense against the text they were made on, so
    /// once a passage has annotations its text can no longer change.
    pub fn register_passage(&self, passage: Passage) -> Result<Registration> {
        let mut passages = self.inner.passages.write();
        let previous = passages.get(passage.id());
        if previous.is_some_and(|p| p.text() == passage.text()) {
            return Ok(Registration::Unchanged);
        }

        let current = self.inner.annotations.current();
        let mut annotated = current.for_passage(passage.id()).peekable();
        if previous.is_some() && annotated.peek().is_some() {
            return Err(AppError::Conflict(format!(
                "Passage {} already has annotations; its text cannot change",
                passage.id()
            )));
        }
        if let Some(stray) = annotated.find(|a| a.end > passage.char_len()) {
            return Err(AppError::Conflict(format!(
                "Annotation {} does not fit the text of passage {}",
                stray.id,
                passage.id()
            )));
        }

        let outcome = if previous.is_some() {
            Registration::Replaced
        } else {
            Registration::Created
        };
        drop(annotated);
        passages.insert(passage.id().to_string(), passage);
        Ok(outcome)
    }

    pub fn passage(&self, passage_id: &str) -> Option<Passage> {
        self.inner.passages.read().get(passage_id).cloned()
    }
}

/// Note sink that updates the shared collection and mirrors it to SQLite
struct PersistedNotes {
    annotations: SharedAnnotations,
    db: SqlitePool,
}

#[async_trait]
impl NoteSink for PersistedNotes {
    async fn save(&self, request: &SaveRequest) {
        self.annotations.save(request).await;

        let Some(updated) = self.annotations.current().get(&request.annotation_id).cloned() else {
            return;
        };
        let text = updated.note_text.as_deref().unwrap_or_default();
        let repo = AnnotationRepository::new(&self.db);
        if let Err(e) = repo.update_note(&updated.id, updated.kind, text).await {
            tracing::warn!(annotation_id = %updated.id, "failed to persist note: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{Annotation, TextRange};
    use crate::db::memory_pool;

    #[tokio::test]
    async fn test_autosave_persists_through_state() {
        let pool = memory_pool().await;
        let note = Annotation::new_note("p1", TextRange::new(0, 4).unwrap());
        AnnotationRepository::new(&pool).save(&note).await.unwrap();
        let state = AppState::new(Config::default(), pool.clone(), AnnotationSet::new(vec![note.clone()]));

        assert!(state.autosave().save_now(&note.id, Some("topic sentence")).await);

        let current = state.annotations().current();
        assert_eq!(current.get(&note.id).unwrap().note(), Some("topic sentence"));
        let stored = AnnotationRepository::new(&pool).get(&note.id).await.unwrap().unwrap();
        assert_eq!(stored.note(), Some("topic sentence"));
    }

    #[tokio::test]
    async fn test_shutdown_stores_last_draft() {
        let pool = memory_pool().await;
        let note = Annotation::new_note("p1", TextRange::new(0, 4).unwrap());
        AnnotationRepository::new(&pool).save(&note).await.unwrap();
        let state = AppState::new(Config::default(), pool.clone(), AnnotationSet::new(vec![note.clone()]));

        for draft in ["first", "second", "third"] {
            assert!(state.autosave().save_now(&note.id, Some(draft)).await);
        }
        assert!(state.autosave().edit(&note.id, "unsaved draft"));
        assert!(state.autosave().shutdown().await);

        let stored = AnnotationRepository::new(&pool).get(&note.id).await.unwrap().unwrap();
        assert_eq!(stored.note(), Some("unsaved draft"));
    }

    #[tokio::test]
    async fn test_passage_registry() {
        let state = AppState::new(Config::default(), memory_pool().await, AnnotationSet::default());

        assert_eq!(state.register_passage(Passage::new("p1", "first")).unwrap(), Registration::Created);
        assert_eq!(state.register_passage(Passage::new("p1", "first")).unwrap(), Registration::Unchanged);
        assert_eq!(state.register_passage(Passage::new("p1", "second")).unwrap(), Registration::Replaced);
        assert_eq!(state.passage("p1").unwrap().text(), "second");
        assert!(state.passage("p2").is_none());
    }

    #[tokio::test]
    async fn test_annotated_passage_text_is_frozen() {
        let highlight = Annotation::new_highlight("p1", TextRange::new(4, 9).unwrap());
        let state = AppState::new(
            Config::default(),
            memory_pool().await,
            AnnotationSet::new(vec![highlight]),
        );

        // Restored annotations must fit the first registration
        assert!(matches!(
            state.register_passage(Passage::new("p1", "A cat")),
            Err(AppError::Conflict(_))
        ));
        assert_eq!(
            state.register_passage(Passage::new("p1", "The quick brown fox")).unwrap(),
            Registration::Created
        );
        assert!(matches!(
            state.register_passage(Passage::new("p1", "Another longer text here")),
            Err(AppError::Conflict(_))
        ));
        assert_eq!(state.passage("p1").unwrap().text(), "The quick brown fox");
    }
}
