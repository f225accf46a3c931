//! Shared annotation store
//!
//! The annotation collection is owned above any single passage. Passage
//! sessions read the current collection and write back whole replacements
//! through [`AnnotationStore`]; they never mutate in place.

use std::sync::Arc;

use parking_lot::RwLock;

use super::collection::AnnotationSet;

/// Owner of the shared annotation collection: a getter plus a setter
pub trait AnnotationStore {
    /// The current collection
    fn current(&self) -> AnnotationSet;

    /// Replace the whole collection
    fn replace(&self, next: AnnotationSet);

    /// Counter bumped by every replacement
    fn revision(&self) -> u64;
}

#[derive(Debug, Default)]
struct SharedInner {
    set: AnnotationSet,
    revision: u64,
}

/// In-memory store for one page lifetime
#[derive(Debug, Clone, Default)]
pub struct SharedAnnotations {
    inner: Arc<RwLock<SharedInner>>,
}

impl SharedAnnotations {
    pub fn new(initial: AnnotationSet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SharedInner {
                set: initial,
                revision: 0,
            })),
        }
    }

    /// Apply a fallible change against the latest collection under one lock
    pub fn update<T, E>(
        &self,
        change: impl FnOnce(&AnnotationSet) -> Result<(AnnotationSet, T), E>,
    ) -> Result<T, E> {
        let mut inner = self.inner.write();
        let (next, out) = change(&inner.set)?;
        inner.set = next;
        inner.revision += 1;
        Ok(out)
    }
}

impl AnnotationStore for SharedAnnotations {
    fn current(&self) -> AnnotationSet {
        self.inner.read().set.clone()
    }

    fn replace(&self, next: AnnotationSet) {
        let mut inner = self.inner.write();
        inner.set = next;
        inner.revision += 1;
        tracing::trace!(revision = inner.revision, count = inner.set.len(), "annotations replaced");
    }

    fn revision(&self) -> u64 {
        self.inner.read().revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{Annotation, AnnotationError, TextRange};

    #[test]
    fn test_replace_bumps_revision() {
        let store = SharedAnnotations::default();
        assert_eq!(store.revision(), 0);

        let next = store
            .current()
            .try_insert(Annotation::new_highlight("p1", TextRange::new(0, 4).unwrap()), 10)
            .unwrap();
        store.replace(next);

        assert_eq!(store.revision(), 1);
        assert_eq!(store.current().len(), 1);
    }

    #[test]
    fn test_clones_share_collection() {
        let store = SharedAnnotations::default();
        let other = store.clone();

        store.replace(AnnotationSet::new(vec![Annotation::new_note(
            "p2",
            TextRange::new(1, 2).unwrap(),
        )]));

        assert_eq!(other.current().len(), 1);
    }

    #[test]
    fn test_failed_update_leaves_store_unchanged() {
        let store = SharedAnnotations::default();
        let result: Result<(), AnnotationError> =
            store.update(|_| Err(AnnotationError::EmptyRange));

        assert!(result.is_err());
        assert_eq!(store.revision(), 0);
    }
}
