//! Immutable annotation collection
//!
//! Every mutation returns a new collection; the old one is never touched.
//! Entries are kept sorted by `start` (ties broken by passage id) so each
//! passage's slice is already ordered when filtered.

use std::sync::Arc;

use thiserror::Error;

use super::types::{Annotation, TextRange};

/// Reasons an annotation cannot be added
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    #[error("annotation range is empty")]
    EmptyRange,

    #[error("annotation range ends at {end} but the passage has {len} characters")]
    OutOfBounds { end: usize, len: usize },

    #[error("selection overlaps existing annotation {existing_id}")]
    Overlapping { existing_id: String },
}

/// Shared, immutable set of annotations across all passages
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    items: Arc<Vec<Annotation>>,
}

impl AnnotationSet {
    /// Build a collection, sorting the input
    pub fn new(mut items: Vec<Annotation>) -> Self {
        sort_annotations(&mut items);
        Self {
            items: Arc::new(items),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.items
    }

    /// Whether both handles point at the same collection
    pub fn ptr_eq(&self, other: &AnnotationSet) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.items.iter().find(|a| a.id == id)
    }

    /// Annotations of one passage, ordered by `start`
    pub fn for_passage<'a>(&'a self, passage_id: &'a str) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.items.iter().filter(move |a| a.passage_id == passage_id)
    }

    /// First annotation of `passage_id` intersecting `range`
    pub fn find_overlap(&self, passage_id: &str, range: &TextRange) -> Option<&Annotation> {
        self.items
            .iter()
            .find(|a| a.conflicts_with(passage_id, range))
    }

    /// Validate a candidate range for a passage without inserting it
    pub fn check_insert(
        &self,
        passage_id: &str,
        range: &TextRange,
        passage_len: usize,
    ) -> Result<(), AnnotationError> {
        if range.is_empty() {
            return Err(AnnotationError::EmptyRange);
        }
        if range.end > passage_len {
            return Err(AnnotationError::OutOfBounds {
                end: range.end,
                len: passage_len,
            });
        }
        if let Some(existing) = self.find_overlap(passage_id, range) {
            return Err(AnnotationError::Overlapping {
                existing_id: existing.id.clone(),
            });
        }
        Ok(())
    }

    /// Return a new collection with `annotation` added
    pub fn try_insert(
        &self,
        annotation: Annotation,
        passage_len: usize,
    ) -> Result<AnnotationSet, AnnotationError> {
        self.check_insert(&annotation.passage_id, &annotation.range(), passage_len)?;

        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.extend(self.items.iter().cloned());
        let at = items.partition_point(|a| sort_key(a) <= sort_key(&annotation));
        items.insert(at, annotation);
        Ok(Self {
            items: Arc::new(items),
        })
    }

    /// Return a new collection without `id`, or `None` if it is absent
    pub fn remove(&self, id: &str) -> Option<AnnotationSet> {
        self.get(id)?;
        let items = self.items.iter().filter(|a| a.id != id).cloned().collect();
        Some(Self {
            items: Arc::new(items),
        })
    }

    /// Return a new collection without any annotation of `passage_id`
    pub fn clear_passage(&self, passage_id: &str) -> (AnnotationSet, usize) {
        let items: Vec<Annotation> = self
            .items
            .iter()
            .filter(|a| a.passage_id != passage_id)
            .cloned()
            .collect();
        let removed = self.items.len() - items.len();
        (
            Self {
                items: Arc::new(items),
            },
            removed,
        )
    }

    /// Return a new collection with the note body of `id` replaced.
    ///
    /// The range never changes. A highlight given non-empty text becomes a
    /// note. `None` if `id` is absent.
    pub fn update_note(&self, id: &str, text: &str) -> Option<AnnotationSet> {
        self.get(id)?;
        let items = self
            .items
            .iter()
            .map(|a| {
                if a.id == id {
                    a.clone().with_note_text(text)
                } else {
                    a.clone()
                }
            })
            .collect();
        Some(Self {
            items: Arc::new(items),
        })
    }
}

fn sort_key(annotation: &Annotation) -> (usize, &str) {
    (annotation.start, annotation.passage_id.as_str())
}

/// Sort by `start`, then passage id
pub fn sort_annotations(items: &mut [Annotation]) {
    items.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
}

impl FromIterator<Annotation> for AnnotationSet {
    fn from_iter<T: IntoIterator<Item = Annotation>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
