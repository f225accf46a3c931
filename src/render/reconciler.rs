//! Render reconciliation
//!
//! Turns `(passage text, annotations)` into alternating plain and annotated
//! segments. The passage text is the only source of position data; segments
//! are a derived view and are rebuilt whenever the passage's annotations
//! change.

use std::collections::HashMap;

use serde::Serialize;

use crate::annotations::{sort_annotations, Annotation, AnnotationKind, AnnotationSet};
use crate::passage::Passage;

/// One displayable piece of a passage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Segment {
    /// Unannotated text
    Plain { text: String },
    /// Text covered by one annotation
    Annotated {
        text: String,
        #[serde(rename = "annotationId")]
        annotation_id: String,
        kind: AnnotationKind,
        /// Hover text, only for notes with a non-empty body
        #[serde(rename = "noteText", skip_serializing_if = "Option::is_none")]
        note_text: Option<String>,
    },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Plain { text } | Segment::Annotated { text, .. } => text,
        }
    }

    pub fn annotation_id(&self) -> Option<&str> {
        match self {
            Segment::Plain { .. } => None,
            Segment::Annotated { annotation_id, .. } => Some(annotation_id),
        }
    }

    pub fn is_annotated(&self) -> bool {
        matches!(self, Segment::Annotated { .. })
    }
}

/// Partition a passage by annotations already filtered to it and sorted by `start`.
///
/// Entries that overlap an earlier one or run past the text are skipped, so
/// the concatenated segments always reproduce the passage text.
pub fn segment(passage: &Passage, annotations: &[Annotation]) -> Vec<Segment> {
    if annotations.is_empty() {
        return vec![Segment::Plain {
            text: passage.text().to_string(),
        }];
    }

    let len = passage.char_len();
    let mut segments = Vec::with_capacity(annotations.len() * 2 + 1);
    let mut cursor = 0;

    for annotation in annotations {
        if annotation.start < cursor || annotation.end > len || annotation.start >= annotation.end {
            tracing::warn!(
                annotation_id = %annotation.id,
                start = annotation.start,
                end = annotation.end,
                "skipping annotation that does not fit the passage"
            );
            continue;
        }

        if annotation.start > cursor {
            segments.push(Segment::Plain {
                text: passage.slice(cursor, annotation.start).to_string(),
            });
        }
        segments.push(Segment::Annotated {
            text: passage.slice(annotation.start, annotation.end).to_string(),
            annotation_id: annotation.id.clone(),
            kind: annotation.kind,
            note_text: annotation.note().map(str::to_string),
        });
        cursor = annotation.end;
    }

    if cursor < len {
        segments.push(Segment::Plain {
            text: passage.slice(cursor, len).to_string(),
        });
    }

    if segments.is_empty() {
        segments.push(Segment::Plain {
            text: passage.text().to_string(),
        });
    }

    segments
}

/// Annotations of one passage, sorted by `start`
pub fn passage_annotations(passage_id: &str, set: &AnnotationSet) -> Vec<Annotation> {
    let mut annotations: Vec<Annotation> = set.for_passage(passage_id).cloned().collect();
    sort_annotations(&mut annotations);
    annotations
}

/// Filter, sort and segment in one step
pub fn reconcile(passage: &Passage, set: &AnnotationSet) -> Vec<Segment> {
    segment(passage, &passage_annotations(passage.id(), set))
}

/// Cached segmentation of one passage instance with an id -> segment map
#[derive(Debug, Clone)]
pub struct RenderedPassage {
    passage_id: String,
    annotations: Vec<Annotation>,
    segments: Vec<Segment>,
    index: HashMap<String, usize>,
    generation: u64,
}

impl RenderedPassage {
    /// Render a passage against the current collection
    pub fn new(passage: &Passage, set: &AnnotationSet) -> Self {
        let mut rendered = Self {
            passage_id: passage.id().to_string(),
            annotations: Vec::new(),
            segments: Vec::new(),
            index: HashMap::new(),
            generation: 0,
        };
        rendered.rebuild(passage, passage_annotations(passage.id(), set));
        rendered
    }

    /// Recompute if this passage's annotations changed. Returns whether it did.
    pub fn refresh(&mut self, passage: &Passage, set: &AnnotationSet) -> bool {
        let annotations = passage_annotations(passage.id(), set);
        if annotations == self.annotations {
            return false;
        }
        self.rebuild(passage, annotations);
        true
    }

    fn rebuild(&mut self, passage: &Passage, annotations: Vec<Annotation>) {
        self.segments = segment(passage, &annotations);
        self.index = self
            .segments
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.annotation_id().map(|id| (id.to_string(), i)))
            .collect();
        self.annotations = annotations;
        self.generation += 1;
        tracing::debug!(
            passage_id = %self.passage_id,
            annotations = self.annotations.len(),
            segments = self.segments.len(),
            "passage reconciled"
        );
    }

    pub fn passage_id(&self) -> &str {
        &self.passage_id
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Annotations this rendering was built from
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Incremented on every recompute
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Segment index rendering `annotation_id`
    pub fn segment_for(&self, annotation_id: &str) -> Option<usize> {
        self.index.get(annotation_id).copied()
    }

    /// Annotation id rendered at `segment_index`
    pub fn annotation_at(&self, segment_index: usize) -> Option<&Annotation> {
        let id = self.segments.get(segment_index)?.annotation_id()?;
        self.annotations.iter().find(|a| a.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::TextRange;

    const TEXT: &str = "Coral reefs are among the most diverse ecosystems on Earth.";

    fn passage() -> Passage {
        Passage::new("reading-1", TEXT)
    }

    fn range(start: usize, end: usize) -> TextRange {
        TextRange::new(start, end).unwrap()
    }

    fn insert(set: AnnotationSet, annotation: Annotation) -> AnnotationSet {
        set.try_insert(annotation, TEXT.chars().count()).unwrap()
    }

    fn joined(segments: &[Segment]) -> String {
        segments.iter().map(Segment::text).collect()
    }

    #[test]
    fn test_no_annotations_single_plain_segment() {
        let segments = reconcile(&passage(), &AnnotationSet::default());
        assert_eq!(
            segments,
            vec![Segment::Plain {
                text: TEXT.to_string()
            }]
        );
    }

    #[test]
    fn test_empty_passage_renders_one_empty_segment() {
        let empty = Passage::new("p", "");
        let segments = reconcile(&empty, &AnnotationSet::default());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text(), "");
    }

    #[test]
    fn test_selection_round_trip() {
        let annotation = Annotation::new_highlight("reading-1", range(5, 12));
        let id = annotation.id.clone();
        let set = insert(AnnotationSet::default(), annotation);

        let segments = reconcile(&passage(), &set);

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].text(), &TEXT[5..12]);
        assert_eq!(segments[1].annotation_id(), Some(id.as_str()));
    }

    #[test]
    fn test_segments_reproduce_text() {
        let mut set = AnnotationSet::default();
        set = insert(set, Annotation::new_highlight("reading-1", range(0, 5)));
        set = insert(set, Annotation::new_note("reading-1", range(5, 11)));
        set = insert(set, Annotation::new_highlight("reading-1", range(50, 59)));
        set = insert(set, Annotation::new_highlight("other", range(1, 40)));

        let segments = reconcile(&passage(), &set);

        assert_eq!(joined(&segments), TEXT);
        // Adjacent annotations produce no empty plain segment between them
        assert!(segments.iter().all(|s| !s.text().is_empty()));
        assert_eq!(segments.iter().filter(|s| s.is_annotated()).count(), 3);
    }

    #[test]
    fn test_reconcile_is_deterministic() {
        let mut set = AnnotationSet::default();
        set = insert(set, Annotation::new_note("reading-1", range(16, 21)));
        set = insert(set, Annotation::new_highlight("reading-1", range(31, 38)));

        assert_eq!(reconcile(&passage(), &set), reconcile(&passage(), &set));
    }

    #[test]
    fn test_malformed_annotations_skipped() {
        let mut overlapping = Annotation::new_highlight("reading-1", range(2, 10));
        overlapping.start = 4;
        let first = Annotation::new_highlight("reading-1", range(0, 6));
        let mut past_end = Annotation::new_highlight("reading-1", range(10, 12));
        past_end.end = 500;

        let segments = segment(&passage(), &[first, overlapping, past_end]);

        assert_eq!(joined(&segments), TEXT);
        assert_eq!(segments.iter().filter(|s| s.is_annotated()).count(), 1);
    }

    #[test]
    fn test_note_hover_text_only_when_non_empty() {
        let mut set = AnnotationSet::default();
        let empty_note = Annotation::new_note("reading-1", range(0, 5));
        let filled = Annotation::new_note("reading-1", range(6, 11)).with_note_text("biodiversity");
        set = insert(set, empty_note);
        set = insert(set, filled);

        let segments = reconcile(&passage(), &set);
        let notes: Vec<Option<&str>> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Annotated { note_text, .. } => Some(note_text.as_deref()),
                Segment::Plain { .. } => None,
            })
            .collect();

        assert_eq!(notes, vec![None, Some("biodiversity")]);
    }

    #[test]
    fn test_multibyte_offsets() {
        let text = "Études show naïve readers skim.";
        let passage = Passage::new("p", text);
        let set = AnnotationSet::default()
            .try_insert(Annotation::new_highlight("p", range(12, 17)), passage.char_len())
            .unwrap();

        let segments = reconcile(&passage, &set);
        assert_eq!(segments[1].text(), "naïve");
        assert_eq!(joined(&segments), text);
    }

    #[test]
    fn test_rendered_passage_refresh_and_index() {
        let passage = passage();
        let mut set = AnnotationSet::default();
        let mut rendered = RenderedPassage::new(&passage, &set);
        assert_eq!(rendered.generation(), 1);

        // Changes to other passages do not trigger a recompute
        set = insert(set, Annotation::new_highlight("other", range(0, 3)));
        assert!(!rendered.refresh(&passage, &set));

        let annotation = Annotation::new_note("reading-1", range(26, 30));
        let id = annotation.id.clone();
        set = insert(set, annotation);
        assert!(rendered.refresh(&passage, &set));
        assert_eq!(rendered.generation(), 2);

        let index = rendered.segment_for(&id).unwrap();
        assert_eq!(rendered.segments()[index].text(), "most");
        assert_eq!(rendered.annotation_at(index).unwrap().id, id);
        assert!(rendered.annotation_at(0).is_none());
    }
}
