//! Annotation types
//!
//! An annotation is a half-open character range `[start, end)` over a
//! passage's plain text, tagged as a highlight or a note.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum note length accepted by the editing surface
pub const NOTE_MAX_CHARS: usize = 1000;

/// Half-open character range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    /// Create a range, `None` unless `start < end`
    pub fn new(start: usize, end: usize) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Build a candidate range from the two ends of a selection.
    ///
    /// Backwards selections are normalised; a collapsed selection yields `None`.
    pub fn from_selection(selection_start: usize, selection_end: usize) -> Option<Self> {
        let (start, end) = if selection_start <= selection_end {
            (selection_start, selection_end)
        } else {
            (selection_end, selection_start)
        };
        Self::new(start, end)
    }

    /// Number of characters covered
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether two ranges intersect
    pub fn overlaps(&self, other: &TextRange) -> bool {
        !(self.end <= other.start || other.end <= self.start)
    }
}

/// Kinds of annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// Plain highlight
    Highlight,
    /// Highlight carrying a note body
    Note,
}

impl AnnotationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Highlight => "highlight",
            AnnotationKind::Note => "note",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "highlight" => Some(AnnotationKind::Highlight),
            "note" => Some(AnnotationKind::Note),
            _ => None,
        }
    }
}

/// A highlighted or noted range within a passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Unique identifier (UUID)
    pub id: String,
    /// The passage instance this annotation belongs to
    #[serde(rename = "passageId")]
    pub passage_id: String,
    /// Start character offset (inclusive)
    pub start: usize,
    /// End character offset (exclusive)
    pub end: usize,
    pub kind: AnnotationKind,
    /// Note body, only for notes
    #[serde(rename = "noteText", skip_serializing_if = "Option::is_none")]
    pub note_text: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Annotation {
    fn new(passage_id: &str, range: TextRange, kind: AnnotationKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            passage_id: passage_id.to_string(),
            start: range.start,
            end: range.end,
            kind,
            note_text: match kind {
                AnnotationKind::Note => Some(String::new()),
                AnnotationKind::Highlight => None,
            },
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new highlight
    pub fn new_highlight(passage_id: &str, range: TextRange) -> Self {
        Self::new(passage_id, range, AnnotationKind::Highlight)
    }

    /// Create a new note with an empty body
    pub fn new_note(passage_id: &str, range: TextRange) -> Self {
        Self::new(passage_id, range, AnnotationKind::Note)
    }

    pub fn range(&self) -> TextRange {
        TextRange {
            start: self.start,
            end: self.end,
        }
    }

    /// Note body if present and non-empty
    pub fn note(&self) -> Option<&str> {
        self.note_text.as_deref().filter(|text| !text.is_empty())
    }

    pub fn is_note(&self) -> bool {
        self.kind == AnnotationKind::Note
    }

    /// Whether this annotation collides with a range on the same passage
    pub fn conflicts_with(&self, passage_id: &str, range: &TextRange) -> bool {
        self.passage_id == passage_id && self.range().overlaps(range)
    }

    /// Replace the note body without touching the range.
    ///
    /// A highlight given non-empty text becomes a note.
    pub fn with_note_text(mut self, text: &str) -> Self {
        let text = cap_note_text(text, NOTE_MAX_CHARS);
        if self.kind == AnnotationKind::Highlight && text.is_empty() {
            return self;
        }
        self.kind = AnnotationKind::Note;
        self.note_text = Some(text);
        self.updated_at = Utc::now();
        self
    }
}

/// Truncate note input to at most `max_chars` characters
pub fn cap_note_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: usize, end: usize) -> TextRange {
        TextRange::new(start, end).unwrap()
    }

    #[test]
    fn test_half_open_overlap() {
        assert!(range(10, 20).overlaps(&range(15, 25)));
        assert!(range(15, 25).overlaps(&range(10, 20)));
        assert!(range(10, 20).overlaps(&range(12, 14)));
        // Touching ranges share no character
        assert!(!range(10, 20).overlaps(&range(20, 30)));
        assert!(!range(20, 30).overlaps(&range(10, 20)));
    }

    #[test]
    fn test_from_selection() {
        assert_eq!(TextRange::from_selection(5, 5), None);
        assert_eq!(TextRange::from_selection(5, 12), Some(range(5, 12)));
        assert_eq!(TextRange::from_selection(12, 5), Some(range(5, 12)));
    }

    #[test]
    fn test_new_rejects_zero_length() {
        assert!(TextRange::new(3, 3).is_none());
        assert!(TextRange::new(4, 3).is_none());
    }

    #[test]
    fn test_create_highlight() {
        let highlight = Annotation::new_highlight("passage-1", range(2, 8));

        assert_eq!(highlight.kind, AnnotationKind::Highlight);
        assert_eq!(highlight.passage_id, "passage-1");
        assert_eq!(highlight.range(), range(2, 8));
        assert!(highlight.note_text.is_none());
    }

    #[test]
    fn test_create_note_has_empty_body() {
        let note = Annotation::new_note("passage-1", range(2, 8));

        assert_eq!(note.kind, AnnotationKind::Note);
        assert_eq!(note.note_text.as_deref(), Some(""));
        assert!(note.note().is_none());
    }

    #[test]
    fn test_highlight_promoted_by_note_text() {
        let highlight = Annotation::new_highlight("passage-1", range(2, 8));
        let unchanged = highlight.clone().with_note_text("");
        assert_eq!(unchanged.kind, AnnotationKind::Highlight);

        let note = highlight.with_note_text("synonym for rapid");
        assert_eq!(note.kind, AnnotationKind::Note);
        assert_eq!(note.note(), Some("synonym for rapid"));
        assert_eq!(note.range(), range(2, 8));
    }

    #[test]
    fn test_conflicts_scoped_by_passage() {
        let note = Annotation::new_note("passage-1", range(10, 20));
        assert!(note.conflicts_with("passage-1", &range(15, 25)));
        assert!(!note.conflicts_with("passage-2", &range(15, 25)));
    }

    #[test]
    fn test_note_text_capped() {
        let long = "é".repeat(NOTE_MAX_CHARS + 10);
        let capped = cap_note_text(&long, NOTE_MAX_CHARS);
        assert_eq!(capped.chars().count(), NOTE_MAX_CHARS);
        assert_eq!(cap_note_text("short", NOTE_MAX_CHARS), "short");
    }

    #[test]
    fn test_serialization() {
        let note = Annotation::new_note("passage-1", range(0, 4)).with_note_text("key idea");

        let json = serde_json::to_string_pretty(&note).unwrap();
        assert!(json.contains("\"kind\": \"note\""));
        assert!(json.contains("\"passageId\": \"passage-1\""));
        assert!(json.contains("\"noteText\": \"key idea\""));

        let parsed: Annotation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, note);
    }
}
