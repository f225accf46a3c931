//! Passage text
//!
//! A passage is one immutable block of plain text. All annotation offsets
//! are character (Unicode scalar) indices into it, so the passage keeps a
//! char -> byte table to slice without rescanning.

use serde::{Deserialize, Serialize};

use crate::annotations::TextRange;

/// One immutable passage of reading text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PassageSource", into = "PassageSource")]
pub struct Passage {
    id: String,
    text: String,
    /// Byte offset of every char boundary, plus `text.len()` at the end
    boundaries: Vec<usize>,
}

/// Wire form of a passage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageSource {
    pub id: String,
    pub text: String,
}

impl Passage {
    /// Create a passage from its id and text
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self {
            id: id.into(),
            text,
            boundaries,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Slice `[start, end)` by character offsets, clamped to the text
    pub fn slice(&self, start: usize, end: usize) -> &str {
        let len = self.char_len();
        let start = start.min(len);
        let end = end.clamp(start, len);
        &self.text[self.boundaries[start]..self.boundaries[end]]
    }

    /// Slice the text covered by a range
    pub fn slice_range(&self, range: TextRange) -> &str {
        self.slice(range.start, range.end)
    }

    /// Whether a range lies entirely inside the text
    pub fn contains_range(&self, range: TextRange) -> bool {
        range.end <= self.char_len()
    }
}

impl From<PassageSource> for Passage {
    fn from(source: PassageSource) -> Self {
        Passage::new(source.id, source.text)
    }
}

impl From<Passage> for PassageSource {
    fn from(passage: Passage) -> Self {
        PassageSource {
            id: passage.id,
            text: passage.text,
        }
    }
}

/// Character length of a string slice
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
