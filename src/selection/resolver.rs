//! Selection to offsets
//!
//! A live selection is anchored to rendered text fragments, which may be
//! split up by marks. Offsets are always computed against the concatenation
//! of those fragments, so they refer to the original unannotated text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotations::{AnnotationError, AnnotationSet, TextRange};
use crate::passage::Passage;
use crate::render::TextFragment;

/// A caret position inside a rendered passage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomPoint {
    /// Passage id of the container the node lives in
    pub container: String,
    /// Index of the text fragment in document order
    pub fragment: usize,
    /// Character offset inside the fragment
    pub offset: usize,
}

impl DomPoint {
    pub fn new(container: &str, fragment: usize, offset: usize) -> Self {
        Self {
            container: container.to_string(),
            fragment,
            offset,
        }
    }
}

/// The active selection: where the drag started and where it ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomSelection {
    pub anchor: DomPoint,
    pub focus: DomPoint,
}

impl DomSelection {
    pub fn new(anchor: DomPoint, focus: DomPoint) -> Self {
        Self { anchor, focus }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// Why a selection did not produce a candidate annotation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no text selected")]
    NoSelection,

    #[error("selection is outside the passage")]
    OutsideContainer,

    #[error("selection overlaps annotation {existing_id}")]
    Overlapping { existing_id: String },
}

impl SelectionError {
    /// Message to show the reader, if this failure is reported at all
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            SelectionError::Overlapping { .. } => {
                Some("Overlapping selection: choose text that is not already highlighted.")
            }
            SelectionError::NoSelection | SelectionError::OutsideContainer => None,
        }
    }
}

impl From<AnnotationError> for SelectionError {
    fn from(err: AnnotationError) -> Self {
        match err {
            AnnotationError::EmptyRange => SelectionError::NoSelection,
            AnnotationError::OutOfBounds { .. } => SelectionError::OutsideContainer,
            AnnotationError::Overlapping { existing_id } => SelectionError::Overlapping { existing_id },
        }
    }
}

/// Resolves selections for one rendered passage instance
pub struct SelectionResolver<'a> {
    passage: &'a Passage,
    fragments: &'a [TextFragment],
}

impl<'a> SelectionResolver<'a> {
    pub fn new(passage: &'a Passage, fragments: &'a [TextFragment]) -> Self {
        Self { passage, fragments }
    }

    /// Absolute character offset of a caret position
    pub fn point_offset(&self, point: &DomPoint) -> Result<usize, SelectionError> {
        if point.container != self.passage.id() {
            return Err(SelectionError::OutsideContainer);
        }
        let fragment = self
            .fragments
            .get(point.fragment)
            .ok_or(SelectionError::OutsideContainer)?;
        if point.offset > fragment.char_len() {
            return Err(SelectionError::OutsideContainer);
        }

        let preceding: usize = self.fragments[..point.fragment]
            .iter()
            .map(TextFragment::char_len)
            .sum();
        Ok(preceding + point.offset)
    }

    /// Convert a selection into a candidate range
    pub fn resolve(&self, selection: &DomSelection) -> Result<TextRange, SelectionError> {
        if selection.is_collapsed() {
            return Err(SelectionError::NoSelection);
        }
        let anchor = self.point_offset(&selection.anchor)?;
        let focus = self.point_offset(&selection.focus)?;
        let range = TextRange::from_selection(anchor, focus).ok_or(SelectionError::NoSelection)?;

        if !self.passage.contains_range(range) {
            return Err(SelectionError::OutsideContainer);
        }
        Ok(range)
    }

    /// Check a candidate range against the passage's existing annotations
    pub fn validate(&self, range: TextRange, set: &AnnotationSet) -> Result<TextRange, SelectionError> {
        set.check_insert(self.passage.id(), &range, self.passage.char_len())?;
        Ok(range)
    }

    /// Resolve then validate
    pub fn resolve_and_validate(
        &self,
        selection: &DomSelection,
        set: &AnnotationSet,
    ) -> Result<TextRange, SelectionError> {
        let range = self.resolve(selection)?;
        let range = self.validate(range, set)?;
        tracing::debug!(
            passage_id = %self.passage.id(),
            start = range.start,
            end = range.end,
            "selection resolved"
        );
        Ok(range)
    }
}
