//! Contextual menus
//!
//! A validated selection opens the action menu (Highlight, Note); a
//! right-click on a mark opens the annotation menu.

use serde::{Deserialize, Serialize};

use crate::annotations::{Annotation, AnnotationKind, TextRange};

/// Screen coordinates for positioning a menu
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Actions offered for a fresh selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionAction {
    Highlight,
    Note,
}

/// A validated selection waiting for the reader to pick an action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingAnnotation {
    #[serde(rename = "passageId")]
    pub passage_id: String,
    pub range: TextRange,
    /// The selected text
    pub text: String,
    pub position: ScreenPoint,
    pub actions: Vec<SelectionAction>,
}

impl PendingAnnotation {
    pub fn new(passage_id: &str, range: TextRange, text: &str, position: ScreenPoint) -> Self {
        Self {
            passage_id: passage_id.to_string(),
            range,
            text: text.to_string(),
            position,
            actions: vec![SelectionAction::Highlight, SelectionAction::Note],
        }
    }
}

/// Actions offered for an existing annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnnotationAction {
    /// View or edit the note body, notes only
    EditNote,
    Clear,
    ClearAll,
}

/// Menu opened by right-clicking a mark
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationMenu {
    #[serde(rename = "annotationId")]
    pub annotation_id: String,
    #[serde(rename = "passageId")]
    pub passage_id: String,
    pub kind: AnnotationKind,
    pub position: ScreenPoint,
    pub actions: Vec<AnnotationAction>,
}

impl AnnotationMenu {
    pub fn for_annotation(annotation: &Annotation, position: ScreenPoint) -> Self {
        let mut actions = Vec::with_capacity(3);
        if annotation.is_note() {
            actions.push(AnnotationAction::EditNote);
        }
        actions.push(AnnotationAction::Clear);
        actions.push(AnnotationAction::ClearAll);

        Self {
            annotation_id: annotation.id.clone(),
            passage_id: annotation.passage_id.clone(),
            kind: annotation.kind,
            position,
            actions,
        }
    }

    pub fn offers(&self, action: AnnotationAction) -> bool {
        self.actions.contains(&action)
    }
}
