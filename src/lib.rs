//! IELTS Annotator Library
//!
//! Highlights and notes over immutable reading passages. Annotations are
//! stored as character offsets into the passage text and the display is
//! re-derived from `(text, annotations)` whenever the collection changes.
//!
//! # Modules
//!
//! - `passage`: Passage text and character-offset slicing
//! - `annotations`: Annotation model, immutable collection, shared store, SQLite mirror
//! - `selection`: DOM-anchored selections to offsets, contextual menus
//! - `render`: Segment reconciliation and `<mark>` HTML
//! - `notes`: Debounced note autosave
//! - `session`: Per-passage interaction state machine
//! - `routes`: HTTP surface

pub mod annotations;
pub mod config;
pub mod db;
pub mod error;
pub mod notes;
pub mod passage;
pub mod render;
pub mod routes;
pub mod selection;
pub mod session;
pub mod state;

pub use annotations::{
    Annotation, AnnotationError, AnnotationKind, AnnotationSet, AnnotationStore, SharedAnnotations,
    TextRange,
};
pub use passage::Passage;
pub use session::{InteractionState, PassageSession, ScrollTarget};
