//! Annotation module
//!
//! The offset model behind passage highlights and notes.
//!
//! - `types`: half-open ranges and the annotation record
//! - `collection`: the immutable, start-ordered annotation collection
//! - `shared`: the parent-owned store that sessions read and replace
//! - `store`: SQLite persistence

mod collection;
mod shared;
mod store;
mod types;

pub use collection::{sort_annotations, AnnotationError, AnnotationSet};
pub use shared::{AnnotationStore, SharedAnnotations};
pub use store::AnnotationRepository;
pub use types::{cap_note_text, Annotation, AnnotationKind, TextRange, NOTE_MAX_CHARS};
