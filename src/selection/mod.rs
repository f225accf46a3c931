//! Selection module
//!
//! Bridges DOM-anchored selections and right-clicks to the offset model and
//! enforces the no-overlap rule before anything is written.

mod menu;
mod resolver;

pub use menu::{
    AnnotationAction, AnnotationMenu, PendingAnnotation, ScreenPoint, SelectionAction,
};
pub use resolver::{DomPoint, DomSelection, SelectionError, SelectionResolver};
