//! Render module
//!
//! Derives the displayable view of a passage from its text and annotations:
//! segment reconciliation plus HTML output and read-back.

mod html;
mod reconciler;

pub use html::{
    fragments_from_html, render_html, HtmlConfig, ParsedPassage, RenderError, TextFragment,
};
pub use reconciler::{passage_annotations, reconcile, segment, RenderedPassage, Segment};
