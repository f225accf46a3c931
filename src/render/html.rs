//! HTML output for reconciled passages
//!
//! Annotated segments become `<mark>` elements carrying the annotation id and
//! kind. The same markup can be read back with lol_html into ordered text
//! fragments, which is what selection resolution walks when the page already
//! shows annotations.

use std::cell::RefCell;
use std::rc::Rc;

use html_escape::{decode_html_entities, encode_double_quoted_attribute, encode_text};
use lol_html::{doc_text, element, end_tag, rewrite_str, RewriteStrSettings};

use super::reconciler::Segment;

/// Attribute and class names used in rendered markup
#[derive(Debug, Clone)]
pub struct HtmlConfig {
    /// CSS class prefix for marks and the container
    pub class_prefix: String,
    /// Data attribute for annotation ID
    pub id_attribute: String,
    /// Data attribute for annotation kind
    pub kind_attribute: String,
    /// Data attribute naming the passage on the container
    pub container_attribute: String,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            class_prefix: "ia-mark".to_string(),
            id_attribute: "data-annotation-id".to_string(),
            kind_attribute: "data-annotation-kind".to_string(),
            container_attribute: "data-passage-id".to_string(),
        }
    }
}

impl HtmlConfig {
    /// Config with a custom class prefix
    pub fn with_class_prefix(prefix: &str) -> Self {
        Self {
            class_prefix: prefix.to_string(),
            ..Self::default()
        }
    }
}

/// One run of text in document order, as a DOM text node would hold it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFragment {
    pub text: String,
    /// Enclosing annotation, if the run sits inside a mark
    pub annotation_id: Option<String>,
}

impl TextFragment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            annotation_id: None,
        }
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

impl From<&Segment> for TextFragment {
    fn from(segment: &Segment) -> Self {
        Self {
            text: segment.text().to_string(),
            annotation_id: segment.annotation_id().map(str::to_string),
        }
    }
}

/// Fragments read back from rendered markup
#[derive(Debug, Clone, Default)]
pub struct ParsedPassage {
    /// Passage id found on the container, if any
    pub container_id: Option<String>,
    pub fragments: Vec<TextFragment>,
}

/// Errors while reading rendered markup
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("HTML rewrite failed: {0}")]
    RewriteError(String),
}

/// Render segments inside a container element for `passage_id`
pub fn render_html(passage_id: &str, segments: &[Segment], config: &HtmlConfig) -> String {
    let mut out = format!(
        "<div class=\"{}-passage\" {}=\"{}\">",
        config.class_prefix,
        config.container_attribute,
        encode_double_quoted_attribute(passage_id)
    );
    for segment in segments {
        match segment {
            Segment::Plain { text } => out.push_str(&encode_text(text)),
            Segment::Annotated {
                text,
                annotation_id,
                kind,
                note_text,
            } => out.push_str(&format_mark(text, annotation_id, kind.as_str(), note_text.as_deref(), config)),
        }
    }
    out.push_str("</div>");
    out
}

/// Format one annotated mark element
fn format_mark(
    text: &str,
    annotation_id: &str,
    kind: &str,
    note_text: Option<&str>,
    config: &HtmlConfig,
) -> String {
    let title = note_text
        .map(|note| format!(" title=\"{}\"", encode_double_quoted_attribute(note)))
        .unwrap_or_default();

    format!(
        "<mark class=\"{prefix} {prefix}-{kind}\" {id_attr}=\"{id}\" {kind_attr}=\"{kind}\"{title}>{text}</mark>",
        prefix = config.class_prefix,
        kind = kind,
        id_attr = config.id_attribute,
        id = encode_double_quoted_attribute(annotation_id),
        kind_attr = config.kind_attribute,
        title = title,
        text = encode_text(text),
    )
}

#[derive(Default)]
struct FragmentCollector {
    container_id: Option<String>,
    fragments: Vec<TextFragment>,
    raw: String,
    current_id: Option<String>,
}

impl FragmentCollector {
    fn flush(&mut self) {
        let annotation_id = self.current_id.take();
        if self.raw.is_empty() {
            return;
        }
        let text = decode_html_entities(&self.raw).into_owned();
        self.raw.clear();
        self.fragments.push(TextFragment {
            text,
            annotation_id,
        });
    }
}

/// Read rendered passage markup back into ordered text fragments.
///
/// Text outside marks becomes plain fragments; text inside a mark carries
/// the mark's annotation id. Entities are decoded.
pub fn fragments_from_html(html: &str, config: &HtmlConfig) -> Result<ParsedPassage, RenderError> {
    let collector = Rc::new(RefCell::new(FragmentCollector::default()));

    let mark_selector = format!("mark[{}]", config.id_attribute);
    let container_selector = format!("[{}]", config.container_attribute);
    let id_attribute = config.id_attribute.clone();
    let container_attribute = config.container_attribute.clone();

    let on_container = Rc::clone(&collector);
    let on_mark = Rc::clone(&collector);
    let on_text = Rc::clone(&collector);

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!(container_selector, move |el| {
                    let mut state = on_container.borrow_mut();
                    if state.container_id.is_none() {
                        state.container_id = el.get_attribute(&container_attribute);
                    }
                    Ok(())
                }),
                element!(mark_selector, move |el| {
                    {
                        let mut state = on_mark.borrow_mut();
                        state.flush();
                        state.current_id = el.get_attribute(&id_attribute);
                    }
                    let on_end = Rc::clone(&on_mark);
                    el.on_end_tag(end_tag!(move |_end| {
                        on_end.borrow_mut().flush();
                        Ok(())
                    }))
                }),
            ],
            document_content_handlers: vec![doc_text!(move |chunk| {
                on_text.borrow_mut().raw.push_str(chunk.as_str());
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| RenderError::RewriteError(e.to_string()))?;

    let mut state = collector.borrow_mut();
    state.flush();
    Ok(ParsedPassage {
        container_id: state.container_id.take(),
        fragments: std::mem::take(&mut state.fragments),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{Annotation, AnnotationSet, TextRange};
    use crate::passage::Passage;
    use crate::render::reconcile;

    fn rendered(text: &str, ranges: &[(usize, usize)]) -> (Passage, Vec<Segment>) {
        let passage = Passage::new("reading-1", text);
        let mut set = AnnotationSet::default();
        for &(start, end) in ranges {
            set = set
                .try_insert(
                    Annotation::new_highlight("reading-1", TextRange::new(start, end).unwrap()),
                    passage.char_len(),
                )
                .unwrap();
        }
        let segments = reconcile(&passage, &set);
        (passage, segments)
    }

    #[test]
    fn test_render_plain_passage() {
        let (_, segments) = rendered("Tides & currents", &[]);
        let html = render_html("reading-1", &segments, &HtmlConfig::default());

        assert_eq!(
            html,
            "<div class=\"ia-mark-passage\" data-passage-id=\"reading-1\">Tides &amp; currents</div>"
        );
    }

    #[test]
    fn test_render_marks_carry_id_and_kind() {
        let (_, segments) = rendered("Tides and currents", &[(0, 5)]);
        let id = segments[0].annotation_id().unwrap().to_string();
        let html = render_html("reading-1", &segments, &HtmlConfig::default());

        assert!(html.contains(&format!("data-annotation-id=\"{}\"", id)));
        assert!(html.contains("data-annotation-kind=\"highlight\""));
        assert!(html.contains("class=\"ia-mark ia-mark-highlight\""));
        assert!(html.contains(">Tides</mark>"));
    }

    #[test]
    fn test_note_title_escaped() {
        let segments = vec![Segment::Annotated {
            text: "tides".to_string(),
            annotation_id: "n1".to_string(),
            kind: crate::annotations::AnnotationKind::Note,
            note_text: Some("say \"ebb\" <here>".to_string()),
        }];
        let html = render_html("p", &segments, &HtmlConfig::default());

        assert!(html.contains("title=\"say &quot;ebb&quot; &lt;here&gt;\""));
    }

    #[test]
    fn test_fragments_round_trip_through_markup() {
        let text = "Rivers <carry> sediment & shape valleys.";
        let (passage, segments) = rendered(text, &[(0, 6), (17, 25)]);
        let html = render_html(passage.id(), &segments, &HtmlConfig::default());

        let parsed = fragments_from_html(&html, &HtmlConfig::default()).unwrap();

        assert_eq!(parsed.container_id.as_deref(), Some("reading-1"));
        let expected: Vec<TextFragment> = segments.iter().map(TextFragment::from).collect();
        assert_eq!(parsed.fragments, expected);
        let joined: String = parsed.fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_custom_class_prefix() {
        let (_, segments) = rendered("Reading passage", &[(0, 7)]);
        let html = render_html("reading-1", &segments, &HtmlConfig::with_class_prefix("ielts"));

        assert!(html.contains("class=\"ielts ielts-highlight\""));
        assert!(html.starts_with("<div class=\"ielts-passage\""));
    }
}
