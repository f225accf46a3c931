//! Passage interaction session
//!
//! Ties one rendered passage instance to the shared annotation store and
//! tracks which surface is open. Only one menu or note editor is open at a
//! time; every finished interaction returns to `Idle`.

use tokio::time::{Duration, Instant};

use crate::annotations::{Annotation, AnnotationStore};
use crate::notes::{NoteAutosave, SaveRequest};
use crate::passage::Passage;
use crate::render::{render_html, HtmlConfig, RenderedPassage, Segment, TextFragment};
use crate::selection::{
    AnnotationAction, AnnotationMenu, DomSelection, PendingAnnotation, ScreenPoint,
    SelectionAction, SelectionError, SelectionResolver,
};

/// Which surface of the passage is active
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionState {
    Idle,
    /// The reader is dragging a selection
    Selecting,
    /// Highlight/Note menu for a validated selection
    MenuOpen(PendingAnnotation),
    /// Menu for an existing annotation
    AnnotationMenuOpen(AnnotationMenu),
    /// Note editor bound to an annotation
    NoteEditing { annotation_id: String },
}

/// Where a scroll-to request landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollTarget {
    pub annotation_id: String,
    pub segment_index: usize,
}

type ScrollAck = Box<dyn FnOnce(&ScrollTarget) + Send>;

/// Interaction state for one passage instance
pub struct PassageSession<S: AnnotationStore> {
    passage: Passage,
    store: S,
    rendered: RenderedPassage,
    state: InteractionState,
    editor: Option<NoteAutosave>,
    quiet_period: Duration,
    notice: Option<String>,
    clear_live_selection: bool,
    scroll_request: Option<(String, ScrollAck)>,
}

impl<S: AnnotationStore> PassageSession<S> {
    pub fn new(passage: Passage, store: S, quiet_period: Duration) -> Self {
        let rendered = RenderedPassage::new(&passage, &store.current());
        Self {
            passage,
            store,
            rendered,
            state: InteractionState::Idle,
            editor: None,
            quiet_period,
            notice: None,
            clear_live_selection: false,
            scroll_request: None,
        }
    }

    pub fn passage(&self) -> &Passage {
        &self.passage
    }

    pub fn passage_id(&self) -> &str {
        self.passage.id()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Transient notice for the reader, cleared on read
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Whether the UI should drop the live text selection, cleared on read
    pub fn take_clear_selection(&mut self) -> bool {
        std::mem::take(&mut self.clear_live_selection)
    }

    /// The open note editor, if any
    pub fn editor(&self) -> Option<&NoteAutosave> {
        self.editor.as_ref()
    }

    /// Re-derive the rendering if this passage's annotations changed
    pub fn refresh(&mut self) -> bool {
        let changed = self.rendered.refresh(&self.passage, &self.store.current());
        self.try_scroll();
        changed
    }

    pub fn segments(&mut self) -> &[Segment] {
        self.refresh();
        self.rendered.segments()
    }

    pub fn rendered(&self) -> &RenderedPassage {
        &self.rendered
    }

    /// Text fragments as laid out in the rendered container
    pub fn fragments(&self) -> Vec<TextFragment> {
        self.rendered.segments().iter().map(TextFragment::from).collect()
    }

    pub fn html(&mut self, config: &HtmlConfig) -> String {
        self.refresh();
        render_html(self.passage.id(), self.rendered.segments(), config)
    }

    /// The reader started dragging
    pub fn begin_selection(&mut self) {
        self.close_surfaces();
        self.state = InteractionState::Selecting;
    }

    /// Resolve the finished selection and open the action menu
    pub fn select(
        &mut self,
        selection: &DomSelection,
        position: ScreenPoint,
    ) -> Result<PendingAnnotation, SelectionError> {
        self.close_surfaces();
        self.refresh();

        let fragments = self.fragments();
        let resolver = SelectionResolver::new(&self.passage, &fragments);
        match resolver.resolve_and_validate(selection, &self.store.current()) {
            Ok(range) => {
                let text = self.passage.slice_range(range);
                let pending = PendingAnnotation::new(self.passage.id(), range, text, position);
                self.state = InteractionState::MenuOpen(pending.clone());
                Ok(pending)
            }
            Err(err) => {
                self.reject(&err);
                Err(err)
            }
        }
    }

    /// Pick Highlight or Note from the open selection menu.
    ///
    /// Returns the new annotation id.
    pub fn confirm(&mut self, action: SelectionAction) -> Option<String> {
        let pending = match std::mem::replace(&mut self.state, InteractionState::Idle) {
            InteractionState::MenuOpen(pending) => pending,
            other => {
                self.state = other;
                return None;
            }
        };

        let annotation = match action {
            SelectionAction::Highlight => Annotation::new_highlight(self.passage.id(), pending.range),
            SelectionAction::Note => Annotation::new_note(self.passage.id(), pending.range),
        };
        let id = annotation.id.clone();

        // The collection may have moved on since the menu opened
        match self.store.current().try_insert(annotation, self.passage.char_len()) {
            Ok(next) => self.store.replace(next),
            Err(err) => {
                self.reject(&err.into());
                return None;
            }
        }
        tracing::info!(passage_id = %self.passage.id(), annotation_id = %id, ?action, "annotation created");

        match action {
            SelectionAction::Highlight => {
                self.clear_live_selection = true;
            }
            SelectionAction::Note => {
                self.editor = Some(NoteAutosave::new(&id, "", self.quiet_period));
                self.state = InteractionState::NoteEditing {
                    annotation_id: id.clone(),
                };
            }
        }
        self.refresh();
        Some(id)
    }

    /// Close whatever is open and return to idle
    pub fn cancel(&mut self) {
        self.close_surfaces();
    }

    /// Right-click on the rendered segment at `segment_index`
    pub fn open_annotation_menu(
        &mut self,
        segment_index: usize,
        position: ScreenPoint,
    ) -> Option<AnnotationMenu> {
        self.close_surfaces();
        self.refresh();

        let menu = AnnotationMenu::for_annotation(self.rendered.annotation_at(segment_index)?, position);
        self.state = InteractionState::AnnotationMenuOpen(menu.clone());
        Some(menu)
    }

    /// Pick an entry from the open annotation menu
    pub fn choose(&mut self, action: AnnotationAction) -> bool {
        let menu = match std::mem::replace(&mut self.state, InteractionState::Idle) {
            InteractionState::AnnotationMenuOpen(menu) => menu,
            other => {
                self.state = other;
                return false;
            }
        };
        if !menu.offers(action) {
            return false;
        }

        match action {
            AnnotationAction::EditNote => self.open_note(&menu.annotation_id),
            AnnotationAction::Clear => self.clear(&menu.annotation_id),
            AnnotationAction::ClearAll => self.clear_all() > 0,
        }
    }

    /// Open the note editor for an existing note
    pub fn open_note(&mut self, annotation_id: &str) -> bool {
        self.close_surfaces();
        let current = self.store.current();
        let Some(annotation) = current
            .get(annotation_id)
            .filter(|a| a.passage_id == self.passage.id() && a.is_note())
        else {
            return false;
        };

        let text = annotation.note_text.as_deref().unwrap_or_default();
        self.editor = Some(NoteAutosave::new(annotation_id, text, self.quiet_period));
        self.state = InteractionState::NoteEditing {
            annotation_id: annotation_id.to_string(),
        };
        true
    }

    /// Remove one annotation of this passage; unknown ids are ignored
    pub fn clear(&mut self, annotation_id: &str) -> bool {
        let current = self.store.current();
        let belongs = current
            .get(annotation_id)
            .is_some_and(|a| a.passage_id == self.passage.id());
        if !belongs {
            return false;
        }
        let Some(next) = current.remove(annotation_id) else {
            return false;
        };
        if matches!(&self.state, InteractionState::NoteEditing { annotation_id: editing } if editing == annotation_id)
        {
            self.editor = None;
            self.state = InteractionState::Idle;
        }
        self.store.replace(next);
        self.refresh();
        tracing::info!(passage_id = %self.passage.id(), %annotation_id, "annotation cleared");
        true
    }

    /// Remove every annotation of this passage, leaving other passages alone
    pub fn clear_all(&mut self) -> usize {
        self.editor = None;
        self.state = InteractionState::Idle;
        let (next, removed) = self.store.current().clear_passage(self.passage.id());
        if removed > 0 {
            self.store.replace(next);
            self.refresh();
        }
        tracing::info!(passage_id = %self.passage.id(), removed, "annotations cleared");
        removed
    }

    /// Record typing in the note editor
    pub fn edit_note(&mut self, text: &str, now: Instant) -> bool {
        match self.editor.as_mut() {
            Some(editor) => {
                editor.edit(text, now);
                true
            }
            None => false,
        }
    }

    /// Fire the debounced save if its quiet period has passed
    pub fn tick(&mut self, now: Instant) -> Option<SaveRequest> {
        let request = self.editor.as_mut()?.poll(now)?;
        self.apply_save(&request);
        if let Some(editor) = self.editor.as_mut() {
            editor.complete();
        }
        Some(request)
    }

    /// Explicit save-and-close: saves synchronously, ignoring the debounce
    pub fn save_and_close_note(&mut self) -> Option<SaveRequest> {
        let mut editor = self.editor.take()?;
        let request = editor.save_now();
        self.apply_save(&request);
        self.state = InteractionState::Idle;
        Some(request)
    }

    /// Close the note editor; a pending save still goes out
    pub fn close_note(&mut self) -> Option<SaveRequest> {
        let request = self.editor.take()?.close();
        if let Some(request) = &request {
            self.apply_save(request);
        }
        if matches!(self.state, InteractionState::NoteEditing { .. }) {
            self.state = InteractionState::Idle;
        }
        request
    }

    /// Ask for `annotation_id` to be scrolled into view.
    ///
    /// `ack` runs once the annotation is present in the rendering, which may
    /// be immediately.
    pub fn request_scroll(&mut self, annotation_id: &str, ack: impl FnOnce(&ScrollTarget) + Send + 'static) {
        self.scroll_request = Some((annotation_id.to_string(), Box::new(ack)));
        self.try_scroll();
    }

    pub fn has_pending_scroll(&self) -> bool {
        self.scroll_request.is_some()
    }

    fn try_scroll(&mut self) {
        let Some(segment_index) = self
            .scroll_request
            .as_ref()
            .and_then(|(id, _)| self.rendered.segment_for(id))
        else {
            return;
        };
        if let Some((annotation_id, ack)) = self.scroll_request.take() {
            ack(&ScrollTarget {
                annotation_id,
                segment_index,
            });
        }
    }

    fn apply_save(&mut self, request: &SaveRequest) {
        match self.store.current().update_note(&request.annotation_id, &request.text) {
            Some(next) => {
                self.store.replace(next);
                self.refresh();
                tracing::debug!(annotation_id = %request.annotation_id, "note saved");
            }
            None => tracing::debug!(annotation_id = %request.annotation_id, "note save for missing annotation ignored"),
        }
    }

    fn reject(&mut self, err: &SelectionError) {
        self.state = InteractionState::Idle;
        if let Some(notice) = err.notice() {
            tracing::warn!(passage_id = %self.passage.id(), error = %err, "selection rejected");
            self.notice = Some(notice.to_string());
        }
    }

    fn close_surfaces(&mut self) {
        if self.editor.is_some() {
            self.close_note();
        }
        self.state = InteractionState::Idle;
    }
}
