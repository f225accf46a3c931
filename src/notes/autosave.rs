//! Debounced note saving
//!
//! One editing session holds at most one pending save. Every edit pushes the
//! deadline out by the quiet period; an explicit save-and-close skips the
//! wait. Time is passed in rather than read, so the machine is deterministic.

use tokio::time::{Duration, Instant};

use crate::annotations::{cap_note_text, NOTE_MAX_CHARS};

/// Default quiet period before an edit is saved
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(2);

/// Where the editing session is in its save cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveState {
    /// Nothing waiting to be saved
    Idle,
    /// A save fires at `due` unless superseded
    Pending { due: Instant },
    /// A save was handed out and has not been acknowledged
    Saving,
}

/// A note body ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub annotation_id: String,
    pub text: String,
}

/// Save scheduler for one note-editing session
#[derive(Debug, Clone)]
pub struct NoteAutosave {
    annotation_id: String,
    draft: String,
    quiet_period: Duration,
    state: AutosaveState,
}

impl NoteAutosave {
    pub fn new(annotation_id: &str, initial_text: &str, quiet_period: Duration) -> Self {
        Self {
            annotation_id: annotation_id.to_string(),
            draft: initial_text.to_string(),
            quiet_period,
            state: AutosaveState::Idle,
        }
    }

    pub fn annotation_id(&self) -> &str {
        &self.annotation_id
    }

    /// Latest text typed into the editor
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn state(&self) -> AutosaveState {
        self.state
    }

    /// When the pending save fires, if one is scheduled
    pub fn due(&self) -> Option<Instant> {
        match self.state {
            AutosaveState::Pending { due } => Some(due),
            _ => None,
        }
    }

    /// Record an edit and restart the quiet period
    pub fn edit(&mut self, text: &str, now: Instant) {
        self.draft = cap_note_text(text, NOTE_MAX_CHARS);
        self.state = AutosaveState::Pending {
            due: now + self.quiet_period,
        };
    }

    /// Hand out the pending save once its deadline has passed
    pub fn poll(&mut self, now: Instant) -> Option<SaveRequest> {
        match self.state {
            AutosaveState::Pending { due } if now >= due => {
                self.state = AutosaveState::Saving;
                Some(self.request())
            }
            _ => None,
        }
    }

    /// Acknowledge a save handed out by `poll` or `save_now`
    pub fn complete(&mut self) {
        if self.state == AutosaveState::Saving {
            self.state = AutosaveState::Idle;
        }
    }

    /// Explicit save-and-close: cancel any timer and save the draft now
    pub fn save_now(&mut self) -> SaveRequest {
        self.state = AutosaveState::Saving;
        self.request()
    }

    /// Close without an explicit save; a pending save still goes out
    pub fn close(&mut self) -> Option<SaveRequest> {
        match self.state {
            AutosaveState::Pending { .. } => Some(self.save_now()),
            _ => None,
        }
    }

    fn request(&self) -> SaveRequest {
        SaveRequest {
            annotation_id: self.annotation_id.clone(),
            text: self.draft.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_rapid_edits_coalesce_into_one_save() {
        let start = Instant::now();
        let mut autosave = NoteAutosave::new("n1", "", DEFAULT_QUIET_PERIOD);
        let mut saves = Vec::new();

        for (at, text) in [(0, "cl"), (400, "clim"), (900, "climate")] {
            let now = start + ms(at);
            autosave.edit(text, now);
            saves.extend(autosave.poll(now));
        }
        // Two seconds after the first edit the timer has been pushed back
        saves.extend(autosave.poll(start + ms(2000)));
        assert!(saves.is_empty());

        saves.extend(autosave.poll(start + ms(2900)));
        autosave.complete();
        saves.extend(autosave.poll(start + ms(10_000)));

        assert_eq!(
            saves,
            vec![SaveRequest {
                annotation_id: "n1".to_string(),
                text: "climate".to_string()
            }]
        );
        assert_eq!(autosave.state(), AutosaveState::Idle);
    }

    #[test]
    fn test_save_now_skips_debounce() {
        let start = Instant::now();
        let mut autosave = NoteAutosave::new("n1", "", DEFAULT_QUIET_PERIOD);

        autosave.edit("drought", start);
        let saved = autosave.save_now();
        autosave.complete();

        assert_eq!(saved.text, "drought");
        assert!(autosave.due().is_none());
        assert!(autosave.poll(start + ms(5000)).is_none());
    }

    #[test]
    fn test_close_saves_only_when_pending() {
        let start = Instant::now();
        let mut untouched = NoteAutosave::new("n1", "old", DEFAULT_QUIET_PERIOD);
        assert!(untouched.close().is_none());

        let mut edited = NoteAutosave::new("n2", "old", DEFAULT_QUIET_PERIOD);
        edited.edit("new", start);
        assert_eq!(edited.close().map(|r| r.text), Some("new".to_string()));
    }

    #[test]
    fn test_edit_during_save_reschedules() {
        let start = Instant::now();
        let mut autosave = NoteAutosave::new("n1", "", ms(100));

        autosave.edit("a", start);
        assert!(autosave.poll(start + ms(100)).is_some());
        autosave.edit("ab", start + ms(150));
        // The acknowledgement of the first save must not drop the new edit
        autosave.complete();

        assert_eq!(autosave.due(), Some(start + ms(250)));
        assert_eq!(autosave.poll(start + ms(250)).map(|r| r.text), Some("ab".to_string()));
    }

    #[test]
    fn test_draft_capped() {
        let mut autosave = NoteAutosave::new("n1", "", DEFAULT_QUIET_PERIOD);
        autosave.edit(&"x".repeat(NOTE_MAX_CHARS * 2), Instant::now());
        assert_eq!(autosave.draft().len(), NOTE_MAX_CHARS);
    }
}
