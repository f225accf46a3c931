//! Note persistence
//!
//! Debounced auto-save with an explicit flush path.

mod autosave;
mod driver;

pub use autosave::{AutosaveState, NoteAutosave, SaveRequest, DEFAULT_QUIET_PERIOD};
pub use driver::{spawn_autosaver, AutosaveHandle, NoteSink};
