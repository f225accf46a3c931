//! Background autosave task
//!
//! Runs one [`NoteAutosave`] per annotation being edited and fires their
//! saves on the tokio clock. Edits and explicit saves arrive over a channel.
//! Saves are awaited one at a time, so they reach the sink in order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};

use super::autosave::{AutosaveState, NoteAutosave, SaveRequest};
use crate::annotations::SharedAnnotations;

/// Destination for saved note bodies
#[async_trait]
pub trait NoteSink: Send + Sync + 'static {
    async fn save(&self, request: &SaveRequest);
}

#[async_trait]
impl NoteSink for SharedAnnotations {
    async fn save(&self, request: &SaveRequest) {
        let applied = self.update(|set| {
            set.update_note(&request.annotation_id, &request.text)
                .map(|next| (next, ()))
                .ok_or(())
        });
        if applied.is_err() {
            tracing::debug!(
                annotation_id = %request.annotation_id,
                "note save for missing annotation ignored"
            );
        }
    }
}

enum Command {
    Edit {
        annotation_id: String,
        text: String,
    },
    SaveNow {
        annotation_id: String,
        text: Option<String>,
        done: oneshot::Sender<()>,
    },
    Close {
        annotation_id: String,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Handle for sending note edits to the autosave task
#[derive(Clone)]
pub struct AutosaveHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl AutosaveHandle {
    /// Record an edit; the save fires after the quiet period
    pub fn edit(&self, annotation_id: &str, text: &str) -> bool {
        self.tx
            .send(Command::Edit {
                annotation_id: annotation_id.to_string(),
                text: text.to_string(),
            })
            .is_ok()
    }

    /// Save immediately and end the session.
    ///
    /// With `None` only an open draft is saved; a stored body is never
    /// replaced by an empty one.
    pub async fn save_now(&self, annotation_id: &str, text: Option<&str>) -> bool {
        let (done, wait) = oneshot::channel();
        let sent = self
            .tx
            .send(Command::SaveNow {
                annotation_id: annotation_id.to_string(),
                text: text.map(str::to_string),
                done,
            })
            .is_ok();
        sent && wait.await.is_ok()
    }

    /// End the session; a pending save still goes out
    pub fn close(&self, annotation_id: &str) -> bool {
        self.tx
            .send(Command::Close {
                annotation_id: annotation_id.to_string(),
            })
            .is_ok()
    }

    /// Flush every pending draft and stop the task
    pub async fn shutdown(&self) -> bool {
        let (done, wait) = oneshot::channel();
        self.tx.send(Command::Shutdown { done }).is_ok() && wait.await.is_ok()
    }
}

/// Start the autosave task on the current runtime
pub fn spawn_autosaver<S: NoteSink>(quiet_period: Duration, sink: Arc<S>) -> AutosaveHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(rx, quiet_period, sink));
    AutosaveHandle { tx }
}

async fn run<S: NoteSink>(
    mut rx: mpsc::UnboundedReceiver<Command>,
    quiet_period: Duration,
    sink: Arc<S>,
) {
    let mut sessions: HashMap<String, NoteAutosave> = HashMap::new();

    loop {
        let next_due = sessions.values().filter_map(NoteAutosave::due).min();

        let command = match next_due {
            Some(due) => {
                tokio::select! {
                    command = rx.recv() => command,
                    _ = tokio::time::sleep_until(due) => {
                        fire_due(&mut sessions, Instant::now(), sink.as_ref()).await;
                        continue;
                    }
                }
            }
            None => rx.recv().await,
        };

        match command {
            Some(Command::Edit {
                annotation_id,
                text,
            }) => {
                sessions
                    .entry(annotation_id.clone())
                    .or_insert_with(|| NoteAutosave::new(&annotation_id, "", quiet_period))
                    .edit(&text, Instant::now());
            }
            Some(Command::SaveNow {
                annotation_id,
                text,
                done,
            }) => {
                let request = match (sessions.remove(&annotation_id), text) {
                    (Some(mut session), Some(text)) => {
                        session.edit(&text, Instant::now());
                        Some(session.save_now())
                    }
                    (Some(mut session), None) => Some(session.save_now()),
                    (None, Some(text)) => {
                        let mut session = NoteAutosave::new(&annotation_id, "", quiet_period);
                        session.edit(&text, Instant::now());
                        Some(session.save_now())
                    }
                    (None, None) => None,
                };
                if let Some(request) = request {
                    sink.save(&request).await;
                }
                let _ = done.send(());
            }
            Some(Command::Close { annotation_id }) => {
                if let Some(request) = sessions.remove(&annotation_id).and_then(|mut s| s.close()) {
                    sink.save(&request).await;
                }
            }
            Some(Command::Shutdown { done }) => {
                flush_all(&mut sessions, sink.as_ref()).await;
                let _ = done.send(());
                tracing::debug!("autosave task stopped");
                break;
            }
            None => {
                flush_all(&mut sessions, sink.as_ref()).await;
                tracing::debug!("autosave task stopped");
                break;
            }
        }
    }
}

async fn fire_due<S: NoteSink>(sessions: &mut HashMap<String, NoteAutosave>, now: Instant, sink: &S) {
    let due: Vec<SaveRequest> = sessions.values_mut().filter_map(|s| s.poll(now)).collect();
    sessions.retain(|_, s| s.state() != AutosaveState::Saving);

    for request in due {
        tracing::debug!(annotation_id = %request.annotation_id, "autosaving note");
        sink.save(&request).await;
    }
}

async fn flush_all<S: NoteSink>(sessions: &mut HashMap<String, NoteAutosave>, sink: &S) {
    for (_, mut session) in sessions.drain() {
        if let Some(request) = session.close() {
            sink.save(&request).await;
        }
    }
}
