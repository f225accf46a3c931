//! Annotation API routes
//!
//! Id-addressed operations: listing, clearing one mark and note bodies.
//! Draft edits go through the debounced autosaver; `PUT .../note` is the
//! explicit save-and-close.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::annotations::{cap_note_text, Annotation, AnnotationRepository, AnnotationStore};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the annotations router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_annotations))
        .route("/:id", delete(delete_annotation))
        .route("/:id/note", put(save_note))
        .route("/:id/note/draft", post(draft_note))
        .route("/:id/note/close", post(close_note))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub passage_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NoteBody {
    pub text: String,
}

fn existing(state: &AppState, id: &str) -> Result<Annotation> {
    state
        .annotations()
        .current()
        .get(id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Annotation not found: {}", id)))
}

/// List annotations, optionally for one passage
async fn list_annotations(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<Annotation>> {
    let current = state.annotations().current();
    let annotations = match query.passage_id.as_deref() {
        Some(passage_id) => current.for_passage(passage_id).cloned().collect(),
        None => current.iter().cloned().collect(),
    };
    Json(annotations)
}

/// Clear one annotation
async fn delete_annotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    existing(&state, &id)?;
    AnnotationRepository::new(state.db()).delete(&id).await?;
    state.annotations().update(|set| {
        set.remove(&id)
            .map(|next| (next, ()))
            .ok_or_else(|| AppError::NotFound(format!("Annotation not found: {}", id)))
    })?;
    tracing::info!(annotation_id = %id, "annotation cleared");

    Ok(StatusCode::NO_CONTENT)
}

/// Save a note body now, skipping the debounce
async fn save_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<NoteBody>,
) -> Result<Json<Annotation>> {
    existing(&state, &id)?;
    let text = cap_note_text(&body.text, state.config().annotations.note_max_chars);

    if !state.autosave().save_now(&id, Some(&text)).await {
        return Err(AppError::Internal("note autosave task is not running".to_string()));
    }
    Ok(Json(existing(&state, &id)?))
}

/// Record a draft edit; it is saved after the quiet period
async fn draft_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<NoteBody>,
) -> Result<StatusCode> {
    existing(&state, &id)?;
    let text = cap_note_text(&body.text, state.config().annotations.note_max_chars);

    if !state.autosave().edit(&id, &text) {
        return Err(AppError::Internal("note autosave task is not running".to_string()));
    }
    Ok(StatusCode::ACCEPTED)
}

/// Close the note editor; a pending draft is still saved
async fn close_note(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.autosave().close(&id);
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{json_body, send, test_app};
    use axum::http::Method;
    use serde_json::json;

    const TEXT: &str = "Bees pollinate roughly a third of the crops we eat.";

    async fn seeded() -> (Router, AppState, String) {
        let (app, state) = test_app().await;
        send(&app, Method::PUT, "/api/v1/passages/p1", Some(json!({ "text": TEXT }))).await;
        let resp = send(
            &app,
            Method::POST,
            "/api/v1/passages/p1/annotations",
            Some(json!({ "start": 0, "end": 4, "kind": "note" })),
        )
        .await;
        let id = json_body(resp).await["id"].as_str().unwrap().to_string();
        (app, state, id)
    }

    #[tokio::test]
    async fn test_save_note_is_immediate() {
        let (app, state, id) = seeded().await;

        let resp = send(
            &app,
            Method::PUT,
            &format!("/api/v1/annotations/{}/note", id),
            Some(json!({ "text": "insects, subject" })),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["noteText"], "insects, subject");
        assert_eq!(
            state.annotations().current().get(&id).unwrap().note(),
            Some("insects, subject")
        );
    }

    #[tokio::test]
    async fn test_draft_then_close_flushes() {
        let (app, state, id) = seeded().await;

        let resp = send(
            &app,
            Method::POST,
            &format!("/api/v1/annotations/{}/note/draft", id),
            Some(json!({ "text": "pollination" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(state.annotations().current().get(&id).unwrap().note(), None);

        let resp = send(&app, Method::POST, &format!("/api/v1/annotations/{}/note/close", id), None).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(state.annotations().current().get(&id).unwrap().note(), Some("pollination"));
    }

    #[tokio::test]
    async fn test_note_for_unknown_id_is_404() {
        let (app, _state, _id) = seeded().await;

        let resp = send(
            &app,
            Method::PUT,
            "/api/v1/annotations/missing/note",
            Some(json!({ "text": "x" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_one() {
        let (app, state, id) = seeded().await;

        let resp = send(&app, Method::DELETE, &format!("/api/v1/annotations/{}", id), None).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(state.annotations().current().is_empty());

        let again = send(&app, Method::DELETE, &format!("/api/v1/annotations/{}", id), None).await;
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_filters_by_passage() {
        let (app, _state, id) = seeded().await;

        let all = json_body(send(&app, Method::GET, "/api/v1/annotations", None).await).await;
        assert_eq!(all.as_array().unwrap().len(), 1);
        assert_eq!(all[0]["id"], id.as_str());

        let other = json_body(send(&app, Method::GET, "/api/v1/annotations?passageId=p9", None).await).await;
        assert_eq!(other, json!([]));
    }
}
