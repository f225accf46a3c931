//! Passage API routes
//!
//! Registration, rendering, selection resolution and passage-scoped
//! annotation writes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::annotations::{
    cap_note_text, Annotation, AnnotationKind, AnnotationRepository, AnnotationStore, TextRange,
};
use crate::error::{AppError, Result};
use crate::passage::Passage;
use crate::render::{reconcile, render_html, Segment, TextFragment};
use crate::selection::{
    DomPoint, DomSelection, PendingAnnotation, ScreenPoint, SelectionError, SelectionResolver,
};
use crate::state::{AppState, Registration};

/// Create the passages router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:passage_id", put(put_passage))
        .route("/:passage_id/render", get(render_passage))
        .route("/:passage_id/selection", post(resolve_selection))
        .route(
            "/:passage_id/annotations",
            post(create_annotation).delete(clear_passage),
        )
}

#[derive(Debug, Deserialize)]
pub struct PassageBody {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageInfo {
    pub passage_id: String,
    pub char_len: usize,
    pub annotations: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    pub passage_id: String,
    pub segments: Vec<Segment>,
    pub html: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub anchor: DomPoint,
    pub focus: DomPoint,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnotationRequest {
    pub start: usize,
    pub end: usize,
    pub kind: AnnotationKind,
    pub note_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

fn lookup(state: &AppState, passage_id: &str) -> Result<Passage> {
    state
        .passage(passage_id)
        .ok_or_else(|| AppError::NotFound(format!("Passage not found: {}", passage_id)))
}

/// Register passage text; annotated passages keep their original text
async fn put_passage(
    State(state): State<AppState>,
    Path(passage_id): Path<String>,
    Json(body): Json<PassageBody>,
) -> Result<(StatusCode, Json<PassageInfo>)> {
    let passage = Passage::new(&passage_id, body.text);
    let info = PassageInfo {
        passage_id: passage_id.clone(),
        char_len: passage.char_len(),
        annotations: state.annotations().current().for_passage(&passage_id).count(),
    };
    let outcome = state.register_passage(passage)?;
    tracing::info!(%passage_id, char_len = info.char_len, ?outcome, "passage registered");

    let status = match outcome {
        Registration::Created => StatusCode::CREATED,
        Registration::Unchanged | Registration::Replaced => StatusCode::OK,
    };
    Ok((status, Json(info)))
}

/// Reconcile the passage against the current collection
async fn render_passage(
    State(state): State<AppState>,
    Path(passage_id): Path<String>,
) -> Result<Json<RenderResponse>> {
    let passage = lookup(&state, &passage_id)?;
    let segments = reconcile(&passage, &state.annotations().current());
    let html = render_html(&passage_id, &segments, state.html_config());

    Ok(Json(RenderResponse {
        passage_id,
        segments,
        html,
    }))
}

/// Resolve a finished selection into a pending annotation.
///
/// Empty or foreign selections are a silent no-op (204).
async fn resolve_selection(
    State(state): State<AppState>,
    Path(passage_id): Path<String>,
    Json(request): Json<SelectionRequest>,
) -> Result<Response> {
    let passage = lookup(&state, &passage_id)?;
    let current = state.annotations().current();
    let fragments: Vec<TextFragment> = reconcile(&passage, &current).iter().map(TextFragment::from).collect();

    let resolver = SelectionResolver::new(&passage, &fragments);
    let selection = DomSelection::new(request.anchor, request.focus);
    match resolver.resolve_and_validate(&selection, &current) {
        Ok(range) => {
            let pending = PendingAnnotation::new(
                &passage_id,
                range,
                passage.slice_range(range),
                ScreenPoint::new(request.x, request.y),
            );
            Ok(Json(pending).into_response())
        }
        Err(SelectionError::NoSelection | SelectionError::OutsideContainer) => {
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Err(err) => {
            tracing::warn!(%passage_id, error = %err, "selection rejected");
            Err(err.into())
        }
    }
}

/// Create a highlight or note for the passage
async fn create_annotation(
    State(state): State<AppState>,
    Path(passage_id): Path<String>,
    Json(request): Json<CreateAnnotationRequest>,
) -> Result<(StatusCode, Json<Annotation>)> {
    let passage = lookup(&state, &passage_id)?;
    let range = TextRange::from_selection(request.start, request.end)
        .ok_or_else(|| AppError::BadRequest("Annotation range is empty".to_string()))?;

    let mut annotation = match request.kind {
        AnnotationKind::Highlight => Annotation::new_highlight(&passage_id, range),
        AnnotationKind::Note => Annotation::new_note(&passage_id, range),
    };
    if let Some(text) = request.note_text.as_deref() {
        annotation = annotation.with_note_text(&cap_note_text(text, state.config().annotations.note_max_chars));
    }

    state
        .annotations()
        .current()
        .check_insert(&passage_id, &annotation.range(), passage.char_len())?;

    // Stored first, so a failed write leaves the collection untouched
    let repo = AnnotationRepository::new(state.db());
    repo.save(&annotation).await?;
    let inserted = state.annotations().update(|set| {
        set.try_insert(annotation.clone(), passage.char_len())
            .map(|next| (next, ()))
    });
    if let Err(err) = inserted {
        if let Err(e) = repo.delete(&annotation.id).await {
            tracing::warn!(annotation_id = %annotation.id, "failed to roll back annotation: {:#}", e);
        }
        return Err(err.into());
    }
    tracing::info!(%passage_id, annotation_id = %annotation.id, kind = annotation.kind.as_str(), "annotation created");

    Ok((StatusCode::CREATED, Json(annotation)))
}

/// Remove every annotation of the passage
async fn clear_passage(
    State(state): State<AppState>,
    Path(passage_id): Path<String>,
) -> Result<Json<ClearResponse>> {
    AnnotationRepository::new(state.db())
        .delete_for_passage(&passage_id)
        .await?;
    let removed = state
        .annotations()
        .update::<_, AppError>(|set| Ok(set.clear_passage(&passage_id)))?;
    tracing::info!(%passage_id, removed, "passage annotations cleared");

    Ok(Json(ClearResponse { removed }))
}
