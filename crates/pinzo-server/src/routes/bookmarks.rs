use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde_json::{json, Value};

use pinzo_proto::{RecordDraft, RecordId, RecordPatch};

use crate::auth::Identity;
use crate::error::{AppError, Result};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookmarks", get(list_bookmarks).post(create_bookmark))
        .route(
            "/api/bookmarks/:id",
            patch(update_bookmark).delete(delete_bookmark),
        )
}

pub(super) fn parse_id(id: &str) -> Result<RecordId> {
    Ok(id.parse::<RecordId>().map_err(pinzo_core::Error::from)?)
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

async fn list_bookmarks(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Value>> {
    let bookmarks = state.store.list_by_owner(&identity.owner_id).await?;

    Ok(Json(json!({
        "success": true,
        "count": bookmarks.len(),
        "bookmarks": bookmarks,
    })))
}

async fn create_bookmark(
    State(state): State<AppState>,
    identity: Identity,
    payload: std::result::Result<Json<RecordDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let draft = body(payload)?;
    let bookmark = state.store.insert(&identity.owner_id, draft).await?;

    tracing::debug!(id = %bookmark.id, owner = %identity.owner_id, "bookmark created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "bookmark": bookmark,
        })),
    ))
}

async fn update_bookmark(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    payload: std::result::Result<Json<RecordPatch>, JsonRejection>,
) -> Result<Json<Value>> {
    let id = parse_id(&id)?;
    let patch = body(payload)?;
    let bookmark = state
        .store
        .update_by_id(&identity.owner_id, id, patch)
        .await?;

    Ok(Json(json!({
        "success": true,
        "bookmark": bookmark,
    })))
}

async fn delete_bookmark(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_id(&id)?;
    let bookmark = state.store.delete_by_id(&identity.owner_id, id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Bookmark deleted",
        "id": bookmark.id,
    })))
}
