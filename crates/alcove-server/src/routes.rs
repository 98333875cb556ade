use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use alcove_engine::Engine;
use alcove_engine::content::{NewItem, NewPayload};
use alcove_types::api::{
    CreateRoomRequest, CreateTextItemRequest, HistoryQuery, ItemResponse, RestoreRequest,
    RoomResponse, UpdateRoomRequest,
};
use alcove_types::{ContentKind, Error, RoomTtl};

use crate::classify::classify;

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// 4xx for requests the caller must change, 5xx for transient failures
/// worth retrying as-is.
fn error_status(err: &Error) -> StatusCode {
    match err {
        Error::RoomNotFound | Error::ItemNotFound => StatusCode::NOT_FOUND,
        Error::AccessDenied { .. } => StatusCode::FORBIDDEN,
        Error::RoomFull { .. } => StatusCode::CONFLICT,
        Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Error::AllocationFailure { .. } | Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn fail(context: &str) -> impl Fn(Error) -> StatusCode + '_ {
    move |err| {
        if err.is_retryable() {
            warn!("{}: {}", context, err);
        }
        error_status(&err)
    }
}

// ── Rooms ───────────────────────────────────────────────────────────────

/// POST /rooms — body optional; defaults apply.
pub async fn create_room(
    State(state): State<AppState>,
    body: Option<Json<CreateRoomRequest>>,
) -> Result<impl IntoResponse, StatusCode> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let ttl = match req.ttl_hours {
        Some(hours) => Some(RoomTtl::from_hours(hours).ok_or(StatusCode::BAD_REQUEST)?),
        None => None,
    };
    let room = state.engine.create_room(ttl).map_err(fail("create_room"))?;
    Ok((StatusCode::CREATED, Json(RoomResponse::from(room))))
}

/// GET /rooms/{code}
pub async fn get_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RoomResponse>, StatusCode> {
    let room = state.engine.room(&code).map_err(fail("get_room"))?;
    Ok(Json(RoomResponse::from(room)))
}

/// PATCH /rooms/{code} — access mode, expiry window, pin.
pub async fn update_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<UpdateRoomRequest>,
) -> Result<Json<RoomResponse>, StatusCode> {
    let fail = fail("update_room");

    if let Some(mode) = req.access_mode {
        state.engine.set_access_mode(&code, mode).map_err(&fail)?;
    }
    if let Some(hours) = req.ttl_hours {
        let ttl = RoomTtl::from_hours(hours).ok_or(StatusCode::BAD_REQUEST)?;
        state.engine.set_expiry(&code, ttl).map_err(&fail)?;
    }
    if req.pin == Some(true) {
        state.engine.pin_room(&code).map_err(&fail)?;
    }

    let room = state.engine.room(&code).map_err(&fail)?;
    Ok(Json(RoomResponse::from(room)))
}

/// DELETE /rooms/{code} — immediate, idempotent.
pub async fn delete_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode, StatusCode> {
    state
        .engine
        .delete_room(&code)
        .await
        .map_err(fail("delete_room"))?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Items ───────────────────────────────────────────────────────────────

/// GET /rooms/{code}/items — the visible timeline.
pub async fn list_items(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<ItemResponse>>, StatusCode> {
    let items = state.engine.list_visible(&code).map_err(fail("list_items"))?;
    Ok(Json(items.into_iter().map(ItemResponse::from).collect()))
}

/// POST /rooms/{code}/items — pasted text or code, stored inline.
pub async fn create_text_item(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<CreateTextItemRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let kind = match req.language.as_deref() {
        Some("plain") | None => ContentKind::Text,
        Some(_) => ContentKind::Code,
    };
    let item = state
        .engine
        .put_item(
            &code,
            NewItem {
                kind,
                payload: NewPayload::Inline(req.body),
                filename: None,
                mime_type: Some("text/plain".into()),
                page_count: None,
            },
        )
        .await
        .map_err(fail("create_text_item"))?;
    Ok((StatusCode::CREATED, Json(ItemResponse::from(item))))
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

/// POST /rooms/{code}/files — raw bytes, classified from Content-Type and
/// the filename query parameter, payload committed to blob storage before
/// any metadata exists.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<impl IntoResponse, StatusCode> {
    if bytes.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let kind = classify(mime_type.as_deref(), query.filename.as_deref());

    let item = state
        .engine
        .put_item(
            &code,
            NewItem {
                kind,
                payload: NewPayload::Bytes(bytes.to_vec()),
                filename: query.filename,
                mime_type,
                page_count: None,
            },
        )
        .await
        .map_err(fail("upload_file"))?;
    Ok((StatusCode::CREATED, Json(ItemResponse::from(item))))
}

/// GET /items/{id}
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, StatusCode> {
    let item = state.engine.get_item(&id).map_err(fail("get_item"))?;
    Ok(Json(ItemResponse::from(item)))
}

/// GET /items/{id}/data — payload bytes, inline or from blob storage.
pub async fn download_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let fail = fail("download_item");
    let item = state.engine.get_item(&id).map_err(&fail)?;
    let bytes = state.engine.read_payload(&item).await.map_err(&fail)?;

    let mut response_headers = HeaderMap::new();
    let mime = item
        .metadata
        .mime_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    if let Ok(value) = mime.parse() {
        response_headers.insert(header::CONTENT_TYPE, value);
    }
    Ok((response_headers, bytes))
}

/// DELETE /items/{id} — soft delete; history keeps the tombstone.
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    state.engine.soft_delete(&id).map_err(fail("delete_item"))?;
    Ok(StatusCode::NO_CONTENT)
}

// ── History ─────────────────────────────────────────────────────────────

/// GET /rooms/{code}/history?at=… — the timeline as it stood at `at`.
pub async fn room_history(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ItemResponse>>, StatusCode> {
    let items = state
        .engine
        .history_as_of(&code, query.at)
        .map_err(fail("room_history"))?;
    Ok(Json(items.into_iter().map(ItemResponse::from).collect()))
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub moved: usize,
}

/// POST /rooms/{code}/restore — append-only rollback to a past instant.
pub async fn restore_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<RestoreRequest>,
) -> Result<Json<RestoreResponse>, StatusCode> {
    let moved = state
        .engine
        .restore(&code, req.at)
        .map_err(fail("restore_room"))?;
    Ok(Json(RestoreResponse { moved }))
}

/// GET /health — liveness check.
pub async fn health() -> &'static str {
    "ok"
}
