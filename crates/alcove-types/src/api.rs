//! Wire DTOs for the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::AccessMode;
use crate::models::{ContentItem, ContentKind, Room};

#[derive(Debug, Default, Deserialize)]
pub struct CreateRoomRequest {
    /// One of 1, 24 or 168. Omitted means the server default.
    pub ttl_hours: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_pinned: bool,
    pub access_mode: AccessMode,
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        Self {
            code: room.code,
            created_at: room.created_at,
            expires_at: room.expires_at,
            is_pinned: room.is_pinned,
            access_mode: room.access_mode,
        }
    }
}

/// PATCH /rooms/{code} — exactly one field per request in practice, but
/// accepting several at once is harmless.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoomRequest {
    pub access_mode: Option<AccessMode>,
    pub ttl_hours: Option<u64>,
    pub pin: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTextItemRequest {
    pub body: String,
    /// Hint only; the server classifies `text` vs `code` from it.
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub room_code: String,
    pub kind: ContentKind,
    pub inline_body: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
    pub page_count: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

impl From<ContentItem> for ItemResponse {
    fn from(item: ContentItem) -> Self {
        let inline_body = match &item.payload {
            crate::models::Payload::Inline { body } => Some(body.clone()),
            crate::models::Payload::Blob { .. } => None,
        };
        Self {
            id: item.id,
            room_code: item.room_code,
            kind: item.kind,
            inline_body,
            filename: item.metadata.filename,
            mime_type: item.metadata.mime_type,
            size_bytes: item.metadata.size_bytes,
            page_count: item.metadata.page_count,
            created_at: item.created_at,
            version: item.version,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// RFC 3339 instant to reconstruct the timeline at.
    pub at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    pub at: DateTime<Utc>,
}
