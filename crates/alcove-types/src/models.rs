use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::AccessMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub code: String,
    pub created_at: DateTime<Utc>,
    /// `None` means the room never expires on its own.
    pub expires_at: Option<DateTime<Utc>>,
    pub is_pinned: bool,
    pub access_mode: AccessMode,
}

impl Room {
    /// A room is live if it is pinned or its deadline has not passed.
    /// Expired-and-unpinned rooms are dead the instant the clock passes,
    /// even if the reaper has not collected them yet.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_pinned || self.expires_at.is_none_or(|t| t > now)
    }
}

/// Expiry windows selectable at room creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomTtl {
    OneHour,
    OneDay,
    OneWeek,
}

impl RoomTtl {
    pub fn from_hours(hours: u64) -> Option<Self> {
        match hours {
            1 => Some(RoomTtl::OneHour),
            24 => Some(RoomTtl::OneDay),
            168 => Some(RoomTtl::OneWeek),
            _ => None,
        }
    }

    pub fn as_duration(self) -> chrono::Duration {
        match self {
            RoomTtl::OneHour => chrono::Duration::hours(1),
            RoomTtl::OneDay => chrono::Duration::hours(24),
            RoomTtl::OneWeek => chrono::Duration::days(7),
        }
    }
}

/// Detected content class, derived from MIME/filename — never user-declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Code,
    Image,
    Pdf,
    FileBlob,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Code => "code",
            ContentKind::Image => "image",
            ContentKind::Pdf => "pdf",
            ContentKind::FileBlob => "file_blob",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(ContentKind::Text),
            "code" => Some(ContentKind::Code),
            "image" => Some(ContentKind::Image),
            "pdf" => Some(ContentKind::Pdf),
            "file_blob" => Some(ContentKind::FileBlob),
            _ => None,
        }
    }

    /// Whether payload bytes live in the blob store rather than inline.
    pub fn is_blob_backed(self) -> bool {
        matches!(self, ContentKind::Image | ContentKind::Pdf | ContentKind::FileBlob)
    }
}

/// Where an item's payload lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Payload {
    /// Small text/code bodies stored directly in the metadata row.
    Inline { body: String },
    /// Binary payloads stored in the blob store under `{room_code}/{uuid}`.
    Blob { key: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
    /// PDFs only.
    pub page_count: Option<u32>,
}

/// One visible unit of shared content, at a specific version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub room_code: String,
    pub kind: ContentKind,
    pub payload: Payload,
    pub metadata: ItemMetadata,
    pub created_at: DateTime<Utc>,
    pub version: i64,
    pub deleted: bool,
}
