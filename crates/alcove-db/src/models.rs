/// Database row types — these map directly to SQLite rows.
/// Distinct from the alcove-types API models to keep this layer independent.
/// Timestamps are RFC 3339 UTC with millisecond precision stored as TEXT;
/// the fixed format makes lexicographic order chronological order.

#[derive(Debug, Clone)]
pub struct RoomRow {
    pub code: String,
    pub created_at: String,
    pub expires_at: Option<String>,
    pub is_pinned: bool,
    pub access_mode: String,
}

/// An item joined with one of its versions (usually the latest).
#[derive(Debug, Clone)]
pub struct ItemRow {
    pub id: String,
    pub room_code: String,
    pub created_at: String,
    pub version: i64,
    pub deleted: bool,
    pub kind: String,
    pub inline_body: Option<String>,
    pub blob_key: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub page_count: Option<i64>,
    pub recorded_at: String,
}

/// Payload-bearing fields of a new version row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionFields {
    pub deleted: bool,
    pub kind: String,
    pub inline_body: Option<String>,
    pub blob_key: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub page_count: Option<i64>,
}

impl VersionFields {
    /// Carry an existing version's payload into a new version row.
    pub fn from_row(row: &ItemRow) -> Self {
        Self {
            deleted: row.deleted,
            kind: row.kind.clone(),
            inline_body: row.inline_body.clone(),
            blob_key: row.blob_key.clone(),
            filename: row.filename.clone(),
            mime_type: row.mime_type.clone(),
            size_bytes: row.size_bytes,
            page_count: row.page_count,
        }
    }
}
