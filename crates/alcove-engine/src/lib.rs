//! Room lifecycle and content-storage consistency engine.
//!
//! Everything stateful lives in the database and the blob store; the engine
//! itself holds no authoritative in-memory room state, so every operation
//! re-reads expiry and access mode from the durable row it is gating.

pub mod content;
pub mod reaper;
pub mod reconcile;
pub mod rooms;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};

use alcove_blob::BlobStore;
use alcove_db::Database;
use alcove_db::models::{ItemRow, RoomRow};
use alcove_types::{
    AccessMode, ContentItem, ContentKind, Error, ItemMetadata, OperationKind, Payload, Result,
    Room, RoomTtl,
};

/// Operational ceilings and defaults, fixed at startup.
#[derive(Debug, Clone)]
pub struct Limits {
    pub room_item_limit: usize,
    pub max_payload_bytes: u64,
    pub default_ttl: RoomTtl,
    pub reap_batch_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            room_item_limit: 200,
            max_payload_bytes: 50 * 1024 * 1024,
            default_ttl: RoomTtl::OneDay,
            reap_batch_size: 100,
        }
    }
}

pub struct Engine {
    db: Arc<Database>,
    blobs: Arc<dyn BlobStore>,
    limits: Limits,
    /// Orphaned blob keys sighted by the previous reconciliation pass.
    orphan_candidates: Mutex<HashSet<String>>,
}

impl Engine {
    pub fn new(db: Arc<Database>, blobs: Arc<dyn BlobStore>, limits: Limits) -> Self {
        Self {
            db,
            blobs,
            limits,
            orphan_candidates: Mutex::new(HashSet::new()),
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Fetch a room and require it to be live right now. Malformed codes,
    /// unknown codes and expired-unpinned rooms are all the same
    /// `RoomNotFound` to the caller.
    fn live_room(&self, code: &str) -> Result<Room> {
        if !alcove_code::is_well_formed(code) {
            return Err(Error::RoomNotFound);
        }
        let row = self.db.get_room(code)?.ok_or(Error::RoomNotFound)?;
        let room = room_from_row(&row)?;
        if !room.is_live(Utc::now()) {
            return Err(Error::RoomNotFound);
        }
        Ok(room)
    }

    fn check_mode(&self, room: &Room, op: OperationKind) -> Result<()> {
        if room.access_mode.permits(op) {
            Ok(())
        } else {
            Err(Error::AccessDenied {
                mode: room.access_mode,
                op,
            })
        }
    }
}

/// Canonical timestamp format: RFC 3339 UTC, millisecond precision. Fixed
/// width, so TEXT comparison in SQLite is chronological comparison.
pub(crate) fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    let t = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Bad timestamp in store: {s}"))?;
    Ok(t.with_timezone(&Utc))
}

pub(crate) fn room_from_row(row: &RoomRow) -> Result<Room> {
    let access_mode = AccessMode::parse(&row.access_mode)
        .ok_or_else(|| anyhow::anyhow!("Bad access mode in store: {}", row.access_mode))?;
    Ok(Room {
        code: row.code.clone(),
        created_at: parse_ts(&row.created_at)?,
        expires_at: row.expires_at.as_deref().map(parse_ts).transpose()?,
        is_pinned: row.is_pinned,
        access_mode,
    })
}

pub(crate) fn item_from_row(row: &ItemRow) -> Result<ContentItem> {
    let kind = ContentKind::parse(&row.kind)
        .ok_or_else(|| anyhow::anyhow!("Bad content kind in store: {}", row.kind))?;
    let payload = match &row.blob_key {
        Some(key) => Payload::Blob { key: key.clone() },
        None => Payload::Inline {
            body: row.inline_body.clone().unwrap_or_default(),
        },
    };
    Ok(ContentItem {
        id: row
            .id
            .parse()
            .with_context(|| format!("Bad item id in store: {}", row.id))?,
        room_code: row.room_code.clone(),
        kind,
        payload,
        metadata: ItemMetadata {
            filename: row.filename.clone(),
            mime_type: row.mime_type.clone(),
            size_bytes: row.size_bytes as u64,
            page_count: row.page_count.map(|n| n as u32),
        },
        created_at: parse_ts(&row.created_at)?,
        version: row.version,
        deleted: row.deleted,
    })
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use alcove_blob::MemoryBlobStore;

    pub fn engine(dir: &tempfile::TempDir) -> Engine {
        engine_with_limits(dir, Limits::default())
    }

    pub fn engine_with_limits(dir: &tempfile::TempDir, limits: Limits) -> Engine {
        let db = Arc::new(Database::open(&dir.path().join("alcove.db")).unwrap());
        Engine::new(db, Arc::new(MemoryBlobStore::new()), limits)
    }
}
