//! Content store: append-only item history inside a room.
//!
//! Commit ordering for blob-backed items: bytes go to the blob store first,
//! the metadata row second. A blob write failure aborts before any metadata
//! exists; a metadata failure after a successful blob write leaves an
//! orphaned blob for reconciliation to collect. Metadata never references a
//! blob that was not written.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use alcove_blob::BlobStore;
use alcove_db::models::VersionFields;
use alcove_types::{ContentItem, ContentKind, Error, OperationKind, Payload, Result};

use crate::{Engine, item_from_row, ts};

/// Input to `put_item`. The kind comes from the caller's content-type
/// classifier, not from anything the uploader declared.
#[derive(Debug)]
pub struct NewItem {
    pub kind: ContentKind,
    pub payload: NewPayload,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub page_count: Option<u32>,
}

#[derive(Debug)]
pub enum NewPayload {
    Inline(String),
    Bytes(Vec<u8>),
}

impl NewPayload {
    fn size(&self) -> u64 {
        match self {
            NewPayload::Inline(s) => s.len() as u64,
            NewPayload::Bytes(b) => b.len() as u64,
        }
    }
}

impl Engine {
    pub async fn put_item(&self, code: &str, new: NewItem) -> Result<ContentItem> {
        let room = self.live_room(code)?;
        self.check_mode(&room, OperationKind::Write)?;

        // Early rejection before any payload bytes are written; the insert
        // re-checks the count on the writer, which is authoritative.
        if self.db.visible_count(code)? >= self.limits.room_item_limit {
            return Err(Error::RoomFull {
                limit: self.limits.room_item_limit,
            });
        }
        let size = new.payload.size();
        if size > self.limits.max_payload_bytes {
            return Err(Error::PayloadTooLarge {
                limit: self.limits.max_payload_bytes,
            });
        }

        let id = Uuid::new_v4();
        let now = ts(Utc::now());

        let mut fields = VersionFields {
            kind: new.kind.as_str().to_string(),
            filename: new.filename,
            mime_type: new.mime_type,
            size_bytes: size as i64,
            page_count: new.page_count.map(i64::from),
            ..Default::default()
        };
        match new.payload {
            NewPayload::Inline(body) => fields.inline_body = Some(body),
            NewPayload::Bytes(bytes) => {
                let key = format!("{code}/{id}");
                let mime = fields
                    .mime_type
                    .as_deref()
                    .unwrap_or("application/octet-stream");
                self.blobs.put(&key, &bytes, mime).await?;
                fields.blob_key = Some(key);
            }
        }

        let inserted = self.db.insert_item(
            &id.to_string(),
            code,
            &now,
            &fields,
            self.limits.room_item_limit,
        )?;
        if !inserted {
            // Lost the race for the last slot after the early check. Remove
            // the blob we just wrote rather than leaving it for
            // reconciliation.
            if let Some(key) = &fields.blob_key {
                if let Err(e) = self.blobs.delete(key).await {
                    warn!("Failed to remove blob {} after refused insert: {}", key, e);
                }
            }
            return Err(Error::RoomFull {
                limit: self.limits.room_item_limit,
            });
        }
        info!("Item {} ({}) added to room {}", id, fields.kind, code);

        let row = self
            .db
            .get_item_latest(&id.to_string())?
            .ok_or(Error::ItemNotFound)?;
        item_from_row(&row)
    }

    /// Latest live version of an item. Soft-deleted items read as gone.
    pub fn get_item(&self, item_id: &str) -> Result<ContentItem> {
        let row = self.db.get_item_latest(item_id)?.ok_or(Error::ItemNotFound)?;
        let room = self.live_room(&row.room_code)?;
        self.check_mode(&room, OperationKind::Read)?;
        if row.deleted {
            return Err(Error::ItemNotFound);
        }
        item_from_row(&row)
    }

    /// Payload bytes for an item, wherever they live. A blob that lost a
    /// race with room deletion reads as `ItemNotFound`, which the caller
    /// must tolerate.
    pub async fn read_payload(&self, item: &ContentItem) -> Result<Vec<u8>> {
        match &item.payload {
            Payload::Inline { body } => Ok(body.clone().into_bytes()),
            Payload::Blob { key } => self
                .blobs
                .get(key)
                .await?
                .ok_or(Error::ItemNotFound),
        }
    }

    /// Visible timeline: non-deleted latest versions, (created_at, id)
    /// ascending. A dead room is `RoomNotFound`, never an empty list.
    pub fn list_visible(&self, code: &str) -> Result<Vec<ContentItem>> {
        let room = self.live_room(code)?;
        self.check_mode(&room, OperationKind::Read)?;
        self.db
            .list_visible(code)?
            .iter()
            .map(item_from_row)
            .collect()
    }

    /// Mark the item deleted by appending a tombstone version. The row and
    /// its history stay until the room itself is destroyed. Idempotent on
    /// an already-deleted item.
    pub fn soft_delete(&self, item_id: &str) -> Result<()> {
        let row = self.db.get_item_latest(item_id)?.ok_or(Error::ItemNotFound)?;
        let room = self.live_room(&row.room_code)?;
        self.check_mode(&room, OperationKind::Write)?;

        if row.deleted {
            return Ok(());
        }
        let mut tombstone = VersionFields::from_row(&row);
        tombstone.deleted = true;
        self.db
            .append_version(item_id, &tombstone, &ts(Utc::now()))?
            .ok_or(Error::ItemNotFound)?;
        info!("Item {} soft-deleted in room {}", item_id, row.room_code);
        Ok(())
    }

    /// The room's visible state as it stood at `at`.
    pub fn history_as_of(&self, code: &str, at: DateTime<Utc>) -> Result<Vec<ContentItem>> {
        let room = self.live_room(code)?;
        self.check_mode(&room, OperationKind::Read)?;
        self.db
            .history_as_of(code, &ts(at))?
            .iter()
            .map(item_from_row)
            .collect()
    }

    /// Roll the visible state back to `at` by appending new versions — the
    /// restore itself is an event in the log, and nothing that happened
    /// since (including deletions) is erased. Returns how many items moved.
    pub fn restore(&self, code: &str, at: DateTime<Utc>) -> Result<usize> {
        let room = self.live_room(code)?;
        self.check_mode(&room, OperationKind::Write)?;

        let historical = self.db.history_as_of(code, &ts(at))?;
        let current = self.db.list_visible(code)?;
        let current_by_id: HashMap<&str, &alcove_db::models::ItemRow> =
            current.iter().map(|r| (r.id.as_str(), r)).collect();

        let now = ts(Utc::now());
        let mut moved = 0;

        for past in &historical {
            let wanted = VersionFields::from_row(past);
            let differs = match current_by_id.get(past.id.as_str()) {
                Some(cur) => VersionFields::from_row(cur) != wanted,
                None => true,
            };
            if differs {
                self.db
                    .append_version(&past.id, &wanted, &now)?
                    .ok_or(Error::ItemNotFound)?;
                moved += 1;
            }
        }

        // Items visible now that did not exist (or were deleted) at `at`
        // get a tombstone so the restored view matches the historical one.
        let historical_ids: HashMap<&str, ()> =
            historical.iter().map(|r| (r.id.as_str(), ())).collect();
        for cur in &current {
            if !historical_ids.contains_key(cur.id.as_str()) {
                let mut tombstone = VersionFields::from_row(cur);
                tombstone.deleted = true;
                self.db
                    .append_version(&cur.id, &tombstone, &now)?
                    .ok_or(Error::ItemNotFound)?;
                moved += 1;
            }
        }

        info!("Room {} restored to {} ({} items moved)", code, ts(at), moved);
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use alcove_types::AccessMode;
    use std::time::Duration;

    fn text(body: &str) -> NewItem {
        NewItem {
            kind: ContentKind::Text,
            payload: NewPayload::Inline(body.into()),
            filename: None,
            mime_type: Some("text/plain".into()),
            page_count: None,
        }
    }

    fn blob(name: &str, bytes: &[u8]) -> NewItem {
        NewItem {
            kind: ContentKind::FileBlob,
            payload: NewPayload::Bytes(bytes.to_vec()),
            filename: Some(name.into()),
            mime_type: Some("application/octet-stream".into()),
            page_count: None,
        }
    }

    #[tokio::test]
    async fn put_and_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let engine = testutil::engine(&dir);
        let room = engine.create_room(None).unwrap();

        let item = engine.put_item(&room.code, text("hello")).await.unwrap();
        assert_eq!(item.kind, ContentKind::Text);
        assert_eq!(item.version, 1);
        assert_eq!(
            engine.read_payload(&item).await.unwrap(),
            b"hello".to_vec()
        );

        let payload = vec![0u8, 159, 146, 150, 255];
        let stored = engine
            .put_item(&room.code, blob("data.bin", &payload))
            .await
            .unwrap();
        assert_eq!(stored.metadata.size_bytes, payload.len() as u64);
        assert_eq!(engine.read_payload(&stored).await.unwrap(), payload);

        let fetched = engine.get_item(&stored.id.to_string()).unwrap();
        assert_eq!(fetched.metadata.filename.as_deref(), Some("data.bin"));
    }

    #[tokio::test]
    async fn timeline_is_ordered_by_creation() {
        let dir = tempfile::tempdir().unwrap();
        let engine = testutil::engine(&dir);
        let room = engine.create_room(None).unwrap();

        for body in ["one", "two", "three"] {
            engine.put_item(&room.code, text(body)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let bodies: Vec<String> = engine
            .list_visible(&room.code)
            .unwrap()
            .into_iter()
            .map(|i| match i.payload {
                Payload::Inline { body } => body,
                Payload::Blob { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(bodies, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn access_modes_gate_reads_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = testutil::engine(&dir);
        let room = engine.create_room(None).unwrap();
        let item = engine.put_item(&room.code, text("kept")).await.unwrap();

        engine
            .set_access_mode(&room.code, AccessMode::ReadOnly)
            .unwrap();
        assert!(matches!(
            engine.put_item(&room.code, text("no")).await,
            Err(Error::AccessDenied { .. })
        ));
        assert!(matches!(
            engine.soft_delete(&item.id.to_string()),
            Err(Error::AccessDenied { .. })
        ));
        assert_eq!(engine.list_visible(&room.code).unwrap().len(), 1);

        engine
            .set_access_mode(&room.code, AccessMode::DropOnly)
            .unwrap();
        assert!(matches!(
            engine.list_visible(&room.code),
            Err(Error::AccessDenied { .. })
        ));
        assert!(matches!(
            engine.get_item(&item.id.to_string()),
            Err(Error::AccessDenied { .. })
        ));
        // Drops still land.
        engine.put_item(&room.code, text("dropped")).await.unwrap();
    }

    #[tokio::test]
    async fn quotas_are_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let limits = crate::Limits {
            room_item_limit: 2,
            max_payload_bytes: 16,
            ..Default::default()
        };
        let engine = testutil::engine_with_limits(&dir, limits);
        let room = engine.create_room(None).unwrap();

        assert!(matches!(
            engine
                .put_item(&room.code, text("this body is far too long"))
                .await,
            Err(Error::PayloadTooLarge { limit: 16 })
        ));

        engine.put_item(&room.code, text("a")).await.unwrap();
        engine.put_item(&room.code, text("b")).await.unwrap();
        assert!(matches!(
            engine.put_item(&room.code, text("c")).await,
            Err(Error::RoomFull { limit: 2 })
        ));

        // Soft-deleting frees a slot — the ceiling counts visible items.
        let items = engine.list_visible(&room.code).unwrap();
        engine.soft_delete(&items[0].id.to_string()).unwrap();
        engine.put_item(&room.code, text("c")).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_writers_cannot_overshoot_the_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let limits = crate::Limits {
            room_item_limit: 3,
            ..Default::default()
        };
        let engine = std::sync::Arc::new(testutil::engine_with_limits(&dir, limits));
        let room = engine.create_room(None).unwrap();

        let mut tasks = Vec::new();
        for i in 0..12 {
            let engine = engine.clone();
            let code = room.code.clone();
            tasks.push(tokio::spawn(async move {
                engine.put_item(&code, text(&format!("w{i}"))).await
            }));
        }

        let mut stored = 0;
        let mut refused = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => stored += 1,
                Err(Error::RoomFull { limit: 3 }) => refused += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(stored, 3);
        assert_eq!(refused, 9);
        assert_eq!(engine.list_visible(&room.code).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn history_and_restore_fidelity() {
        let dir = tempfile::tempdir().unwrap();
        let engine = testutil::engine(&dir);
        let room = engine.create_room(None).unwrap();

        let a = engine.put_item(&room.code, text("A")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        engine.put_item(&room.code, text("B")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let t2 = Utc::now();
        tokio::time::sleep(Duration::from_millis(5)).await;

        engine.soft_delete(&a.id.to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        // Both items were visible at t2 and at any instant before the delete.
        assert_eq!(engine.history_as_of(&room.code, t2).unwrap().len(), 2);
        assert_eq!(
            engine.history_as_of(&room.code, Utc::now()).unwrap().len(),
            1
        );
        assert_eq!(engine.list_visible(&room.code).unwrap().len(), 1);

        // Restore resurrects A as a new version; the tombstone stays in the
        // log underneath it.
        let moved = engine.restore(&room.code, t2).unwrap();
        assert_eq!(moved, 1);
        let visible = engine.list_visible(&room.code).unwrap();
        assert_eq!(visible.len(), 2);
        let restored = visible.iter().find(|i| i.id == a.id).unwrap();
        assert_eq!(restored.version, 3);
        assert!(
            engine
                .history_as_of(&room.code, t2)
                .unwrap()
                .iter()
                .any(|i| i.id == a.id),
            "history before the deletion must be intact"
        );
    }

    #[tokio::test]
    async fn restore_tombstones_items_newer_than_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let engine = testutil::engine(&dir);
        let room = engine.create_room(None).unwrap();

        engine.put_item(&room.code, text("old")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let t = Utc::now();
        tokio::time::sleep(Duration::from_millis(5)).await;
        engine.put_item(&room.code, text("new")).await.unwrap();

        engine.restore(&room.code, t).unwrap();
        let bodies: Vec<String> = engine
            .list_visible(&room.code)
            .unwrap()
            .into_iter()
            .map(|i| match i.payload {
                Payload::Inline { body } => body,
                Payload::Blob { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(bodies, vec!["old"]);
    }

    /// Blob store whose writes always fail, for exercising the commit
    /// ordering: no blob, no metadata.
    struct FailingBlobStore;

    #[async_trait::async_trait]
    impl alcove_blob::BlobStore for FailingBlobStore {
        async fn put(&self, _: &str, _: &[u8], _: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
        async fn get(&self, _: &str) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn delete(&self, _: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn exists(&self, _: &str) -> anyhow::Result<bool> {
            Ok(false)
        }
        async fn list_keys(&self, _: &str) -> anyhow::Result<Vec<String>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn failed_blob_write_leaves_no_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let db = std::sync::Arc::new(
            alcove_db::Database::open(&dir.path().join("alcove.db")).unwrap(),
        );
        let engine = Engine::new(
            db.clone(),
            std::sync::Arc::new(FailingBlobStore),
            crate::Limits::default(),
        );
        let room = engine.create_room(None).unwrap();

        let err = engine
            .put_item(&room.code, blob("doomed.bin", b"bytes"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        // Zero rows reference the blob key that never got written.
        assert!(engine.list_visible(&room.code).unwrap().is_empty());
        assert!(db.all_blob_keys().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dead_room_distinguishes_gone_from_empty() {
        let dir = tempfile::tempdir().unwrap();
        let engine = testutil::engine(&dir);
        let room = engine.create_room(None).unwrap();
        engine.delete_room(&room.code).await.unwrap();

        assert!(matches!(
            engine.list_visible(&room.code),
            Err(Error::RoomNotFound)
        ));
    }
}
