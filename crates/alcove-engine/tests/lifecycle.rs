//! End-to-end room lifecycle against the on-disk stores: create, fill,
//! expire, reap, and verify nothing survives.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use alcove_blob::{BlobStore, FsBlobStore};
use alcove_db::Database;
use alcove_engine::content::{NewItem, NewPayload};
use alcove_engine::{Engine, Limits};
use alcove_types::{ContentKind, Error};

async fn disk_engine(dir: &tempfile::TempDir) -> (Engine, Arc<FsBlobStore>) {
    let db = Arc::new(Database::open(&dir.path().join("alcove.db")).unwrap());
    let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")).await.unwrap());
    (Engine::new(db, blobs.clone(), Limits::default()), blobs)
}

fn item(kind: ContentKind, payload: NewPayload, filename: Option<&str>) -> NewItem {
    NewItem {
        kind,
        payload,
        filename: filename.map(String::from),
        mime_type: None,
        page_count: None,
    }
}

#[tokio::test]
async fn expired_room_is_fully_reaped() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, blobs) = disk_engine(&dir).await;

    let room = engine.create_room(None).unwrap();
    let code = room.code.clone();

    engine
        .put_item(&code, item(ContentKind::Text, NewPayload::Inline("note".into()), None))
        .await
        .unwrap();
    engine
        .put_item(
            &code,
            item(
                ContentKind::Image,
                NewPayload::Bytes(vec![0x89, b'P', b'N', b'G']),
                Some("shot.png"),
            ),
        )
        .await
        .unwrap();
    engine
        .put_item(
            &code,
            item(
                ContentKind::FileBlob,
                NewPayload::Bytes(vec![0u8; 1024]),
                Some("dump.bin"),
            ),
        )
        .await
        .unwrap();

    assert_eq!(engine.list_visible(&code).unwrap().len(), 3);
    assert_eq!(blobs.list_keys(&format!("{code}/")).await.unwrap().len(), 2);

    // Push the deadline an hour into the past, reaching under the engine
    // the way a passing clock would.
    let past = (Utc::now() - chrono::Duration::hours(1))
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    let db = Database::open(&dir.path().join("alcove.db")).unwrap();
    db.set_expiry(&code, Some(&past)).unwrap();

    let stats = engine.sweep_expired().await.unwrap();
    assert_eq!(stats.reaped, 1);
    assert_eq!(stats.failed, 0);

    // Registry gone, blobs gone, and a query reads as "room gone" — never
    // as an empty room.
    assert!(matches!(engine.room(&code), Err(Error::RoomNotFound)));
    assert!(blobs.list_keys(&format!("{code}/")).await.unwrap().is_empty());
    assert!(matches!(engine.list_visible(&code), Err(Error::RoomNotFound)));

    // Re-running the sweep converges with no errors.
    let again = engine.sweep_expired().await.unwrap();
    assert_eq!(again.reaped, 0);
    assert_eq!(again.failed, 0);
}

#[tokio::test]
async fn payload_bytes_survive_the_roundtrip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _) = disk_engine(&dir).await;
    let room = engine.create_room(None).unwrap();

    let payload: Vec<u8> = (0..=255).collect();
    let stored = engine
        .put_item(
            &room.code,
            item(ContentKind::Pdf, NewPayload::Bytes(payload.clone()), Some("doc.pdf")),
        )
        .await
        .unwrap();

    assert_eq!(engine.read_payload(&stored).await.unwrap(), payload);
}
