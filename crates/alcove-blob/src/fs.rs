use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::{BlobStore, split_key};

/// Local-filesystem blob store: one directory per room, one flat file per
/// blob at `{dir}/{room_code}/{name}`.
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Blob storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let (room, name) = split_key(key)?;
        Ok(self.dir.join(room).join(name))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8], _mime_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob {} already gone", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        if prefix.is_empty() {
            let mut rooms = fs::read_dir(&self.dir).await?;
            while let Some(room) = rooms.next_entry().await? {
                if !room.file_type().await?.is_dir() {
                    continue;
                }
                let Some(room_name) = room.file_name().to_str().map(String::from) else {
                    continue;
                };
                collect_dir(&mut keys, room.path(), &room_name).await?;
            }
        } else {
            let room = prefix.trim_end_matches('/');
            let dir = self.dir.join(room);
            match fs::try_exists(&dir).await? {
                true => collect_dir(&mut keys, dir, room).await?,
                false => {}
            }
        }
        Ok(keys)
    }
}

async fn collect_dir(keys: &mut Vec<String>, dir: PathBuf, room: &str) -> Result<()> {
    let mut entries = fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            keys.push(format!("{room}/{name}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_delete_and_prefix_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("blobs")).await.unwrap();

        store.put("ROOMAAAA/one", b"alpha", "text/plain").await.unwrap();
        store.put("ROOMAAAA/two", b"beta", "text/plain").await.unwrap();
        store.put("ROOMBBBB/one", b"gamma", "text/plain").await.unwrap();

        assert_eq!(store.get("ROOMAAAA/one").await.unwrap().unwrap(), b"alpha");
        assert!(store.exists("ROOMAAAA/two").await.unwrap());
        assert!(store.get("ROOMAAAA/three").await.unwrap().is_none());

        let mut keys = store.list_keys("ROOMAAAA/").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["ROOMAAAA/one", "ROOMAAAA/two"]);

        let all = store.list_keys("").await.unwrap();
        assert_eq!(all.len(), 3);

        // Listing a room with no blobs is empty, not an error.
        assert!(store.list_keys("ROOMCCCC/").await.unwrap().is_empty());

        store.delete("ROOMAAAA/one").await.unwrap();
        assert!(!store.exists("ROOMAAAA/one").await.unwrap());
        // Idempotent second delete.
        store.delete("ROOMAAAA/one").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("blobs")).await.unwrap();
        assert!(store.put("../escape", b"x", "").await.is_err());
        assert!(store.get("room/../../etc").await.is_err());
    }
}
