use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::{BlobStore, split_key};

/// In-memory blob store. Backs tests and ephemeral single-process
/// deployments where nothing should touch disk.
#[derive(Default)]
pub struct MemoryBlobStore {
    // Guard is never held across an await.
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8], _mime_type: &str) -> Result<()> {
        split_key(key)?;
        self.blobs
            .lock()
            .map_err(|e| anyhow::anyhow!("Blob map lock poisoned: {}", e))?
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .lock()
            .map_err(|e| anyhow::anyhow!("Blob map lock poisoned: {}", e))?
            .get(key)
            .cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs
            .lock()
            .map_err(|e| anyhow::anyhow!("Blob map lock poisoned: {}", e))?
            .remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self
            .blobs
            .lock()
            .map_err(|e| anyhow::anyhow!("Blob map lock poisoned: {}", e))?
            .contains_key(key))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .blobs
            .lock()
            .map_err(|e| anyhow::anyhow!("Blob map lock poisoned: {}", e))?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
