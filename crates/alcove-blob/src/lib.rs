//! Blob storage behind a uniform interface.
//!
//! Keys are `{room_code}/{name}` — the room prefix is the deletion unit, so
//! tearing down a room is "enumerate the prefix, delete every key" with no
//! separate index. Deletes are idempotent at this layer; the lifecycle
//! sweep leans on that to make re-runs and races harmless.

mod fs;
mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

use anyhow::{Result, bail};
use async_trait::async_trait;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], mime_type: &str) -> Result<()>;

    /// None if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Idempotent — deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// All keys under `prefix` (`"{room_code}/"`), or every key when the
    /// prefix is empty. Order is unspecified.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Split a key into its (room, name) halves, rejecting anything that could
/// escape the room namespace on a filesystem backend.
pub(crate) fn split_key(key: &str) -> Result<(&str, &str)> {
    let Some((room, name)) = key.split_once('/') else {
        bail!("Malformed blob key: {key}");
    };
    if room.is_empty() || name.is_empty() || name.contains('/') {
        bail!("Malformed blob key: {key}");
    }
    for segment in [room, name] {
        if !segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            bail!("Malformed blob key: {key}");
        }
    }
    Ok((room, name))
}
