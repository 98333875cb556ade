//! Orphaned-blob reconciliation.
//!
//! A metadata write that fails after its blob write leaves bytes in storage
//! that no version row references. This pass diffs storage against metadata
//! and collects the difference. A key is only deleted after being sighted
//! orphaned in two consecutive passes: an upload sitting between its blob
//! write and its metadata commit looks orphaned once, never twice.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use alcove_blob::BlobStore;
use alcove_types::Result;

use crate::Engine;

impl Engine {
    /// Returns the number of orphaned blobs deleted this pass.
    pub async fn reconcile_blobs(&self) -> Result<usize> {
        let stored = self.blobs.list_keys("").await?;
        let referenced: HashSet<String> = self.db.all_blob_keys()?.into_iter().collect();
        let orphans: HashSet<String> = stored
            .into_iter()
            .filter(|key| !referenced.contains(key))
            .collect();

        let doomed: Vec<String> = {
            let mut candidates = self
                .orphan_candidates
                .lock()
                .map_err(|e| anyhow::anyhow!("Orphan set lock poisoned: {}", e))?;
            let doomed = orphans
                .intersection(&candidates)
                .cloned()
                .collect::<Vec<_>>();
            *candidates = &orphans - &doomed.iter().cloned().collect::<HashSet<_>>();
            doomed
        };

        for key in &doomed {
            warn!("Deleting orphaned blob {}", key);
            self.blobs.delete(key).await?;
        }
        Ok(doomed.len())
    }
}

/// Background task driving `reconcile_blobs` on a fixed interval, slower
/// than the reaper — orphans cost disk, not correctness.
pub async fn run_reconcile_loop(engine: Arc<Engine>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match engine.reconcile_blobs().await {
            Ok(0) => {}
            Ok(n) => info!("Reconciliation: removed {} orphaned blobs", n),
            Err(e) => warn!("Reconciliation error: {}", e),
        }
    }
}
