//! Lifecycle sweep: expired, unpinned rooms move to gone.
//!
//! There is no claim protocol. Blob deletion, content deletion and registry
//! deletion are all idempotent, so two overlapping sweeps — or a sweep
//! racing a user delete — both converge on the same end state. A room that
//! fails mid-teardown stays expired and is retried on the next run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use alcove_types::Result;

use crate::{Engine, ts};

/// Pause between processing batches, to bound contention with live traffic.
const BATCH_PAUSE: Duration = Duration::from_millis(50);

#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    pub reaped: usize,
    pub failed: usize,
}

impl Engine {
    /// One full sweep. Candidates are fetched in bounded batches; one
    /// room's failure never aborts the others.
    pub async fn sweep_expired(&self) -> Result<SweepStats> {
        let now = ts(Utc::now());
        let mut stats = SweepStats::default();
        // Rooms that failed teardown stay in the candidate query. Tracking
        // what this sweep already attempted, and widening the query window
        // by that much, keeps failed rooms from both being retried in a
        // tight loop and shadowing younger candidates behind them.
        let mut attempted: HashSet<String> = HashSet::new();

        loop {
            let window = self.limits.reap_batch_size + attempted.len();
            let batch = self.db.expired_room_codes(&now, window)?;
            let fresh: Vec<String> = batch
                .into_iter()
                .filter(|code| !attempted.contains(code))
                .take(self.limits.reap_batch_size)
                .collect();
            if fresh.is_empty() {
                break;
            }
            attempted.extend(fresh.iter().cloned());

            for code in &fresh {
                match self.destroy_room(code).await {
                    Ok(()) => stats.reaped += 1,
                    Err(e) => {
                        stats.failed += 1;
                        warn!("Failed to reap room {}: {} (will retry next run)", code, e);
                    }
                }
            }

            tokio::time::sleep(BATCH_PAUSE).await;
        }

        Ok(stats)
    }
}

/// Background task driving `sweep_expired` on a fixed interval.
pub async fn run_reaper_loop(engine: Arc<Engine>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match engine.sweep_expired().await {
            Ok(stats) if stats.reaped > 0 || stats.failed > 0 => {
                info!(
                    "Reaper: removed {} expired rooms ({} failed)",
                    stats.reaped, stats.failed
                );
            }
            Ok(_) => {}
            Err(e) => warn!("Reaper sweep error: {}", e),
        }
    }
}
