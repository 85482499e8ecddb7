//! FloorSnapshotWorker processor.
//!
//! Periodically persists every collection's current floor into the
//! timestamped floor-price table (the data behind trend charts) and prunes
//! rows past the retention window once a day.

use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::entities::collection::CollectionFloorPrice;
use crate::entities::indexed_status::{IndexedStatus, COLLECTION_FLOOR_INDEX};
use crate::utils::{unix_now, unix_now_millis};

/// How often a snapshot of all floors is taken.
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(300);

/// How often expired snapshot rows are purged.
const PURGE_INTERVAL: Duration = Duration::from_secs(86_400);

/// Snapshot retention window in seconds.
const RETENTION: i64 = 7 * 86_400;

/// FloorSnapshotWorker records floor-price history.
pub struct FloorSnapshotWorker {
    pool: PgPool,
    chain: String,
    chain_id: i64,
}

impl FloorSnapshotWorker {
    pub fn new(pool: PgPool, chain: String, chain_id: i64) -> Self {
        Self {
            pool,
            chain,
            chain_id,
        }
    }

    /// Run until shutdown.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(chain = %self.chain, "FloorSnapshotWorker started");

        let mut snapshot_ticker = tokio::time::interval(SNAPSHOT_INTERVAL);
        let mut purge_ticker = tokio::time::interval(PURGE_INTERVAL);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(chain = %self.chain, "FloorSnapshotWorker received shutdown signal");
                        break;
                    }
                }

                _ = snapshot_ticker.tick() => {
                    if let Err(e) = self.snapshot().await {
                        error!(chain = %self.chain, error = %e, "floor snapshot failed");
                    }
                }

                _ = purge_ticker.tick() => {
                    if let Err(e) = self.purge().await {
                        error!(chain = %self.chain, error = %e, "floor snapshot purge failed");
                    }
                }
            }
        }

        info!(chain = %self.chain, "FloorSnapshotWorker shutdown complete");
    }

    async fn snapshot(&self) -> Result<(), sqlx::Error> {
        let now = unix_now();
        let rows = CollectionFloorPrice::query_current(&self.pool, &self.chain, now).await?;
        if rows.is_empty() {
            return Ok(());
        }
        CollectionFloorPrice::insert_batch(&self.pool, &self.chain, &rows, unix_now_millis())
            .await?;
        IndexedStatus::set_last_indexed_time(&self.pool, self.chain_id, COLLECTION_FLOOR_INDEX, now)
            .await?;
        debug!(chain = %self.chain, collections = rows.len(), "floor prices snapshotted");
        Ok(())
    }

    async fn purge(&self) -> Result<(), sqlx::Error> {
        let cutoff = unix_now() - RETENTION;
        let removed = CollectionFloorPrice::purge_older_than(&self.pool, &self.chain, cutoff).await?;
        if removed > 0 {
            info!(chain = %self.chain, removed, "purged expired floor snapshots");
        }
        Ok(())
    }
}
