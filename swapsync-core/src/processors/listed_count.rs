//! ListedCountAggregator processor.
//!
//! Collects collection addresses signalled by the floor engine into a dedup
//! set and, once a minute, recounts the distinct listed tokens of each
//! drained collection and caches the result. Signals are best effort;
//! anything lost is picked up by a later signal for the same collection,
//! so the cache is eventually consistent at seconds granularity.

use sqlx::PgPool;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::entities::order::Order;
use crate::events::CollectionSignalReceiver;
use crate::store::{RedisStore, StoreError};
use crate::utils::unix_now;

/// Drain-and-recount period.
const AGGREGATE_INTERVAL: Duration = Duration::from_secs(60);

/// Errors raised while refreshing a listed count.
#[derive(Debug, Error)]
pub enum CountError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cache error
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// ListedCountAggregator maintains the per-collection listed-count cache.
pub struct ListedCountAggregator {
    pool: PgPool,
    store: RedisStore,
    chain: String,
    exclude_marketplace_id: i16,
}

impl ListedCountAggregator {
    pub fn new(
        pool: PgPool,
        store: RedisStore,
        chain: String,
        exclude_marketplace_id: i16,
    ) -> Self {
        Self {
            pool,
            store,
            chain,
            exclude_marketplace_id,
        }
    }

    /// Run until shutdown.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut signal_rx: CollectionSignalReceiver,
    ) {
        info!(chain = %self.chain, "ListedCountAggregator started");

        let mut pending: HashSet<String> = HashSet::new();
        let mut ticker = tokio::time::interval(AGGREGATE_INTERVAL);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(chain = %self.chain, "ListedCountAggregator received shutdown signal");
                        break;
                    }
                }

                Some(collection) = signal_rx.recv() => {
                    pending.insert(collection);
                }

                _ = ticker.tick() => {
                    let batch = std::mem::take(&mut pending);
                    if batch.is_empty() {
                        continue;
                    }
                    debug!(chain = %self.chain, collections = batch.len(), "recounting listed tokens");
                    for collection in batch {
                        if let Err(e) = self.refresh(&collection).await {
                            error!(
                                chain = %self.chain,
                                collection = %collection,
                                error = %e,
                                "failed to refresh listed count"
                            );
                        }
                    }
                }
            }
        }

        info!(chain = %self.chain, "ListedCountAggregator shutdown complete");
    }

    async fn refresh(&self, collection: &str) -> Result<(), CountError> {
        let count = Order::count_listed(
            &self.pool,
            &self.chain,
            collection,
            unix_now(),
            self.exclude_marketplace_id,
        )
        .await?;
        self.store.set_listed_count(collection, count).await?;
        debug!(chain = %self.chain, collection = %collection, count, "listed count cached");
        Ok(())
    }
}
