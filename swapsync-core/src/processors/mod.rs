//! Long-lived worker tasks.
//!
//! Each processor owns its loop, receives a `watch`-based shutdown signal
//! and exits at its next suspension point when the signal flips. Workers
//! log recoverable failures and keep running; only startup errors abort.

pub mod expiry_worker;
pub mod floor_engine;
pub mod floor_snapshot;
pub mod listed_count;
pub mod listing_worker;
pub mod orderbook_indexer;

pub use expiry_worker::ExpiryWorker;
pub use floor_engine::FloorPriceEngine;
pub use floor_snapshot::FloorSnapshotWorker;
pub use listed_count::ListedCountAggregator;
pub use listing_worker::ListingWorker;
pub use orderbook_indexer::OrderBookIndexer;

use std::time::Duration;
use tokio::sync::watch;

/// Sleep for `period`, waking early if shutdown is signalled.
pub(crate) async fn idle_sleep(shutdown_rx: &mut watch::Receiver<bool>, period: Duration) {
    tokio::select! {
        biased;

        _ = shutdown_rx.changed() => {}
        _ = tokio::time::sleep(period) => {}
    }
}
