//! FloorPriceEngine processor.
//!
//! Sole consumer of the trade-event queue. Keeps one bounded price window
//! per collection (the 100 cheapest live listings), applies each event to
//! the window, and publishes the resulting floor to the collection row and
//! the cache whenever it moves. Every applied event also nudges the
//! listed-count aggregator.
//!
//! The window is an approximation: when a mutation empties it, the engine
//! reloads the cheapest live listings from the database, which also washes
//! out anything that should never have been there (stale makers, bids).

use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::entities::collection::Collection;
use crate::entities::order::{ListingRow, Order};
use crate::events::{CollectionSignalSender, TradeEvent};
use crate::ordermanager::{PriceEntry, PriceHeap, PRICE_HEAP_CAP};
use crate::store::{RedisStore, StoreError};
use crate::utils::unix_now;

/// Wait between polls when the trade queue is empty.
const EMPTY_QUEUE_SLEEP: Duration = Duration::from_millis(200);

/// Errors raised while applying a trade event.
#[derive(Debug, Error)]
pub enum FloorError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Durable queue or cache error
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// FloorPriceEngine maintains per-collection floor prices.
pub struct FloorPriceEngine {
    pool: PgPool,
    store: RedisStore,
    chain: String,
    signal_tx: CollectionSignalSender,
    heaps: HashMap<String, PriceHeap>,
    last_floor: HashMap<String, Decimal>,
}

impl FloorPriceEngine {
    pub fn new(
        pool: PgPool,
        store: RedisStore,
        chain: String,
        signal_tx: CollectionSignalSender,
    ) -> Self {
        Self {
            pool,
            store,
            chain,
            signal_tx,
            heaps: HashMap::new(),
            last_floor: HashMap::new(),
        }
    }

    /// Run until shutdown.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        if let Err(e) = self.warm_up().await {
            // Not fatal: windows rebuild lazily through the reload path.
            error!(chain = %self.chain, error = %e, "floor warm-up failed");
        }

        info!(chain = %self.chain, "FloorPriceEngine started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.store.pop_trade_event().await {
                Ok(Some(event)) => {
                    if let Err(e) = self.apply(event).await {
                        error!(chain = %self.chain, error = %e, "failed to apply trade event");
                    }
                }
                Ok(None) => {
                    super::idle_sleep(&mut shutdown_rx, EMPTY_QUEUE_SLEEP).await;
                }
                Err(e) => {
                    // The event is gone; the producer side retries on its
                    // own failures, so just keep draining.
                    error!(chain = %self.chain, error = %e, "failed to pop trade event");
                    super::idle_sleep(&mut shutdown_rx, EMPTY_QUEUE_SLEEP).await;
                }
            }
        }

        info!(chain = %self.chain, "FloorPriceEngine shutdown complete");
    }

    /// Build every known collection's window from the database.
    async fn warm_up(&mut self) -> Result<(), FloorError> {
        let addresses = Collection::list_addresses(&self.pool, &self.chain).await?;
        let collections = addresses.len();
        for address in addresses {
            self.reload(&address).await?;
            self.publish_floor(&address).await?;
        }
        info!(chain = %self.chain, collections, "floor price windows warmed");
        Ok(())
    }

    /// Apply one trade event to its collection's window, then publish the
    /// floor and signal the count aggregator.
    async fn apply(&mut self, event: TradeEvent) -> Result<(), FloorError> {
        let collection = event.collection_addr().to_string();

        match event {
            TradeEvent::Listing {
                order_id,
                token_id,
                maker,
                price,
                ..
            } => {
                self.heap(&collection).offer(PriceEntry {
                    order_id,
                    collection_address: collection.clone(),
                    token_id,
                    maker,
                    price,
                });
            }

            TradeEvent::Buy {
                order_id,
                token_id,
                from,
                to,
                ..
            } => {
                {
                    let heap = self.heap(&collection);
                    heap.remove_order(&order_id);
                    // The seller may have listed the same token more than
                    // once; those listings died with the sale.
                    heap.remove_seller_listings(&from, &token_id);
                }
                // The buyer's own listings in this collection are live again
                // from the window's point of view.
                let rows = Order::active_listings_by_maker(
                    &self.pool,
                    &self.chain,
                    &collection,
                    &to,
                    unix_now(),
                    PRICE_HEAP_CAP as i64,
                )
                .await?;
                let heap = self.heap(&collection);
                for row in rows {
                    heap.offer(listing_entry(row));
                }
                if heap.is_empty() {
                    self.reload(&collection).await?;
                }
            }

            TradeEvent::Cancel { order_id, .. } | TradeEvent::Expired { order_id, .. } => {
                let removed = self.heap(&collection).remove_order(&order_id);
                if removed && self.heap(&collection).is_empty() {
                    self.reload(&collection).await?;
                }
            }

            TradeEvent::UpdateCollection { .. } => {
                self.reload(&collection).await?;
            }
        }

        self.publish_floor(&collection).await?;

        // Best effort: a dropped signal is repaired by the aggregator's
        // next periodic pass.
        if self.signal_tx.try_send(collection.clone()).is_err() {
            warn!(chain = %self.chain, collection = %collection, "listed-count signal dropped");
        }

        Ok(())
    }

    fn heap(&mut self, collection: &str) -> &mut PriceHeap {
        self.heaps.entry(collection.to_string()).or_default()
    }

    /// Rebuild one window from the cheapest live listings in the database.
    async fn reload(&mut self, collection: &str) -> Result<(), FloorError> {
        let rows = Order::cheapest_active_listings(
            &self.pool,
            &self.chain,
            collection,
            unix_now(),
            PRICE_HEAP_CAP as i64,
        )
        .await?;
        let heap = self.heap(collection);
        heap.clear();
        for row in rows {
            heap.offer(listing_entry(row));
        }
        Ok(())
    }

    /// Write the floor to the collection row and the cache when it moved.
    async fn publish_floor(&mut self, collection: &str) -> Result<(), FloorError> {
        let floor = self
            .heaps
            .get(collection)
            .and_then(PriceHeap::min_price)
            .unwrap_or(Decimal::ZERO);

        if self.last_floor.get(collection) == Some(&floor) {
            return Ok(());
        }

        Collection::update_floor_price(&self.pool, &self.chain, collection, floor).await?;
        self.store.set_floor_price(collection, floor).await?;
        self.last_floor.insert(collection.to_string(), floor);

        info!(
            chain = %self.chain,
            collection = %collection,
            floor = %floor,
            "collection floor updated"
        );
        Ok(())
    }
}

fn listing_entry(row: ListingRow) -> PriceEntry {
    PriceEntry {
        order_id: row.order_id,
        collection_address: row.collection_address,
        token_id: row.token_id,
        maker: row.maker,
        price: row.price,
    }
}
