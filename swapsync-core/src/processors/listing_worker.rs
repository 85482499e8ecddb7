//! ListingWorker processor.
//!
//! Drains the durable new-listing queue. Orders that arrived already past
//! their expiry are expired on the spot; everything else is announced on the
//! trade queue and handed to the expiry wheel. Bids travel the same path as
//! listings: they need expiry handling too, and the floor engine's window is
//! self-repairing where a bid slips in.

use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::entities::order::Order;
use crate::events::{ExpiryInsertSender, NewListing, TradeEvent};
use crate::ordermanager::ExpiryNode;
use crate::store::{RedisStore, StoreError};
use crate::utils::unix_now;

/// Wait between polls when the queue is empty.
const EMPTY_QUEUE_SLEEP: Duration = Duration::from_millis(200);

/// Errors raised while routing a new listing.
#[derive(Debug, Error)]
pub enum ListingError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Durable queue error
    #[error("queue error: {0}")]
    Queue(#[from] StoreError),

    /// The wheel task is gone; only happens during shutdown
    #[error("expiry wheel unavailable")]
    WheelClosed,
}

/// ListingWorker routes freshly indexed orders into the expiry machinery.
pub struct ListingWorker {
    pool: PgPool,
    store: RedisStore,
    chain: String,
    wheel_tx: ExpiryInsertSender,
}

impl ListingWorker {
    pub fn new(
        pool: PgPool,
        store: RedisStore,
        chain: String,
        wheel_tx: ExpiryInsertSender,
    ) -> Self {
        Self {
            pool,
            store,
            chain,
            wheel_tx,
        }
    }

    /// Run until shutdown.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(chain = %self.chain, "ListingWorker started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.store.pop_new_listing().await {
                Ok(Some(listing)) => {
                    if let Err(e) = self.route(listing).await {
                        error!(chain = %self.chain, error = %e, "failed to route new listing");
                    }
                }
                Ok(None) => {
                    super::idle_sleep(&mut shutdown_rx, EMPTY_QUEUE_SLEEP).await;
                }
                Err(e) => {
                    error!(chain = %self.chain, error = %e, "failed to pop new listing");
                    super::idle_sleep(&mut shutdown_rx, EMPTY_QUEUE_SLEEP).await;
                }
            }
        }

        info!(chain = %self.chain, "ListingWorker shutdown complete");
    }

    /// Either expire the order immediately or schedule it on the wheel.
    async fn route(&self, listing: NewListing) -> Result<(), ListingError> {
        let now = unix_now();

        if listing.expire_time != 0 && listing.expire_time <= now {
            let expired =
                Order::mark_expired_if_active(&self.pool, &self.chain, &listing.order_id).await?;
            if expired > 0 {
                self.store
                    .push_trade_event(&TradeEvent::Expired {
                        order_id: listing.order_id.clone(),
                        collection_addr: listing.collection_address.clone(),
                        token_id: listing.token_id.clone(),
                    })
                    .await?;
            }
            debug!(
                chain = %self.chain,
                order_id = %listing.order_id,
                "listing was already expired on arrival"
            );
            return Ok(());
        }

        self.store
            .push_trade_event(&TradeEvent::Listing {
                order_id: listing.order_id.clone(),
                collection_addr: listing.collection_address.clone(),
                token_id: listing.token_id.clone(),
                maker: listing.maker.clone(),
                price: listing.price,
            })
            .await?;

        // Never-expiring orders (expire_time zero) stay off the wheel.
        if listing.expire_time != 0 {
            self.wheel_tx
                .send(ExpiryNode {
                    order_id: listing.order_id,
                    collection_address: listing.collection_address,
                    token_id: listing.token_id,
                    maker: listing.maker,
                    expire_time: listing.expire_time,
                })
                .await
                .map_err(|_| ListingError::WheelClosed)?;
        }

        Ok(())
    }
}
