//! ExpiryWorker processor.
//!
//! Owns the timer wheel: accepts nodes from the listing worker, ticks once
//! per second and expires fired orders. The wheel has no cancel path, so
//! every fire re-checks the order's status in the database first; a node
//! whose order was matched or cancelled in the meantime is dropped silently.

use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::entities::order::Order;
use crate::events::{ExpiryInsertReceiver, TradeEvent};
use crate::ordermanager::{ExpiryNode, ExpiryWheel};
use crate::store::{RedisStore, StoreError};
use crate::utils::unix_now;

/// Wheel tick.
const TICK: Duration = Duration::from_secs(1);

/// Errors raised while expiring an order.
#[derive(Debug, Error)]
pub enum ExpiryError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Durable queue error
    #[error("queue error: {0}")]
    Queue(#[from] StoreError),
}

/// ExpiryWorker drives the wheel and persists expirations.
pub struct ExpiryWorker {
    pool: PgPool,
    store: RedisStore,
    chain: String,
}

impl ExpiryWorker {
    pub fn new(pool: PgPool, store: RedisStore, chain: String) -> Self {
        Self { pool, store, chain }
    }

    /// Run until shutdown.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut insert_rx: ExpiryInsertReceiver,
    ) {
        info!(chain = %self.chain, "ExpiryWorker started");

        let mut wheel = ExpiryWheel::new();
        let mut ticker = tokio::time::interval(TICK);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(chain = %self.chain, "ExpiryWorker received shutdown signal");
                        break;
                    }
                }

                Some(node) = insert_rx.recv() => {
                    wheel.insert(node, unix_now());
                }

                _ = ticker.tick() => {
                    let fired = wheel.advance();
                    for node in fired {
                        if let Err(e) = self.expire(&node).await {
                            error!(
                                chain = %self.chain,
                                order_id = %node.order_id,
                                error = %e,
                                "failed to expire order"
                            );
                        }
                    }
                }
            }
        }

        info!(
            chain = %self.chain,
            pending = wheel.len(),
            "ExpiryWorker shutdown complete"
        );
    }

    /// Expire one fired node, publishing only on a real transition.
    async fn expire(&self, node: &ExpiryNode) -> Result<(), ExpiryError> {
        let affected =
            Order::mark_expired_if_active(&self.pool, &self.chain, &node.order_id).await?;
        if affected == 0 {
            // Order left the Active state since it was scheduled.
            debug!(chain = %self.chain, order_id = %node.order_id, "stale expiry tick");
            return Ok(());
        }

        self.store
            .push_trade_event(&TradeEvent::Expired {
                order_id: node.order_id.clone(),
                collection_addr: node.collection_address.clone(),
                token_id: node.token_id.clone(),
            })
            .await?;

        debug!(chain = %self.chain, order_id = %node.order_id, "order expired");
        Ok(())
    }
}
