//! OrderBookIndexer processor.
//!
//! Tails the orderbook contract's event log in confirmed block batches and
//! mirrors it into the database:
//! - `LogMake`  — upsert the order, record an activity, enqueue the order
//!   for the listing worker
//! - `LogCancel` — cancel the order, record an activity, publish a trade
//!   event
//! - `LogMatch` — fill the sell side, burn one unit of the buy side, move
//!   item ownership, record the sale, publish a trade event
//!
//! The block cursor only advances after a batch has been fully persisted,
//! so delivery is at-least-once; replays collapse on the `order_id` and
//! `(tx_hash, log_index)` uniqueness guards.

use alloy_primitives::Address;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::chain::abi::{
    self, AbiError, LOG_CANCEL_TOPIC, LOG_MAKE_TOPIC, LOG_MATCH_TOPIC,
};
use crate::chain::{ChainClient, RpcError, RpcLog};
use crate::entities::activity::{Activity, ActivityType};
use crate::entities::indexed_status::{IndexedStatus, ORDERBOOK_EVENT_INDEX};
use crate::entities::item::Item;
use crate::entities::order::{Order, OrderStatus};
use crate::entities::MARKETPLACE_ORDERBOOK;
use crate::events::{NewListing, TradeEvent};
use crate::store::{RedisStore, StoreError};
use crate::utils::unix_now;

/// Wait between polls when caught up or after a failed batch.
const SLEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Blocks fetched per `eth_getLogs` call.
const SYNC_BLOCK_PERIOD: u64 = 10;

/// Blocks below head treated as not yet final, per chain.
pub fn confirm_depth(chain: &str) -> u64 {
    match chain {
        "eth" | "sepolia" | "starknet" => 1,
        "optimism" | "arbitrum" | "base" | "zksync-era" => 2,
        _ => 2,
    }
}

/// Errors raised while ingesting events.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Chain RPC error
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    /// Durable queue error
    #[error("queue error: {0}")]
    Queue(#[from] StoreError),

    /// Malformed log for a known topic
    #[error("decode error: {0}")]
    Decode(#[from] AbiError),

    /// Event references an order the mirror has never seen
    #[error("order {0} not found")]
    MissingOrder(String),

    /// On-chain quantity does not fit the mirror's column types
    #[error("numeric overflow: {0}")]
    Numeric(String),
}

impl IndexError {
    /// Transient I/O halts the batch so the range is retried; per-log
    /// failures (decode, integrity, numeric) are logged and skipped.
    fn halts_batch(&self) -> bool {
        matches!(
            self,
            IndexError::Database(_) | IndexError::Rpc(_) | IndexError::Queue(_)
        )
    }
}

/// OrderBookIndexer tails the contract event log for one chain.
pub struct OrderBookIndexer<C: ChainClient> {
    pool: PgPool,
    store: RedisStore,
    chain_client: C,
    chain: String,
    chain_id: i64,
    contract_address: Address,
    currency_address: String,
}

impl<C: ChainClient> OrderBookIndexer<C> {
    pub fn new(
        pool: PgPool,
        store: RedisStore,
        chain_client: C,
        chain: String,
        chain_id: i64,
        contract_address: Address,
        currency_address: String,
    ) -> Self {
        Self {
            pool,
            store,
            chain_client,
            chain,
            chain_id,
            contract_address,
            currency_address,
        }
    }

    /// Run until shutdown. Aborts only if the sync cursor cannot be loaded.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let status =
            match IndexedStatus::get(&self.pool, self.chain_id, ORDERBOOK_EVENT_INDEX).await {
                Ok(status) => status,
                Err(e) => {
                    error!(chain = %self.chain, error = %e, "failed to load orderbook index status");
                    return;
                }
            };
        let mut last_synced = status.last_indexed_block.max(0) as u64;

        info!(chain = %self.chain, last_synced, "OrderBookIndexer started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.sync_batch(last_synced).await {
                Ok(Some(next_cursor)) => {
                    last_synced = next_cursor;
                }
                Ok(None) => {
                    // Caught up with the confirmed head.
                    super::idle_sleep(&mut shutdown_rx, SLEEP_INTERVAL).await;
                }
                Err(e) => {
                    error!(
                        chain = %self.chain,
                        last_synced,
                        error = %e,
                        "orderbook sync batch failed"
                    );
                    super::idle_sleep(&mut shutdown_rx, SLEEP_INTERVAL).await;
                }
            }
        }

        info!(chain = %self.chain, "OrderBookIndexer shutdown complete");
    }

    /// One polling iteration. Returns the next cursor on progress, `None`
    /// when there is no confirmed block beyond the cursor yet.
    async fn sync_batch(&self, last_synced: u64) -> Result<Option<u64>, IndexError> {
        let head = self.chain_client.block_number().await?;
        let Some((start_block, end_block)) =
            batch_range(last_synced, head, confirm_depth(&self.chain))
        else {
            return Ok(None);
        };

        let mut logs = self
            .chain_client
            .filter_logs(start_block, end_block, self.contract_address)
            .await?;
        logs.sort_by_key(|log| (log.block_number, log.log_index));

        for log in &logs {
            let Some(topic0) = log.topics.first().copied() else {
                continue;
            };
            let result = if topic0 == LOG_MAKE_TOPIC {
                self.handle_make(log).await
            } else if topic0 == LOG_CANCEL_TOPIC {
                self.handle_cancel(log).await
            } else if topic0 == LOG_MATCH_TOPIC {
                self.handle_match(log).await
            } else {
                Ok(())
            };

            if let Err(e) = result {
                if e.halts_batch() {
                    return Err(e);
                }
                warn!(
                    chain = %self.chain,
                    block = log.block_number,
                    tx_hash = %log.transaction_hash,
                    log_index = log.log_index,
                    error = %e,
                    "skipping unprocessable event"
                );
            }
        }

        let next_cursor = end_block + 1;
        IndexedStatus::set_last_indexed_block(
            &self.pool,
            self.chain_id,
            ORDERBOOK_EVENT_INDEX,
            next_cursor as i64,
        )
        .await?;

        info!(
            chain = %self.chain,
            start_block,
            end_block,
            logs = logs.len(),
            "synced orderbook events"
        );
        Ok(Some(next_cursor))
    }

    async fn handle_make(&self, log: &RpcLog) -> Result<(), IndexError> {
        let event = abi::decode_make(log)?;
        let order_type = abi::classify_order_type(event.side, event.sale_kind);
        let order_id = format!("{:#x}", event.order_key);
        let price = wei_decimal(event.price)?;
        let size = i64::try_from(event.amount)
            .map_err(|_| IndexError::Numeric(format!("amount {}", event.amount)))?;

        let order = Order {
            order_id: order_id.clone(),
            collection_address: event.collection.to_checksum(None),
            token_id: event.token_id.to_string(),
            price,
            maker: event.maker.to_checksum(None),
            taker: zero_address(),
            order_status: OrderStatus::Active,
            order_type,
            quantity_remaining: size,
            size,
            expire_time: event.expiry as i64,
            event_time: unix_now(),
            salt: event.salt as i64,
            currency_address: self.currency_address.clone(),
            marketplace_id: MARKETPLACE_ORDERBOOK,
        };

        let block_time = self.chain_client.block_time(log.block_number).await?;
        let activity = Activity {
            activity_type: ActivityType::for_make(order_type),
            maker: order.maker.clone(),
            taker: zero_address(),
            marketplace_id: MARKETPLACE_ORDERBOOK,
            collection_address: order.collection_address.clone(),
            token_id: order.token_id.clone(),
            currency_address: self.currency_address.clone(),
            price,
            block_number: log.block_number as i64,
            tx_hash: format!("{:#x}", log.transaction_hash),
            log_index: log.log_index as i64,
            event_time: block_time as i64,
        };

        let mut tx = self.pool.begin().await?;
        let inserted = Order::insert_if_absent(&mut *tx, &self.chain, &order).await?;
        Activity::insert_if_absent(&mut *tx, &self.chain, &activity).await?;
        if inserted {
            self.store
                .push_new_listing(&NewListing {
                    order_id: order.order_id.clone(),
                    collection_address: order.collection_address.clone(),
                    token_id: order.token_id.clone(),
                    price,
                    maker: order.maker.clone(),
                    expire_time: order.expire_time,
                })
                .await?;
        } else {
            debug!(chain = %self.chain, order_id = %order_id, "replayed make event");
        }
        tx.commit().await?;

        Ok(())
    }

    async fn handle_cancel(&self, log: &RpcLog) -> Result<(), IndexError> {
        let event = abi::decode_cancel(log)?;
        let order_id = format!("{:#x}", event.order_key);

        let Some(order) = Order::get(&self.pool, &self.chain, &order_id).await? else {
            return Err(IndexError::MissingOrder(order_id));
        };
        let block_time = self.chain_client.block_time(log.block_number).await?;

        let mut tx = self.pool.begin().await?;
        let cancelled = Order::mark_cancelled(&mut *tx, &self.chain, &order_id).await?;
        if cancelled == 0 {
            // Filled and Cancelled are terminal; a late or replayed cancel
            // must not touch the row again.
            tx.commit().await?;
            debug!(chain = %self.chain, order_id = %order_id, "cancel for terminal order ignored");
            return Ok(());
        }

        let activity = Activity {
            activity_type: ActivityType::for_cancel(order.order_type),
            maker: order.maker.clone(),
            taker: zero_address(),
            marketplace_id: MARKETPLACE_ORDERBOOK,
            collection_address: order.collection_address.clone(),
            token_id: order.token_id.clone(),
            currency_address: self.currency_address.clone(),
            price: order.price,
            block_number: log.block_number as i64,
            tx_hash: format!("{:#x}", log.transaction_hash),
            log_index: log.log_index as i64,
            event_time: block_time as i64,
        };
        Activity::insert_if_absent(&mut *tx, &self.chain, &activity).await?;

        self.store
            .push_trade_event(&TradeEvent::Cancel {
                order_id: order.order_id.clone(),
                collection_addr: order.collection_address.clone(),
                token_id: order.token_id.clone(),
            })
            .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn handle_match(&self, log: &RpcLog) -> Result<(), IndexError> {
        let event = abi::decode_match(log)?;
        let sides = abi::split_match(&event);
        let sell_order_id = format!("{:#x}", sides.sell_order_id);
        let buy_order_id = format!("{:#x}", sides.buy_order_id);
        let buyer = sides.buyer.to_checksum(None);
        let collection_address = sides.collection.to_checksum(None);
        let token_id = sides.token_id.to_string();
        let fill_price = wei_decimal(event.fill_price)?;

        let Some(buy_order) = Order::get(&self.pool, &self.chain, &buy_order_id).await? else {
            return Err(IndexError::MissingOrder(buy_order_id));
        };
        let block_time = self.chain_client.block_time(log.block_number).await?;

        let activity = Activity {
            activity_type: ActivityType::Sale,
            maker: event.make_order.maker.to_checksum(None),
            taker: event.take_order.maker.to_checksum(None),
            marketplace_id: MARKETPLACE_ORDERBOOK,
            collection_address: collection_address.clone(),
            token_id: token_id.clone(),
            currency_address: self.currency_address.clone(),
            price: fill_price,
            block_number: log.block_number as i64,
            tx_hash: format!("{:#x}", log.transaction_hash),
            log_index: log.log_index as i64,
            event_time: block_time as i64,
        };

        let mut tx = self.pool.begin().await?;
        // The sale activity's (tx_hash, log_index) uniqueness doubles as the
        // first-delivery gate: a replayed match must not burn a second unit
        // of the buy order.
        let first_delivery = Activity::insert_if_absent(&mut *tx, &self.chain, &activity).await?;
        if !first_delivery {
            tx.commit().await?;
            debug!(chain = %self.chain, order_id = %sell_order_id, "replayed match event");
            return Ok(());
        }

        Order::mark_filled(&mut *tx, &self.chain, &sell_order_id, &buyer).await?;

        if buy_order.quantity_remaining > 1 {
            Order::set_quantity_remaining(
                &mut *tx,
                &self.chain,
                &buy_order_id,
                buy_order.quantity_remaining - 1,
            )
            .await?;
        } else {
            Order::mark_filled_out(&mut *tx, &self.chain, &buy_order_id).await?;
        }

        Item::update_owner(&mut *tx, &self.chain, &collection_address, &token_id, &buyer).await?;

        self.store
            .push_trade_event(&TradeEvent::Buy {
                order_id: sell_order_id,
                collection_addr: collection_address,
                token_id,
                from: sides.seller.to_checksum(None),
                to: buyer,
            })
            .await?;
        tx.commit().await?;

        Ok(())
    }
}

/// Confirmed block range for the next batch: `[cursor, min(head - depth,
/// cursor + SYNC_BLOCK_PERIOD)]`, or `None` while the cursor sits above the
/// confirmed head.
fn batch_range(last_synced: u64, head: u64, confirm_depth: u64) -> Option<(u64, u64)> {
    let safe_head = head.saturating_sub(confirm_depth);
    if last_synced > safe_head {
        return None;
    }
    Some((last_synced, safe_head.min(last_synced + SYNC_BLOCK_PERIOD)))
}

/// On-chain uint128 price to the fixed-point column type.
fn wei_decimal(value: u128) -> Result<Decimal, IndexError> {
    let value =
        i128::try_from(value).map_err(|_| IndexError::Numeric(format!("price {value}")))?;
    Decimal::try_from_i128_with_scale(value, 0)
        .map_err(|_| IndexError::Numeric(format!("price {value}")))
}

fn zero_address() -> String {
    format!("{:#x}", Address::ZERO)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn batch_never_extends_past_confirmed_head() {
        // head 100 with depth 2 confirms up to 98; cursor 90 scans [90, 98].
        assert_eq!(batch_range(90, 100, 2), Some((90, 98)));
    }

    #[test]
    fn batch_is_capped_at_sync_period() {
        assert_eq!(batch_range(0, 1_000, 1), Some((0, SYNC_BLOCK_PERIOD)));
    }

    #[test]
    fn no_batch_while_cursor_is_ahead_of_confirmed_head() {
        assert_eq!(batch_range(99, 100, 2), None);
        assert_eq!(batch_range(5, 3, 2), None);
        // Cursor exactly at the confirmed head scans that single block.
        assert_eq!(batch_range(98, 100, 2), Some((98, 98)));
    }

    #[test]
    fn confirm_depth_per_chain() {
        assert_eq!(confirm_depth("eth"), 1);
        assert_eq!(confirm_depth("arbitrum"), 2);
        assert_eq!(confirm_depth("base"), 2);
        assert_eq!(confirm_depth("zksync-era"), 2);
        assert_eq!(confirm_depth("somechain"), 2);
    }

    #[test]
    fn wei_prices_fit_decimal() {
        assert_eq!(wei_decimal(0).unwrap(), Decimal::ZERO);
        assert_eq!(
            wei_decimal(1_000_000_000_000_000_000).unwrap(),
            Decimal::from(1_000_000_000_000_000_000u64)
        );
        // Beyond Decimal's 96-bit mantissa.
        assert!(wei_decimal(u128::MAX).is_err());
    }

    #[test]
    fn zero_address_is_forty_zero_digits() {
        assert_eq!(zero_address(), format!("0x{}", "0".repeat(40)));
    }
}
