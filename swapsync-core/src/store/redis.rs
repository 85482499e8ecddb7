//! Redis adapter for the two durable queues and the collection caches.
//!
//! The queues are plain lists: producers `LPUSH`, the single consumer
//! `RPOP`s, so order is FIFO and survives restarts. Cache keys carry the
//! latest floor price and listed count per collection, written without TTL.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::events::{NewListing, TradeEvent};

/// Errors from queue or cache operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection or command error
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Payload did not round-trip through JSON
    #[error("payload codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Shared handle to the chain-scoped queues and caches.
///
/// `ConnectionManager` multiplexes and reconnects internally, so clones are
/// cheap and every worker holds its own copy.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    chain: String,
}

impl RedisStore {
    pub async fn connect(url: &str, chain: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            chain: chain.to_string(),
        })
    }

    fn orders_queue_key(&self) -> String {
        format!("cache:es:orders:{}", self.chain)
    }

    fn trade_queue_key(&self) -> String {
        format!("cache:es:trade:events:{}", self.chain)
    }

    fn listed_count_key(&self, collection_address: &str) -> String {
        format!(
            "cache:es:{}:collection:listed:{}",
            self.chain, collection_address
        )
    }

    fn floor_price_key(&self, collection_address: &str) -> String {
        format!(
            "cache:es:{}:collection:floor:{}",
            self.chain, collection_address
        )
    }

    /// Append a new-listing record for the listing worker.
    pub async fn push_new_listing(&self, listing: &NewListing) -> Result<(), StoreError> {
        let payload = serde_json::to_string(listing)?;
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(self.orders_queue_key(), payload).await?;
        Ok(())
    }

    /// Non-blocking pop of the oldest new-listing record.
    pub async fn pop_new_listing(&self) -> Result<Option<NewListing>, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.rpop(self.orders_queue_key(), None).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Append a trade event for the floor-price engine.
    pub async fn push_trade_event(&self, event: &TradeEvent) -> Result<(), StoreError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(self.trade_queue_key(), payload).await?;
        Ok(())
    }

    /// Non-blocking pop of the oldest trade event.
    pub async fn pop_trade_event(&self) -> Result<Option<TradeEvent>, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.rpop(self.trade_queue_key(), None).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Approximate depth of the trade-event queue, for operator logging.
    pub async fn trade_queue_len(&self) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(self.trade_queue_key()).await?)
    }

    /// Cache the listed count of a collection (no TTL).
    pub async fn set_listed_count(
        &self,
        collection_address: &str,
        count: i64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(self.listed_count_key(collection_address), count)
            .await?;
        Ok(())
    }

    /// Cache the floor price of a collection as a decimal string (no TTL).
    pub async fn set_floor_price(
        &self,
        collection_address: &str,
        floor_price: Decimal,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(self.floor_price_key(collection_address), floor_price.to_string())
            .await?;
        Ok(())
    }
}
