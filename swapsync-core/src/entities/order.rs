use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{item_table, order_table};

/// Order lifecycle state as stored in the `order_status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[repr(i16)]
pub enum OrderStatus {
    Active = 0,
    Filled = 1,
    Cancelled = 2,
    Expired = 3,
}

/// Order kind as stored in the `order_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[repr(i16)]
pub enum OrderType {
    Listing = 1,
    CollectionBid = 2,
    ItemBid = 3,
}

/// One row of the per-chain order mirror.
///
/// `order_id` is the 32-byte on-chain order key, `0x`-prefixed lowercase hex.
/// `expire_time` of zero means the order never expires.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Order {
    pub order_id: String,
    pub collection_address: String,
    pub token_id: String,
    pub price: Decimal,
    pub maker: String,
    pub taker: String,
    pub order_status: OrderStatus,
    pub order_type: OrderType,
    pub quantity_remaining: i64,
    pub size: i64,
    pub expire_time: i64,
    pub event_time: i64,
    pub salt: i64,
    pub currency_address: String,
    pub marketplace_id: i16,
}

/// Slim projection used by the floor-price engine when (re)building a
/// collection's price window.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ListingRow {
    pub order_id: String,
    pub collection_address: String,
    pub token_id: String,
    pub maker: String,
    pub price: Decimal,
}

impl Order {
    /// Insert a freshly decoded order, ignoring replays.
    ///
    /// Returns `true` when the row was actually inserted, `false` when an
    /// order with the same id already existed (at-least-once delivery).
    pub async fn insert_if_absent(
        executor: impl sqlx::PgExecutor<'_>,
        chain: &str,
        order: &Order,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!(
            "INSERT INTO {} \
             (order_id, collection_address, token_id, price, maker, taker, \
              order_status, order_type, quantity_remaining, size, expire_time, \
              event_time, salt, currency_address, marketplace_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             ON CONFLICT (order_id) DO NOTHING",
            order_table(chain)
        );
        let result = sqlx::query(&sql)
            .bind(&order.order_id)
            .bind(&order.collection_address)
            .bind(&order.token_id)
            .bind(order.price)
            .bind(&order.maker)
            .bind(&order.taker)
            .bind(order.order_status)
            .bind(order.order_type)
            .bind(order.quantity_remaining)
            .bind(order.size)
            .bind(order.expire_time)
            .bind(order.event_time)
            .bind(order.salt)
            .bind(&order.currency_address)
            .bind(order.marketplace_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get(
        pool: &PgPool,
        chain: &str,
        order_id: &str,
    ) -> Result<Option<Order>, sqlx::Error> {
        let sql = format!(
            "SELECT order_id, collection_address, token_id, price, maker, taker, \
                    order_status, order_type, quantity_remaining, size, expire_time, \
                    event_time, salt, currency_address, marketplace_id \
             FROM {} WHERE order_id = $1",
            order_table(chain)
        );
        sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .fetch_optional(pool)
            .await
    }

    /// Cancel an order. Filled and Cancelled are terminal, so the update is
    /// scoped to rows that are still cancellable; returns the affected count
    /// so the caller can tell a replay from a real transition.
    pub async fn mark_cancelled(
        executor: impl sqlx::PgExecutor<'_>,
        chain: &str,
        order_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET order_status = $1 \
             WHERE order_id = $2 AND order_status IN ($3, $4)",
            order_table(chain)
        );
        let result = sqlx::query(&sql)
            .bind(OrderStatus::Cancelled)
            .bind(order_id)
            .bind(OrderStatus::Active)
            .bind(OrderStatus::Expired)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Fill the sell side of a match: terminal status, nothing left to sell,
    /// and the buyer recorded as taker.
    pub async fn mark_filled(
        executor: impl sqlx::PgExecutor<'_>,
        chain: &str,
        order_id: &str,
        taker: &str,
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET order_status = $1, quantity_remaining = 0, taker = $2 \
             WHERE order_id = $3",
            order_table(chain)
        );
        sqlx::query(&sql)
            .bind(OrderStatus::Filled)
            .bind(taker)
            .bind(order_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Fill the buy side once its last unit is consumed.
    pub async fn mark_filled_out(
        executor: impl sqlx::PgExecutor<'_>,
        chain: &str,
        order_id: &str,
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET order_status = $1, quantity_remaining = 0 WHERE order_id = $2",
            order_table(chain)
        );
        sqlx::query(&sql)
            .bind(OrderStatus::Filled)
            .bind(order_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn set_quantity_remaining(
        executor: impl sqlx::PgExecutor<'_>,
        chain: &str,
        order_id: &str,
        quantity_remaining: i64,
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET quantity_remaining = $1 WHERE order_id = $2",
            order_table(chain)
        );
        sqlx::query(&sql)
            .bind(quantity_remaining)
            .bind(order_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Expire an order only if it is still Active.
    ///
    /// The timer wheel keeps no cancel path, so a fired node may refer to an
    /// order that was matched or cancelled since insertion; the status guard
    /// makes such ticks no-ops. Returns the affected row count.
    pub async fn mark_expired_if_active(
        pool: &PgPool,
        chain: &str,
        order_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET order_status = $1 WHERE order_id = $2 AND order_status = $3",
            order_table(chain)
        );
        let result = sqlx::query(&sql)
            .bind(OrderStatus::Expired)
            .bind(order_id)
            .bind(OrderStatus::Active)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// The `limit` cheapest live listings of a collection, restricted to
    /// makers who still own the token (stale listings from past owners stay
    /// out of the floor window).
    ///
    /// Item rows key addresses in lowercase hex while order rows carry the
    /// checksummed form, hence the `LOWER()` on the join.
    pub async fn cheapest_active_listings(
        pool: &PgPool,
        chain: &str,
        collection_address: &str,
        now: i64,
        limit: i64,
    ) -> Result<Vec<ListingRow>, sqlx::Error> {
        let sql = format!(
            "SELECT co.order_id, co.collection_address, co.token_id, co.maker, co.price \
             FROM {items} ci \
             JOIN {orders} co ON ci.collection_address = LOWER(co.collection_address) \
                             AND ci.token_id = co.token_id \
             WHERE co.collection_address = $1 AND co.order_type = $2 \
               AND co.order_status = $3 AND (co.expire_time = 0 OR co.expire_time > $4) \
               AND ci.owner = LOWER(co.maker) \
             ORDER BY co.price ASC LIMIT $5",
            items = item_table(chain),
            orders = order_table(chain),
        );
        sqlx::query_as::<_, ListingRow>(&sql)
            .bind(collection_address)
            .bind(OrderType::Listing)
            .bind(OrderStatus::Active)
            .bind(now)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Live listings a specific maker has open in a collection. Used after a
    /// sale to pull the buyer's own listings into the floor window.
    pub async fn active_listings_by_maker(
        pool: &PgPool,
        chain: &str,
        collection_address: &str,
        maker: &str,
        now: i64,
        limit: i64,
    ) -> Result<Vec<ListingRow>, sqlx::Error> {
        let sql = format!(
            "SELECT order_id, collection_address, token_id, maker, price \
             FROM {} \
             WHERE collection_address = $1 AND maker = $2 AND order_type = $3 \
               AND order_status = $4 AND (expire_time = 0 OR expire_time > $5) \
             ORDER BY price ASC LIMIT $6",
            order_table(chain)
        );
        sqlx::query_as::<_, ListingRow>(&sql)
            .bind(collection_address)
            .bind(maker)
            .bind(OrderType::Listing)
            .bind(OrderStatus::Active)
            .bind(now)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Distinct listed tokens in a collection: Active, unexpired listings
    /// whose maker still owns the item, excluding `exclude_marketplace_id`.
    pub async fn count_listed(
        pool: &PgPool,
        chain: &str,
        collection_address: &str,
        now: i64,
        exclude_marketplace_id: i16,
    ) -> Result<i64, sqlx::Error> {
        let sql = format!(
            "SELECT COUNT(DISTINCT co.token_id) \
             FROM {items} ci \
             JOIN {orders} co ON ci.collection_address = LOWER(co.collection_address) \
                             AND ci.token_id = co.token_id \
             WHERE co.collection_address = $1 AND co.order_type = $2 \
               AND co.order_status = $3 AND (co.expire_time = 0 OR co.expire_time > $4) \
               AND ci.owner = LOWER(co.maker) AND co.marketplace_id != $5",
            items = item_table(chain),
            orders = order_table(chain),
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(collection_address)
            .bind(OrderType::Listing)
            .bind(OrderStatus::Active)
            .bind(now)
            .bind(exclude_marketplace_id)
            .fetch_one(pool)
            .await
    }
}
