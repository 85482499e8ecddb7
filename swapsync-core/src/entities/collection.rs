use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{collection_floor_price_table, collection_table, item_table, order_table};
use crate::entities::order::{OrderStatus, OrderType};

/// Batch size for the floor-price snapshot upsert.
const BATCH_SIZE_LIMIT: usize = 500;

/// Per-contract aggregate record.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Collection {
    pub address: String,
    pub floor_price: Decimal,
    pub sale_price: Decimal,
    pub item_amount: i64,
    pub owner_amount: i64,
}

impl Collection {
    /// Addresses of every known collection on this chain. The floor engine
    /// warms its price windows from this list at startup.
    pub async fn list_addresses(pool: &PgPool, chain: &str) -> Result<Vec<String>, sqlx::Error> {
        let sql = format!("SELECT address FROM {}", collection_table(chain));
        sqlx::query_scalar::<_, String>(&sql).fetch_all(pool).await
    }

    pub async fn update_floor_price(
        pool: &PgPool,
        chain: &str,
        collection_address: &str,
        floor_price: Decimal,
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET floor_price = $1 WHERE address = $2",
            collection_table(chain)
        );
        sqlx::query(&sql)
            .bind(floor_price)
            .bind(collection_address)
            .execute(pool)
            .await?;
        Ok(())
    }
}

/// One timestamped floor-price observation, kept for the trend charts.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CollectionFloorPrice {
    pub collection_address: String,
    pub price: Decimal,
    pub event_time: i64,
}

impl CollectionFloorPrice {
    /// Current floor of every collection with at least one live listing:
    /// cheapest Active, unexpired listing whose maker still owns the item.
    pub async fn query_current(
        pool: &PgPool,
        chain: &str,
        now: i64,
    ) -> Result<Vec<CollectionFloorPrice>, sqlx::Error> {
        let sql = format!(
            "SELECT co.collection_address, MIN(co.price) AS price, $1::BIGINT AS event_time \
             FROM {items} ci \
             JOIN {orders} co ON ci.collection_address = LOWER(co.collection_address) \
                             AND ci.token_id = co.token_id \
             WHERE co.order_type = $2 AND co.order_status = $3 \
               AND (co.expire_time = 0 OR co.expire_time > $1) \
               AND ci.owner = LOWER(co.maker) \
             GROUP BY co.collection_address",
            items = item_table(chain),
            orders = order_table(chain),
        );
        sqlx::query_as::<_, CollectionFloorPrice>(&sql)
            .bind(now)
            .bind(OrderType::Listing)
            .bind(OrderStatus::Active)
            .fetch_all(pool)
            .await
    }

    /// Persist a snapshot batch, updating `update_time` on replayed rows.
    pub async fn insert_batch(
        pool: &PgPool,
        chain: &str,
        rows: &[CollectionFloorPrice],
        now_millis: i64,
    ) -> Result<(), sqlx::Error> {
        for chunk in rows.chunks(BATCH_SIZE_LIMIT) {
            let mut builder = sqlx::QueryBuilder::new(format!(
                "INSERT INTO {} (collection_address, price, event_time, create_time, update_time) ",
                collection_floor_price_table(chain)
            ));
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(&row.collection_address)
                    .push_bind(row.price)
                    .push_bind(row.event_time)
                    .push_bind(now_millis)
                    .push_bind(now_millis);
            });
            builder.push(
                " ON CONFLICT (collection_address, event_time) \
                 DO UPDATE SET update_time = EXCLUDED.update_time",
            );
            builder.build().execute(pool).await?;
        }
        Ok(())
    }

    /// Drop snapshot rows older than the retention window.
    pub async fn purge_older_than(
        pool: &PgPool,
        chain: &str,
        cutoff: i64,
    ) -> Result<u64, sqlx::Error> {
        let sql = format!(
            "DELETE FROM {} WHERE event_time < $1",
            collection_floor_price_table(chain)
        );
        let result = sqlx::query(&sql).bind(cutoff).execute(pool).await?;
        Ok(result.rows_affected())
    }
}
