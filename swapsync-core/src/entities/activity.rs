use rust_decimal::Decimal;

use super::activity_table;
use crate::entities::order::OrderType;

/// Kind of audit record, one per observed on-chain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[repr(i16)]
pub enum ActivityType {
    Listing = 1,
    CollectionBid = 2,
    ItemBid = 3,
    CancelListing = 4,
    CancelCollectionBid = 5,
    CancelItemBid = 6,
    Sale = 7,
}

impl ActivityType {
    /// Activity recorded when an order of the given type is created.
    pub fn for_make(order_type: OrderType) -> Self {
        match order_type {
            OrderType::Listing => ActivityType::Listing,
            OrderType::CollectionBid => ActivityType::CollectionBid,
            OrderType::ItemBid => ActivityType::ItemBid,
        }
    }

    /// Activity recorded when an order of the given type is cancelled.
    pub fn for_cancel(order_type: OrderType) -> Self {
        match order_type {
            OrderType::Listing => ActivityType::CancelListing,
            OrderType::CollectionBid => ActivityType::CancelCollectionBid,
            OrderType::ItemBid => ActivityType::CancelItemBid,
        }
    }
}

/// Append-only audit row. `(tx_hash, log_index)` is unique, so replayed
/// batches collapse into a single record.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Activity {
    pub activity_type: ActivityType,
    pub maker: String,
    pub taker: String,
    pub marketplace_id: i16,
    pub collection_address: String,
    pub token_id: String,
    pub currency_address: String,
    pub price: Decimal,
    pub block_number: i64,
    pub tx_hash: String,
    pub log_index: i64,
    pub event_time: i64,
}

impl Activity {
    /// Insert the activity, silently dropping duplicates.
    ///
    /// Returns `true` if the row was inserted, `false` on replay; the match
    /// handler uses this as its first-delivery gate.
    pub async fn insert_if_absent(
        executor: impl sqlx::PgExecutor<'_>,
        chain: &str,
        activity: &Activity,
    ) -> Result<bool, sqlx::Error> {
        let sql = format!(
            "INSERT INTO {} \
             (activity_type, maker, taker, marketplace_id, collection_address, \
              token_id, currency_address, price, block_number, tx_hash, log_index, \
              event_time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (tx_hash, log_index) DO NOTHING",
            activity_table(chain)
        );
        let result = sqlx::query(&sql)
            .bind(activity.activity_type)
            .bind(&activity.maker)
            .bind(&activity.taker)
            .bind(activity.marketplace_id)
            .bind(&activity.collection_address)
            .bind(&activity.token_id)
            .bind(&activity.currency_address)
            .bind(activity.price)
            .bind(activity.block_number)
            .bind(&activity.tx_hash)
            .bind(activity.log_index)
            .bind(activity.event_time)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_and_cancel_activity_classification() {
        assert_eq!(ActivityType::for_make(OrderType::Listing), ActivityType::Listing);
        assert_eq!(
            ActivityType::for_make(OrderType::CollectionBid),
            ActivityType::CollectionBid
        );
        assert_eq!(ActivityType::for_make(OrderType::ItemBid), ActivityType::ItemBid);

        assert_eq!(
            ActivityType::for_cancel(OrderType::Listing),
            ActivityType::CancelListing
        );
        assert_eq!(
            ActivityType::for_cancel(OrderType::CollectionBid),
            ActivityType::CancelCollectionBid
        );
        assert_eq!(
            ActivityType::for_cancel(OrderType::ItemBid),
            ActivityType::CancelItemBid
        );
    }
}
