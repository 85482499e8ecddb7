use sqlx::PgPool;

use super::indexed_status_table;

/// Index type of the orderbook event cursor.
pub const ORDERBOOK_EVENT_INDEX: i16 = 6;
/// Index type of the collection floor-price snapshot cursor.
pub const COLLECTION_FLOOR_INDEX: i16 = 7;

/// Per `(chain_id, index_type)` sync cursor.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IndexedStatus {
    pub chain_id: i64,
    pub index_type: i16,
    pub last_indexed_block: i64,
    pub last_indexed_time: i64,
}

impl IndexedStatus {
    /// Load the cursor row. A missing row is a deployment error and is
    /// surfaced as `RowNotFound` so startup can abort.
    pub async fn get(
        pool: &PgPool,
        chain_id: i64,
        index_type: i16,
    ) -> Result<IndexedStatus, sqlx::Error> {
        let sql = format!(
            "SELECT chain_id, index_type, last_indexed_block, last_indexed_time \
             FROM {} WHERE chain_id = $1 AND index_type = $2",
            indexed_status_table()
        );
        sqlx::query_as::<_, IndexedStatus>(&sql)
            .bind(chain_id)
            .bind(index_type)
            .fetch_one(pool)
            .await
    }

    /// Advance the block cursor after a fully persisted batch.
    pub async fn set_last_indexed_block(
        pool: &PgPool,
        chain_id: i64,
        index_type: i16,
        last_indexed_block: i64,
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET last_indexed_block = $1 WHERE chain_id = $2 AND index_type = $3",
            indexed_status_table()
        );
        sqlx::query(&sql)
            .bind(last_indexed_block)
            .bind(chain_id)
            .bind(index_type)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Stamp the wall-clock time of the latest successful pass.
    pub async fn set_last_indexed_time(
        pool: &PgPool,
        chain_id: i64,
        index_type: i16,
        last_indexed_time: i64,
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET last_indexed_time = $1 WHERE chain_id = $2 AND index_type = $3",
            indexed_status_table()
        );
        sqlx::query(&sql)
            .bind(last_indexed_time)
            .bind(chain_id)
            .bind(index_type)
            .execute(pool)
            .await?;
        Ok(())
    }
}
