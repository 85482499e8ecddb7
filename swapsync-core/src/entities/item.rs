use super::item_table;

/// One NFT. Items are created by the metadata pipeline; the sync core only
/// moves ownership when a sale is observed.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Item {
    pub collection_address: String,
    pub token_id: String,
    pub owner: String,
}

impl Item {
    /// Record the buyer as the new owner. Item rows key collections and
    /// owners in lowercase hex.
    pub async fn update_owner(
        executor: impl sqlx::PgExecutor<'_>,
        chain: &str,
        collection_address: &str,
        token_id: &str,
        owner: &str,
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            "UPDATE {} SET owner = $1 WHERE collection_address = $2 AND token_id = $3",
            item_table(chain)
        );
        sqlx::query(&sql)
            .bind(owner.to_lowercase())
            .bind(collection_address.to_lowercase())
            .bind(token_id)
            .execute(executor)
            .await?;
        Ok(())
    }
}
