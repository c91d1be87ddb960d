use sqlx::SqliteConnection;

use crate::{db_types::ProductVariant, traits::StorefrontDbError};

/// Fetches the catalog projection for a variant. The engine never writes this table outside of
/// catalog sync and test seeding.
pub async fn fetch_variant(
    variant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ProductVariant>, StorefrontDbError> {
    let variant = sqlx::query_as::<_, ProductVariant>(
        r#"
            SELECT id, product_name, vendor_id, sale_price, stock_quantity, is_active
            FROM variants
            WHERE id = $1;
        "#,
    )
    .bind(variant_id)
    .fetch_optional(conn)
    .await?;
    Ok(variant)
}
