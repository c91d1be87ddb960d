use bcg_common::Money;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Coupon, CouponRedemption, OrderItemDiscount},
    helpers::LineAllocation,
    traits::StorefrontDbError,
};

pub async fn fetch_coupon_by_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<Coupon>, StorefrontDbError> {
    let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE code = $1")
        .bind(code)
        .fetch_optional(conn)
        .await?;
    Ok(coupon)
}

/// Redemptions of the coupon across all orders except the given one. The exclusion lets a
/// re-apply on the same order supersede its own redemption instead of tripping the usage limit.
pub async fn count_redemptions(
    coupon_id: i64,
    exclude_order_pk: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, StorefrontDbError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM coupon_redemptions WHERE coupon_id = $1 AND order_pk != $2")
            .bind(coupon_id)
            .bind(exclude_order_pk)
            .fetch_one(conn)
            .await?;
    Ok(count)
}

pub async fn count_redemptions_for_user(
    coupon_id: i64,
    user_id: i64,
    exclude_order_pk: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, StorefrontDbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM coupon_redemptions WHERE coupon_id = $1 AND user_id = $2 AND order_pk != $3",
    )
    .bind(coupon_id)
    .bind(user_id)
    .bind(exclude_order_pk)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// (coupon_id, vendor_id) pairs currently redeemed against the order.
pub async fn fetch_redeemed_coupons(
    order_pk: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<(i64, i64)>, StorefrontDbError> {
    let rows = sqlx::query_as::<_, (i64, i64)>(
        "SELECT coupon_id, vendor_id FROM coupon_redemptions WHERE order_pk = $1 ORDER BY id",
    )
    .bind(order_pk)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn fetch_redemption(
    coupon_id: i64,
    order_pk: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CouponRedemption>, StorefrontDbError> {
    let redemption = sqlx::query_as::<_, CouponRedemption>(
        "SELECT * FROM coupon_redemptions WHERE coupon_id = $1 AND order_pk = $2",
    )
    .bind(coupon_id)
    .bind(order_pk)
    .fetch_optional(conn)
    .await?;
    Ok(redemption)
}

/// The allocation rows a coupon holds against an order's lines, in line order.
pub async fn fetch_allocations(
    coupon_id: i64,
    order_pk: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItemDiscount>, StorefrontDbError> {
    let rows = sqlx::query_as::<_, OrderItemDiscount>(
        r#"
            SELECT d.* FROM order_item_discounts d
            JOIN order_items i ON i.id = d.order_item_id
            WHERE d.coupon_id = $1 AND i.order_pk = $2
            ORDER BY d.order_item_id;
        "#,
    )
    .bind(coupon_id)
    .bind(order_pk)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Deletes every allocation row this coupon holds against the order's lines. Used both when
/// re-applying (supersede, never stack) and when removing.
pub async fn delete_allocations(
    coupon_id: i64,
    order_pk: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, StorefrontDbError> {
    let result = sqlx::query(
        r#"
            DELETE FROM order_item_discounts
            WHERE coupon_id = $1
              AND order_item_id IN (SELECT id FROM order_items WHERE order_pk = $2);
        "#,
    )
    .bind(coupon_id)
    .bind(order_pk)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn insert_allocation(
    allocation: &LineAllocation,
    coupon_id: i64,
    vendor_id: i64,
    conn: &mut SqliteConnection,
) -> Result<(), StorefrontDbError> {
    sqlx::query("INSERT INTO order_item_discounts (order_item_id, coupon_id, vendor_id, amount) VALUES ($1, $2, $3, $4)")
        .bind(allocation.order_item_id)
        .bind(coupon_id)
        .bind(vendor_id)
        .bind(allocation.amount)
        .execute(conn)
        .await?;
    Ok(())
}

/// Re-derives every line's `line_discount_total` from the allocation rows that survive, then
/// floors the net subtotal at zero. Self-healing: a line with no rows left drops to zero.
pub async fn rederive_line_discounts(order_pk: i64, conn: &mut SqliteConnection) -> Result<(), StorefrontDbError> {
    sqlx::query(
        r#"
            UPDATE order_items SET
                line_discount_total = COALESCE(
                    (SELECT SUM(amount) FROM order_item_discounts d WHERE d.order_item_id = order_items.id),
                    0
                )
            WHERE order_pk = $1;
        "#,
    )
    .bind(order_pk)
    .execute(&mut *conn)
    .await?;
    sqlx::query(
        r#"
            UPDATE order_items SET
                line_subtotal_net = MAX(unit_price * quantity - line_discount_total, 0)
            WHERE order_pk = $1;
        "#,
    )
    .bind(order_pk)
    .execute(conn)
    .await?;
    Ok(())
}

/// Upserts the redemption on its (coupon, order, vendor) key. A re-apply overwrites the discount
/// amount; concurrent applies collapse onto the single row instead of stacking.
pub async fn upsert_redemption(
    coupon_id: i64,
    order_pk: i64,
    user_id: i64,
    vendor_id: i64,
    discount_amount: Money,
    conn: &mut SqliteConnection,
) -> Result<(), StorefrontDbError> {
    sqlx::query(
        r#"
            INSERT INTO coupon_redemptions (coupon_id, order_pk, user_id, vendor_id, discount_amount)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (coupon_id, order_pk, vendor_id) DO UPDATE SET
                discount_amount = excluded.discount_amount,
                user_id = excluded.user_id,
                applied_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(coupon_id)
    .bind(order_pk)
    .bind(user_id)
    .bind(vendor_id)
    .bind(discount_amount)
    .execute(conn)
    .await?;
    trace!("🎟️ Redemption upserted for coupon #{coupon_id} on order pk {order_pk}: {discount_amount}");
    Ok(())
}

pub async fn delete_redemption(
    coupon_id: i64,
    order_pk: i64,
    conn: &mut SqliteConnection,
) -> Result<(), StorefrontDbError> {
    sqlx::query("DELETE FROM coupon_redemptions WHERE coupon_id = $1 AND order_pk = $2")
        .bind(coupon_id)
        .bind(order_pk)
        .execute(conn)
        .await?;
    Ok(())
}
