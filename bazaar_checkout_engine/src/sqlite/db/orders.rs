use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderItem, VendorLineSummary},
    helpers::{new_order_id, OrderTotals},
    traits::{PaidTransition, RateOption, StorefrontDbError},
};

const ORDER_ID_ATTEMPTS: u32 = 10;

/// Inserts the order row, retrying with fresh public ids on the (unlikely) collision with an
/// existing order.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StorefrontDbError> {
    let mut order_id = order.order_id.clone();
    for attempt in 0..ORDER_ID_ATTEMPTS {
        let result = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                order_id,
                buyer_id,
                currency,
                shipping_fee,
                courier_name,
                courier_code,
                courier_mode,
                etd_days
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
        )
        .bind(order_id.clone())
        .bind(order.buyer_id)
        .bind(order.currency.clone())
        .bind(order.shipping_fee)
        .bind(order.courier_name.clone())
        .bind(order.courier_code.clone())
        .bind(order.courier_mode.clone())
        .bind(order.etd_days)
        .fetch_one(&mut *conn)
        .await;
        match result {
            Ok(order) => {
                debug!("📦️ Order [{}] inserted with id {}", order.order_id, order.id);
                return Ok(order);
            },
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                trace!("📦️ Order id {order_id} already taken (attempt {attempt}), regenerating");
                order_id = new_order_id();
            },
            Err(e) => return Err(e.into()),
        }
    }
    Err(StorefrontDbError::OrderIdSpaceExhausted(ORDER_ID_ATTEMPTS))
}

async fn insert_order_items(
    order_pk: i64,
    lines: Vec<NewOrderItem>,
    conn: &mut SqliteConnection,
) -> Result<(), StorefrontDbError> {
    for line in lines {
        let gross = line.unit_price * line.quantity;
        sqlx::query(
            r#"
            INSERT INTO order_items (
                order_pk,
                variant_id,
                vendor_id,
                quantity,
                unit_price,
                line_subtotal_net,
                selections
            ) VALUES ($1, $2, $3, $4, $5, $6, $7);
        "#,
        )
        .bind(order_pk)
        .bind(line.variant_id)
        .bind(line.vendor_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(gross)
        .bind(line.selections)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Inserts the order and its frozen lines, then runs the totals recompute once. Not atomic on
/// its own; the caller wraps it in a transaction.
pub async fn insert_order_snapshot(
    order: NewOrder,
    lines: Vec<NewOrderItem>,
    conn: &mut SqliteConnection,
) -> Result<Order, StorefrontDbError> {
    let inserted = insert_order(order, &mut *conn).await?;
    insert_order_items(inserted.id, lines, &mut *conn).await?;
    recompute_order_totals(inserted.id, conn).await
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorefrontDbError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id.clone())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_pk(order_pk: i64, conn: &mut SqliteConnection) -> Result<Order, StorefrontDbError> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_pk)
        .fetch_optional(conn)
        .await?
        .ok_or(StorefrontDbError::OrderPkNotFound(order_pk))
}

/// The order's lines in line-id order. This is the deterministic order proration runs in.
pub async fn fetch_order_items(order_pk: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, StorefrontDbError> {
    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_pk = $1 ORDER BY id")
        .bind(order_pk)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Recomputes the layered totals from the current line state and writes them back. This is the
/// only code path that writes `item_total`, `item_discount_total`, `item_total_net` and
/// `amount_payable`. Idempotent; safe to call after every mutation.
pub async fn recompute_order_totals(order_pk: i64, conn: &mut SqliteConnection) -> Result<Order, StorefrontDbError> {
    let order = fetch_order_by_pk(order_pk, &mut *conn).await?;
    let lines = fetch_order_items(order_pk, &mut *conn).await?;
    let totals = OrderTotals::compute(&lines, order.shipping_fee);
    if !totals.is_consistent() {
        return Err(StorefrontDbError::IntegrityViolation(format!(
            "Totals for order {} are inconsistent: {totals:?}",
            order.order_id
        )));
    }
    let order = sqlx::query_as::<_, Order>(
        r#"
            UPDATE orders SET
                item_total = $1,
                item_discount_total = $2,
                item_total_net = $3,
                amount_payable = $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $5
            RETURNING *;
        "#,
    )
    .bind(totals.item_total)
    .bind(totals.item_discount_total)
    .bind(totals.item_total_net)
    .bind(totals.amount_payable)
    .bind(order_pk)
    .fetch_one(conn)
    .await?;
    trace!("📦️ Totals recomputed for order [{}]: payable {}", order.order_id, order.amount_payable);
    Ok(order)
}

/// Overwrites the frozen courier selection and shipping fee. The caller recomputes totals
/// afterwards (inside the same transaction).
pub async fn update_shipping_selection(
    order_pk: i64,
    rate: &RateOption,
    conn: &mut SqliteConnection,
) -> Result<(), StorefrontDbError> {
    sqlx::query(
        r#"
            UPDATE orders SET
                shipping_fee = $1,
                courier_name = $2,
                courier_code = $3,
                courier_mode = $4,
                etd_days = $5,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $6;
        "#,
    )
    .bind(rate.amount)
    .bind(rate.name.clone())
    .bind(rate.code.clone())
    .bind(rate.mode())
    .bind(rate.estimated_days)
    .bind(order_pk)
    .execute(conn)
    .await?;
    Ok(())
}

/// Stores the accepted gateway initiation and moves the order to Pending.
pub async fn record_payment_initiation(
    order_id: &OrderId,
    provider: &str,
    txn_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Order, StorefrontDbError> {
    sqlx::query(
        r#"
            UPDATE orders SET
                payment_provider = $1,
                payment_txn_id = $2,
                payment_status = 'Pending',
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $3;
        "#,
    )
    .bind(provider)
    .bind(txn_id)
    .bind(order_id.clone())
    .execute(&mut *conn)
    .await?;
    fetch_order_by_order_id(order_id, conn)
        .await?
        .ok_or_else(|| StorefrontDbError::OrderNotFound(order_id.clone()))
}

/// The guarded PAID transition, evaluated and written in a single statement. The affected-row
/// count decides the winner when Return and Webhook race; exactly one caller sees `won == true`.
pub async fn mark_order_paid(
    order_id: &OrderId,
    gateway_payment_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<PaidTransition, StorefrontDbError> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                payment_status = 'Paid',
                status = CASE WHEN status = 'Pending' THEN 'Processing' ELSE status END,
                gateway_payment_id = COALESCE($1, gateway_payment_id),
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND payment_status != 'Paid';
        "#,
    )
    .bind(gateway_payment_id)
    .bind(order_id.clone())
    .execute(&mut *conn)
    .await?;
    let won = result.rows_affected() > 0;
    let order = fetch_order_by_order_id(order_id, conn)
        .await?
        .ok_or_else(|| StorefrontDbError::OrderNotFound(order_id.clone()))?;
    if won {
        debug!("💳️ Order [{}] transitioned to Paid", order.order_id);
    } else {
        trace!("💳️ Order [{}] was already Paid; transition skipped", order.order_id);
    }
    Ok(PaidTransition { order, won })
}

/// Marks the order Failed unless it is already Paid. Paid is sticky.
pub async fn mark_order_failed(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Order, StorefrontDbError> {
    sqlx::query(
        r#"
            UPDATE orders SET
                payment_status = 'Failed',
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $1 AND payment_status != 'Paid';
        "#,
    )
    .bind(order_id.clone())
    .execute(&mut *conn)
    .await?;
    fetch_order_by_order_id(order_id, conn)
        .await?
        .ok_or_else(|| StorefrontDbError::OrderNotFound(order_id.clone()))
}

/// Per-vendor rollups for the notification fan-out.
pub async fn vendor_summaries(
    order_pk: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<VendorLineSummary>, StorefrontDbError> {
    let rows = sqlx::query_as::<_, VendorLineSummary>(
        r#"
            SELECT
                vendor_id,
                SUM(quantity) AS item_count,
                SUM(unit_price * quantity) AS gross,
                SUM(line_discount_total) AS discount
            FROM order_items
            WHERE order_pk = $1
            GROUP BY vendor_id
            ORDER BY vendor_id;
        "#,
    )
    .bind(order_pk)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
