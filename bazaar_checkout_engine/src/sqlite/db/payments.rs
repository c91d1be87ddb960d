use sqlx::SqliteConnection;

use crate::{
    db_types::{AuditKind, PaymentAuditEntry},
    traits::StorefrontDbError,
};

/// Appends a raw gateway exchange to the audit trail. Every leg of the conversation lands here,
/// whether or not it parsed or changed order state.
pub async fn append_audit(
    order_pk: i64,
    kind: AuditKind,
    payload: &serde_json::Value,
    conn: &mut SqliteConnection,
) -> Result<(), StorefrontDbError> {
    sqlx::query("INSERT INTO payment_audit (order_pk, kind, payload) VALUES ($1, $2, $3)")
        .bind(order_pk)
        .bind(kind)
        .bind(payload.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// The full audit trail for an order, in arrival order.
pub async fn fetch_audit_trail(
    order_pk: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentAuditEntry>, StorefrontDbError> {
    let rows = sqlx::query_as::<_, PaymentAuditEntry>("SELECT * FROM payment_audit WHERE order_pk = $1 ORDER BY id")
        .bind(order_pk)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}
