use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewNotification, Notification},
    traits::StorefrontDbError,
};

/// Inserts the notification unless a row with the same (recipient, title, order) already exists.
/// The unique index makes this safe under racing entry points: at most one row lands, and the
/// return value says whether this call was the one that landed it.
pub async fn notify_once(
    notification: NewNotification,
    conn: &mut SqliteConnection,
) -> Result<bool, StorefrontDbError> {
    let result = sqlx::query(
        r#"
            INSERT OR IGNORE INTO notifications (recipient_id, ntype, level, title, message, order_pk)
            VALUES ($1, $2, $3, $4, $5, $6);
        "#,
    )
    .bind(notification.recipient_id)
    .bind(notification.ntype.clone())
    .bind(notification.level)
    .bind(notification.title.clone())
    .bind(notification.message.clone())
    .bind(notification.order_pk)
    .execute(conn)
    .await?;
    let inserted = result.rows_affected() > 0;
    if !inserted {
        trace!(
            "📬️ Duplicate notification suppressed for recipient #{} on order pk {}",
            notification.recipient_id,
            notification.order_pk
        );
    }
    Ok(inserted)
}

/// A recipient's notifications, newest last.
pub async fn fetch_for_recipient(
    recipient_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, StorefrontDbError> {
    let rows = sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE recipient_id = $1 ORDER BY id")
        .bind(recipient_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}
