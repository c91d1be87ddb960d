use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Cart, CartItem, CartOwner},
    sqlite::db::variants,
    traits::StorefrontDbError,
};

pub async fn fetch_cart_by_owner(
    owner: &CartOwner,
    conn: &mut SqliteConnection,
) -> Result<Option<Cart>, StorefrontDbError> {
    let query = match owner {
        CartOwner::User(_) => "SELECT * FROM carts WHERE user_id = $1",
        CartOwner::Session(_) => "SELECT * FROM carts WHERE session_key = $1",
    };
    let mut q = sqlx::query_as::<_, Cart>(query);
    q = match owner {
        CartOwner::User(id) => q.bind(*id),
        CartOwner::Session(key) => q.bind(key.clone()),
    };
    let cart = q.fetch_optional(conn).await?;
    Ok(cart)
}

/// Carts are created lazily, on the first add for an identity.
pub async fn fetch_or_create_cart(owner: &CartOwner, conn: &mut SqliteConnection) -> Result<Cart, StorefrontDbError> {
    if let Some(cart) = fetch_cart_by_owner(owner, &mut *conn).await? {
        return Ok(cart);
    }
    let query = match owner {
        CartOwner::User(_) => "INSERT INTO carts (user_id) VALUES ($1) RETURNING *",
        CartOwner::Session(_) => "INSERT INTO carts (session_key) VALUES ($1) RETURNING *",
    };
    let mut q = sqlx::query_as::<_, Cart>(query);
    q = match owner {
        CartOwner::User(id) => q.bind(*id),
        CartOwner::Session(key) => q.bind(key.clone()),
    };
    let cart = q.fetch_one(conn).await?;
    debug!("🛒️ Created cart #{} for {owner}", cart.id);
    Ok(cart)
}

/// The cart's lines in insertion (line id) order.
pub async fn fetch_cart_items(cart_id: i64, conn: &mut SqliteConnection) -> Result<Vec<CartItem>, StorefrontDbError> {
    let items = sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY id")
        .bind(cart_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

async fn fetch_cart_line(
    cart_id: i64,
    variant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CartItem>, StorefrontDbError> {
    let item = sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE cart_id = $1 AND variant_id = $2")
        .bind(cart_id)
        .bind(variant_id)
        .fetch_optional(conn)
        .await?;
    Ok(item)
}

/// Inserts or adjusts the (cart, variant) line. The stock check runs against the *target*
/// quantity inside the caller's transaction, so two racing adds cannot overcommit the variant.
pub async fn upsert_cart_item(
    cart_id: i64,
    variant_id: i64,
    quantity: i64,
    override_quantity: bool,
    selections: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<CartItem, StorefrontDbError> {
    let variant = variants::fetch_variant(variant_id, &mut *conn)
        .await?
        .ok_or(StorefrontDbError::VariantNotFound(variant_id))?;
    let existing = fetch_cart_line(cart_id, variant_id, &mut *conn).await?;
    let target = match &existing {
        Some(line) if !override_quantity => line.quantity + quantity,
        _ => quantity,
    };
    if variant.stock_quantity < target {
        return Err(StorefrontDbError::InsufficientStock {
            variant_id,
            requested: target,
            available: variant.stock_quantity,
        });
    }
    let item = match existing {
        Some(line) => {
            sqlx::query_as::<_, CartItem>(
                "UPDATE cart_items SET quantity = $1, selections = COALESCE($2, selections) WHERE id = $3 RETURNING *",
            )
            .bind(target)
            .bind(selections)
            .bind(line.id)
            .fetch_one(conn)
            .await?
        },
        None => {
            sqlx::query_as::<_, CartItem>(
                "INSERT INTO cart_items (cart_id, variant_id, quantity, selections) VALUES ($1, $2, $3, $4) \
                 RETURNING *",
            )
            .bind(cart_id)
            .bind(variant_id)
            .bind(target)
            .bind(selections)
            .fetch_one(conn)
            .await?
        },
    };
    Ok(item)
}

/// Folds `source` into `dest`: matching variants sum their quantities, everything else is
/// re-parented, and the source cart is deleted. Call inside a transaction.
pub async fn merge_carts(source: i64, dest: i64, conn: &mut SqliteConnection) -> Result<(), StorefrontDbError> {
    let source_items = fetch_cart_items(source, &mut *conn).await?;
    for item in source_items {
        match fetch_cart_line(dest, item.variant_id, &mut *conn).await? {
            Some(existing) => {
                sqlx::query("UPDATE cart_items SET quantity = quantity + $1 WHERE id = $2")
                    .bind(item.quantity)
                    .bind(existing.id)
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("DELETE FROM cart_items WHERE id = $1").bind(item.id).execute(&mut *conn).await?;
            },
            None => {
                sqlx::query("UPDATE cart_items SET cart_id = $1 WHERE id = $2")
                    .bind(dest)
                    .bind(item.id)
                    .execute(&mut *conn)
                    .await?;
            },
        }
    }
    delete_cart(source, conn).await?;
    debug!("🛒️ Merged cart #{source} into cart #{dest}");
    Ok(())
}

pub async fn delete_cart(cart_id: i64, conn: &mut SqliteConnection) -> Result<(), StorefrontDbError> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart_id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM carts WHERE id = $1").bind(cart_id).execute(conn).await?;
    Ok(())
}
