//! `SqliteDatabase` is the concrete storage backend for the checkout engine.
//!
//! It implements [`StorefrontDatabase`] over a SQLite pool. Every multi-row mutation opens one
//! transaction and passes the connection through the low-level functions in [`db`], so a failure
//! in any step rolls the whole flow back. SQLite serializes writers, which gives the
//! read-check-write sequences here the same effect row locks provide on bigger engines.
pub mod db;

use std::fmt::Debug;

use bcg_common::Money;
use log::*;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::{
    db_types::{
        AuditKind,
        Cart,
        CartItem,
        CartOwner,
        Coupon,
        NewNotification,
        NewOrder,
        NewOrderItem,
        Order,
        OrderId,
        OrderItem,
        ProductVariant,
        VendorLineSummary,
    },
    helpers::LineAllocation,
    traits::{PaidTransition, RateOption, StorefrontDatabase, StorefrontDbError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, StorefrontDbError> {
        let pool = db::new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies any pending schema migrations. The server calls this at startup; tests call it
    /// through `test_utils`.
    pub async fn run_migrations(&self) -> Result<(), StorefrontDbError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorefrontDbError::DatabaseError(e.to_string()))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

impl StorefrontDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_or_create_cart(&self, owner: &CartOwner) -> Result<Cart, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let cart = db::carts::fetch_or_create_cart(owner, &mut tx).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn fetch_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        db::carts::fetch_cart_by_owner(owner, &mut conn).await
    }

    async fn fetch_cart_items(&self, cart_id: i64) -> Result<Vec<CartItem>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        db::carts::fetch_cart_items(cart_id, &mut conn).await
    }

    async fn upsert_cart_item(
        &self,
        cart_id: i64,
        variant_id: i64,
        quantity: i64,
        override_quantity: bool,
        selections: Option<String>,
    ) -> Result<CartItem, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let item =
            db::carts::upsert_cart_item(cart_id, variant_id, quantity, override_quantity, selections, &mut tx).await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn merge_carts(&self, source_cart_id: i64, dest_cart_id: i64) -> Result<(), StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        db::carts::merge_carts(source_cart_id, dest_cart_id, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_cart(&self, cart_id: i64) -> Result<(), StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        db::carts::delete_cart(cart_id, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_variant(&self, variant_id: i64) -> Result<Option<ProductVariant>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        db::variants::fetch_variant(variant_id, &mut conn).await
    }

    async fn insert_order_snapshot(
        &self,
        order: NewOrder,
        lines: Vec<NewOrderItem>,
    ) -> Result<Order, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let order = db::orders::insert_order_snapshot(order, lines, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::fetch_order_by_order_id(order_id, &mut conn).await
    }

    async fn fetch_order_items(&self, order_pk: i64) -> Result<Vec<OrderItem>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::fetch_order_items(order_pk, &mut conn).await
    }

    async fn assign_shipping(&self, order_id: &OrderId, rate: &RateOption) -> Result<Order, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let order = db::orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| StorefrontDbError::OrderNotFound(order_id.clone()))?;
        db::orders::update_shipping_selection(order.id, rate, &mut tx).await?;
        let order = db::orders::recompute_order_totals(order.id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        db::coupons::fetch_coupon_by_code(code, &mut conn).await
    }

    async fn count_redemptions(&self, coupon_id: i64, exclude_order_pk: i64) -> Result<i64, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        db::coupons::count_redemptions(coupon_id, exclude_order_pk, &mut conn).await
    }

    async fn count_redemptions_for_user(
        &self,
        coupon_id: i64,
        user_id: i64,
        exclude_order_pk: i64,
    ) -> Result<i64, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        db::coupons::count_redemptions_for_user(coupon_id, user_id, exclude_order_pk, &mut conn).await
    }

    async fn fetch_redeemed_coupons(&self, order_pk: i64) -> Result<Vec<(i64, i64)>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        db::coupons::fetch_redeemed_coupons(order_pk, &mut conn).await
    }

    async fn apply_coupon_allocations(
        &self,
        order_pk: i64,
        coupon: &Coupon,
        user_id: i64,
        discount: Money,
        allocations: &[LineAllocation],
    ) -> Result<Order, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        // Supersede, never stack: any allocation this coupon already holds against the order is
        // removed before the fresh rows land.
        db::coupons::delete_allocations(coupon.id, order_pk, &mut tx).await?;
        for allocation in allocations.iter().filter(|a| a.amount.is_positive()) {
            db::coupons::insert_allocation(allocation, coupon.id, coupon.vendor_id, &mut tx).await?;
        }
        db::coupons::rederive_line_discounts(order_pk, &mut tx).await?;
        db::coupons::upsert_redemption(coupon.id, order_pk, user_id, coupon.vendor_id, discount, &mut tx).await?;
        let order = db::orders::recompute_order_totals(order_pk, &mut tx).await?;
        tx.commit().await?;
        debug!("🎟️ Coupon {} applied to order [{}]: {}", coupon.code, order.order_id, discount);
        Ok(order)
    }

    async fn remove_coupon_allocations(
        &self,
        order_pk: i64,
        coupon: &Coupon,
    ) -> Result<(Order, bool), StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let redemption = db::coupons::fetch_redemption(coupon.id, order_pk, &mut tx).await?;
        if redemption.is_none() {
            // Removing a coupon that was never applied is a no-op success.
            let order = db::orders::fetch_order_by_pk(order_pk, &mut tx).await?;
            tx.commit().await?;
            return Ok((order, false));
        }
        db::coupons::delete_allocations(coupon.id, order_pk, &mut tx).await?;
        db::coupons::delete_redemption(coupon.id, order_pk, &mut tx).await?;
        db::coupons::rederive_line_discounts(order_pk, &mut tx).await?;
        let order = db::orders::recompute_order_totals(order_pk, &mut tx).await?;
        tx.commit().await?;
        debug!("🎟️ Coupon {} removed from order [{}]", coupon.code, order.order_id);
        Ok((order, true))
    }

    async fn record_payment_initiation(
        &self,
        order_id: &OrderId,
        provider: &str,
        txn_id: &str,
    ) -> Result<Order, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let order = db::orders::record_payment_initiation(order_id, provider, txn_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        gateway_payment_id: Option<&str>,
    ) -> Result<PaidTransition, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let transition = db::orders::mark_order_paid(order_id, gateway_payment_id, &mut tx).await?;
        tx.commit().await?;
        Ok(transition)
    }

    async fn mark_order_failed(&self, order_id: &OrderId) -> Result<Order, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let order = db::orders::mark_order_failed(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn append_payment_audit(
        &self,
        order_pk: i64,
        kind: AuditKind,
        payload: &Value,
    ) -> Result<(), StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        db::payments::append_audit(order_pk, kind, payload, &mut conn).await
    }

    async fn notify_once(&self, notification: NewNotification) -> Result<bool, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        db::notifications::notify_once(notification, &mut conn).await
    }

    async fn vendor_summaries(&self, order_pk: i64) -> Result<Vec<VendorLineSummary>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::vendor_summaries(order_pk, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), StorefrontDbError> {
        self.pool.close().await;
        Ok(())
    }
}
