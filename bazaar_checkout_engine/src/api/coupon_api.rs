use std::fmt::Debug;

use bcg_common::Money;
use chrono::Utc;
use log::*;

use crate::{
    api::errors::{CouponApiError, CouponRejection},
    db_types::{Coupon, Order, OrderId, OrderItem},
    helpers::{allocate_lines, vendor_discount, OrderTotals},
    traits::StorefrontDatabase,
};

/// Single-coupon policy toggles. These live in external configuration and are passed in
/// explicitly by the caller; the engine itself places no limit on coupons per order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CouponPolicy {
    pub single_coupon_per_order: bool,
    pub single_coupon_per_vendor: bool,
}

/// The result of a successful application: what was granted, and the refreshed totals tuple.
#[derive(Debug, Clone)]
pub struct AppliedDiscount {
    pub code: String,
    pub vendor_id: i64,
    pub discount: Money,
    pub totals: OrderTotals,
}

/// `CouponApi` validates a coupon against an order, prorates the vendor-scoped discount across
/// the vendor's lines with exact-cent arithmetic, and persists or reverses the allocation
/// idempotently.
pub struct CouponApi<B> {
    db: B,
}

impl<B> Debug for CouponApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CouponApi")
    }
}

impl<B> CouponApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> CouponApi<B>
where B: StorefrontDatabase
{
    /// Applies `code` to the order on behalf of `user_id`.
    ///
    /// Validation short-circuits on the first failure, in this order: coupon live → vendor has
    /// lines in the order → total usage limit → per-user usage limit → vendor minimum → positive
    /// discount. Nothing is written when a validation fails. Re-applying the same coupon
    /// supersedes the earlier allocation rather than stacking; applying twice in a row leaves
    /// totals unchanged.
    pub async fn apply(&self, order_id: &OrderId, code: &str, user_id: i64) -> Result<AppliedDiscount, CouponApiError> {
        let order = self.fetch_order(order_id).await?;
        let coupon = self.fetch_coupon(code).await?;
        let vendor_lines = self.validate(&order, &coupon, user_id).await?;

        let vendor_gross: Money = vendor_lines.iter().map(OrderItem::line_gross).sum();
        let discount = vendor_discount(&coupon, vendor_gross);
        if !discount.is_positive() {
            return Err(CouponRejection::NoDiscount.into());
        }
        let line_pairs: Vec<(i64, Money)> = vendor_lines.iter().map(|l| (l.id, l.line_gross())).collect();
        let allocations = allocate_lines(&coupon, discount, &line_pairs, vendor_gross)?;

        let order = self.db.apply_coupon_allocations(order.id, &coupon, user_id, discount, &allocations).await?;
        info!("🎟️ Coupon {code} granted {discount} on order [{}] for vendor #{}", order.order_id, coupon.vendor_id);
        Ok(AppliedDiscount {
            code: coupon.code,
            vendor_id: coupon.vendor_id,
            discount,
            totals: OrderTotals::of_order(&order),
        })
    }

    /// As [`Self::apply`], but first enforces the caller's single-coupon policy toggles.
    pub async fn apply_with_policy(
        &self,
        order_id: &OrderId,
        code: &str,
        user_id: i64,
        policy: CouponPolicy,
    ) -> Result<AppliedDiscount, CouponApiError> {
        if policy.single_coupon_per_order || policy.single_coupon_per_vendor {
            let order = self.fetch_order(order_id).await?;
            let coupon = self.fetch_coupon(code).await?;
            let redeemed = self.db.fetch_redeemed_coupons(order.id).await?;
            if policy.single_coupon_per_order && redeemed.iter().any(|(cid, _)| *cid != coupon.id) {
                return Err(CouponRejection::SingleCouponPerOrder.into());
            }
            if policy.single_coupon_per_vendor
                && redeemed.iter().any(|(cid, vid)| *cid != coupon.id && *vid == coupon.vendor_id)
            {
                return Err(CouponRejection::SingleCouponPerVendor.into());
            }
        }
        self.apply(order_id, code, user_id).await
    }

    /// Removes the coupon's allocation from the order and restores the totals to their pre-apply
    /// values. Removing a coupon that was never applied is a no-op success.
    pub async fn remove(&self, order_id: &OrderId, code: &str) -> Result<OrderTotals, CouponApiError> {
        let order = self.fetch_order(order_id).await?;
        let coupon = self.fetch_coupon(code).await?;
        let (order, was_applied) = self.db.remove_coupon_allocations(order.id, &coupon).await?;
        if was_applied {
            info!("🎟️ Coupon {code} removed from order [{}]", order.order_id);
        } else {
            trace!("🎟️ Coupon {code} was not applied to order [{}]; nothing to remove", order.order_id);
        }
        Ok(OrderTotals::of_order(&order))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, CouponApiError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| CouponApiError::OrderNotFound(order_id.clone()))
    }

    async fn fetch_coupon(&self, code: &str) -> Result<Coupon, CouponApiError> {
        self.db.fetch_coupon_by_code(code).await?.ok_or(CouponApiError::Rejected(CouponRejection::NotFound))
    }

    /// The validation ladder. Returns the vendor's lines (in proration order) on success.
    async fn validate(
        &self,
        order: &Order,
        coupon: &Coupon,
        user_id: i64,
    ) -> Result<Vec<OrderItem>, CouponApiError> {
        if !coupon.is_live(Utc::now()) {
            return Err(CouponRejection::NotLive.into());
        }
        let items = self.db.fetch_order_items(order.id).await?;
        let vendor_lines: Vec<OrderItem> = items.into_iter().filter(|l| l.vendor_id == coupon.vendor_id).collect();
        if vendor_lines.is_empty() {
            return Err(CouponRejection::VendorNotInOrder.into());
        }
        // Usage counts exclude this order's own redemption, so a re-apply supersedes instead of
        // tripping the limit it already consumed.
        if let Some(limit) = coupon.usage_limit_total {
            if self.db.count_redemptions(coupon.id, order.id).await? >= limit {
                return Err(CouponRejection::UsageLimitReached.into());
            }
        }
        if let Some(limit) = coupon.usage_limit_per_user {
            if self.db.count_redemptions_for_user(coupon.id, user_id, order.id).await? >= limit {
                return Err(CouponRejection::PerUserLimitReached.into());
            }
        }
        let vendor_gross: Money = vendor_lines.iter().map(OrderItem::line_gross).sum();
        if vendor_gross < coupon.min_order_amount {
            return Err(CouponRejection::MinimumNotMet {
                required: coupon.min_order_amount,
                subtotal: vendor_gross,
            }
            .into());
        }
        Ok(vendor_lines)
    }
}
