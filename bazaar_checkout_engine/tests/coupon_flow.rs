//! Coupon allocation behaviour: the validation ladder, exact-cent proration, idempotent
//! re-apply, and exact reversal.
mod support;

use bazaar_checkout_engine::{
    db_types::{CartOwner, Order, OrderId},
    traits::RateOption,
    CartApi,
    CheckoutApi,
    CouponApi,
    CouponApiError,
    CouponPolicy,
    CouponRejection,
    SqliteDatabase,
};
use bcg_common::Money;
use chrono::{Duration, Utc};
use support::{seed_coupon, seed_variant, setup, tear_down, CouponSeed};

const VENDOR_A: i64 = 7;
const VENDOR_B: i64 = 8;
const BUYER: i64 = 21;

fn rate(cents: i64) -> RateOption {
    RateOption {
        name: "Delhivery Surface".to_string(),
        code: "DL-SF".to_string(),
        amount: Money::from_cents(cents),
        currency: "INR".to_string(),
        estimated_days: Some(4),
    }
}

/// An order with two Vendor-A lines: ₹40×1 and ₹15×2 (vendor gross ₹70), plus ₹50 shipping.
async fn two_line_order(db: &SqliteDatabase) -> Order {
    let cart_api = CartApi::new(db.clone());
    let checkout = CheckoutApi::new(db.clone());
    let owner = CartOwner::User(BUYER);
    let v1 = seed_variant(db, "Kurta", VENDOR_A, Money::from_rupees(40), 10).await;
    let v2 = seed_variant(db, "Stole", VENDOR_A, Money::from_rupees(15), 10).await;
    cart_api.add_item(&owner, v1, 1, false, None).await.expect("add");
    cart_api.add_item(&owner, v2, 2, false, None).await.expect("add");
    checkout.begin_checkout(&owner, BUYER, &rate(5_000)).await.expect("checkout")
}

async fn allocation_sum(db: &SqliteDatabase, coupon_id: i64, order_pk: i64) -> i64 {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    bazaar_checkout_engine::sqlite::db::coupons::fetch_allocations(coupon_id, order_pk, &mut conn)
        .await
        .expect("Error fetching allocations")
        .iter()
        .map(|a| a.amount.cents())
        .sum()
}

async fn redemption_amount(db: &SqliteDatabase, coupon_id: i64, order_pk: i64) -> Option<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT discount_amount FROM coupon_redemptions WHERE coupon_id = $1 AND order_pk = $2",
    )
    .bind(coupon_id)
    .bind(order_pk)
    .fetch_optional(db.pool())
    .await
    .expect("Error fetching redemption")
}

#[tokio::test]
async fn fixed_coupon_prorates_with_remainder_to_last() {
    let db = setup().await;
    let order = two_line_order(&db).await;
    let coupon_id = seed_coupon(&db, CouponSeed::fixed("SAVE10", VENDOR_A, Money::from_rupees(10))).await;
    let api = CouponApi::new(db.clone());

    let applied = api.apply(&order.order_id, "SAVE10", BUYER).await.expect("Error applying coupon");
    assert_eq!(applied.discount, Money::from_rupees(10));
    assert_eq!(applied.totals.item_total, Money::from_rupees(70));
    assert_eq!(applied.totals.item_discount_total, Money::from_rupees(10));
    assert_eq!(applied.totals.item_total_net, Money::from_rupees(60));
    assert_eq!(applied.totals.amount_payable, Money::from_rupees(110));

    // 10 × 40/70 → ₹5.71 on the first line; the last line takes the exact remainder ₹4.29.
    let lines = CheckoutApi::new(db.clone()).fetch_order_items(&order.order_id).await.expect("lines");
    assert_eq!(lines[0].line_discount_total, Money::from_cents(571));
    assert_eq!(lines[1].line_discount_total, Money::from_cents(429));
    assert_eq!(lines[0].line_subtotal_net, Money::from_cents(3_429));
    assert_eq!(lines[1].line_subtotal_net, Money::from_cents(2_571));

    // Σ allocation rows == the redemption's discount, to the cent.
    assert_eq!(allocation_sum(&db, coupon_id, order.id).await, 1_000);
    assert_eq!(redemption_amount(&db, coupon_id, order.id).await, Some(1_000));
    tear_down(db).await;
}

#[tokio::test]
async fn percent_coupon_discounts_twenty_percent() {
    let db = setup().await;
    let order = two_line_order(&db).await;
    let coupon_id = seed_coupon(&db, CouponSeed::percent("FEST20", VENDOR_A, 2_000)).await;
    let api = CouponApi::new(db.clone());

    let applied = api.apply(&order.order_id, "FEST20", BUYER).await.expect("Error applying coupon");
    assert_eq!(applied.discount, Money::from_rupees(14));
    assert_eq!(applied.totals.item_total_net, Money::from_rupees(56));
    assert_eq!(applied.totals.amount_payable, Money::from_rupees(106));

    let lines = CheckoutApi::new(db.clone()).fetch_order_items(&order.order_id).await.expect("lines");
    assert_eq!(lines[0].line_discount_total, Money::from_rupees(8));
    assert_eq!(lines[1].line_discount_total, Money::from_rupees(6));
    assert_eq!(allocation_sum(&db, coupon_id, order.id).await, 1_400);
    tear_down(db).await;
}

#[tokio::test]
async fn below_minimum_rejects_without_writing() {
    let db = setup().await;
    let order = two_line_order(&db).await;
    let coupon_id =
        seed_coupon(&db, CouponSeed::fixed("BIG", VENDOR_A, Money::from_rupees(10)).with_min_order(Money::from_rupees(100)))
            .await;
    let api = CouponApi::new(db.clone());

    let err = api.apply(&order.order_id, "BIG", BUYER).await.expect_err("Apply should be rejected");
    assert!(matches!(err, CouponApiError::Rejected(CouponRejection::MinimumNotMet { .. })));

    // No rows written, totals untouched.
    assert_eq!(redemption_amount(&db, coupon_id, order.id).await, None);
    assert_eq!(allocation_sum(&db, coupon_id, order.id).await, 0);
    let totals = CheckoutApi::new(db.clone()).order_totals(&order.order_id).await.expect("totals");
    assert_eq!(totals.item_discount_total, Money::ZERO);
    assert_eq!(totals.amount_payable, Money::from_rupees(120));
    tear_down(db).await;
}

#[tokio::test]
async fn validation_ladder_rejections() {
    let db = setup().await;
    let order = two_line_order(&db).await;
    let api = CouponApi::new(db.clone());

    seed_coupon(&db, CouponSeed::fixed("GONE", VENDOR_A, Money::from_rupees(5)).inactive()).await;
    seed_coupon(
        &db,
        CouponSeed::fixed("EARLY", VENDOR_A, Money::from_rupees(5))
            .with_window(Some(Utc::now() + Duration::days(1)), None),
    )
    .await;
    seed_coupon(
        &db,
        CouponSeed::fixed("LATE", VENDOR_A, Money::from_rupees(5))
            .with_window(None, Some(Utc::now() - Duration::days(1))),
    )
    .await;
    seed_coupon(&db, CouponSeed::fixed("OTHERV", VENDOR_B, Money::from_rupees(5))).await;
    seed_coupon(&db, CouponSeed::percent("ZILCH", VENDOR_A, 0)).await;

    let reject = |r: Result<_, CouponApiError>| match r {
        Err(CouponApiError::Rejected(reason)) => reason,
        other => panic!("Expected rejection, got {other:?}"),
    };
    assert_eq!(reject(api.apply(&order.order_id, "NOSUCH", BUYER).await), CouponRejection::NotFound);
    assert_eq!(reject(api.apply(&order.order_id, "GONE", BUYER).await), CouponRejection::NotLive);
    assert_eq!(reject(api.apply(&order.order_id, "EARLY", BUYER).await), CouponRejection::NotLive);
    assert_eq!(reject(api.apply(&order.order_id, "LATE", BUYER).await), CouponRejection::NotLive);
    assert_eq!(reject(api.apply(&order.order_id, "OTHERV", BUYER).await), CouponRejection::VendorNotInOrder);
    assert_eq!(reject(api.apply(&order.order_id, "ZILCH", BUYER).await), CouponRejection::NoDiscount);
    tear_down(db).await;
}

#[tokio::test]
async fn usage_limits_count_other_orders_only() {
    let db = setup().await;
    let order = two_line_order(&db).await;
    seed_coupon(&db, CouponSeed::fixed("ONCE", VENDOR_A, Money::from_rupees(5)).with_usage_limits(Some(1), Some(1)))
        .await;
    let api = CouponApi::new(db.clone());

    // First use is fine, and re-applying to the same order must not trip the limit the first
    // application consumed.
    api.apply(&order.order_id, "ONCE", BUYER).await.expect("First apply");
    api.apply(&order.order_id, "ONCE", BUYER).await.expect("Re-apply to the same order");

    // A second order runs into both the global and the per-user limit.
    let second = two_line_order(&db).await;
    let err = api.apply(&second.order_id, "ONCE", BUYER).await.expect_err("Limit should be hit");
    assert!(matches!(err, CouponApiError::Rejected(CouponRejection::UsageLimitReached)));
    tear_down(db).await;
}

#[tokio::test]
async fn double_apply_is_idempotent_and_remove_restores_exactly() {
    let db = setup().await;
    let order = two_line_order(&db).await;
    let coupon_id = seed_coupon(&db, CouponSeed::fixed("SAVE10", VENDOR_A, Money::from_rupees(10))).await;
    let api = CouponApi::new(db.clone());
    let checkout = CheckoutApi::new(db.clone());

    let before = checkout.order_totals(&order.order_id).await.expect("totals");
    let first = api.apply(&order.order_id, "SAVE10", BUYER).await.expect("first apply");
    let second = api.apply(&order.order_id, "SAVE10", BUYER).await.expect("second apply");
    assert_eq!(first.totals, second.totals);
    // Allocations supersede, never stack.
    assert_eq!(allocation_sum(&db, coupon_id, order.id).await, 1_000);

    let restored = api.remove(&order.order_id, "SAVE10").await.expect("remove");
    assert_eq!(restored, before);
    assert_eq!(allocation_sum(&db, coupon_id, order.id).await, 0);
    assert_eq!(redemption_amount(&db, coupon_id, order.id).await, None);

    // Removing again (never applied any more) is a no-op success.
    let still = api.remove(&order.order_id, "SAVE10").await.expect("no-op remove");
    assert_eq!(still, before);
    tear_down(db).await;
}

#[tokio::test]
async fn coupons_from_different_vendors_coexist_unless_policy_forbids() {
    let db = setup().await;
    let cart_api = CartApi::new(db.clone());
    let checkout = CheckoutApi::new(db.clone());
    let owner = CartOwner::User(BUYER);
    let v_a = seed_variant(&db, "Kurta", VENDOR_A, Money::from_rupees(40), 10).await;
    let v_b = seed_variant(&db, "Jutti", VENDOR_B, Money::from_rupees(60), 10).await;
    cart_api.add_item(&owner, v_a, 1, false, None).await.expect("add");
    cart_api.add_item(&owner, v_b, 1, false, None).await.expect("add");
    let order = checkout.begin_checkout(&owner, BUYER, &rate(0)).await.expect("checkout");

    seed_coupon(&db, CouponSeed::fixed("A5", VENDOR_A, Money::from_rupees(5))).await;
    seed_coupon(&db, CouponSeed::fixed("B6", VENDOR_B, Money::from_rupees(6))).await;
    seed_coupon(&db, CouponSeed::fixed("A2", VENDOR_A, Money::from_rupees(2))).await;
    let api = CouponApi::new(db.clone());

    // With no policy, one coupon per vendor stacks across vendors.
    api.apply(&order.order_id, "A5", BUYER).await.expect("vendor A coupon");
    let applied = api.apply(&order.order_id, "B6", BUYER).await.expect("vendor B coupon");
    assert_eq!(applied.totals.item_discount_total, Money::from_rupees(11));
    assert_eq!(applied.totals.item_total_net, Money::from_rupees(89));

    // Single-coupon-per-order forbids adding any different coupon.
    let policy = CouponPolicy { single_coupon_per_order: true, single_coupon_per_vendor: false };
    let err = api.apply_with_policy(&order.order_id, "A2", BUYER, policy).await.expect_err("policy");
    assert!(matches!(err, CouponApiError::Rejected(CouponRejection::SingleCouponPerOrder)));

    // Single-coupon-per-vendor only forbids a second coupon for the same vendor.
    let policy = CouponPolicy { single_coupon_per_order: false, single_coupon_per_vendor: true };
    let err = api.apply_with_policy(&order.order_id, "A2", BUYER, policy).await.expect_err("policy");
    assert!(matches!(err, CouponApiError::Rejected(CouponRejection::SingleCouponPerVendor)));
    // Re-applying the already-redeemed coupon itself stays allowed.
    api.apply_with_policy(&order.order_id, "A5", BUYER, policy).await.expect("re-apply same coupon");
    tear_down(db).await;
}

#[tokio::test]
async fn unknown_order_is_an_error() {
    let db = setup().await;
    seed_coupon(&db, CouponSeed::fixed("SAVE", VENDOR_A, Money::from_rupees(1))).await;
    let api = CouponApi::new(db.clone());
    let missing = OrderId("00000000".to_string());
    assert!(matches!(api.apply(&missing, "SAVE", BUYER).await, Err(CouponApiError::OrderNotFound(_))));
    tear_down(db).await;
}
