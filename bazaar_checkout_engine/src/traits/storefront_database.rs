use bcg_common::Money;
use serde_json::Value;
use thiserror::Error;

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
    traits::RateOption,
};

/// Result of the conditional PAID transition. Exactly one caller wins under concurrency; every
/// other caller observes `won == false` and the already-paid order.
#[derive(Debug, Clone)]
pub struct PaidTransition {
    pub order: Order,
    pub won: bool,
}

/// This trait defines the storage behaviour backing the checkout engine.
///
/// Implementations must run every multi-row mutation inside a single database transaction, so
/// that a failure in any step rolls back all of them. Methods that express a compare-and-set
/// (the paid/failed transitions, the guarded cart upsert) must evaluate their guard and write
/// atomically.
#[allow(async_fn_in_trait)]
pub trait StorefrontDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    //----------------------------------------- Carts ----------------------------------------

    /// Fetches the cart for the identity, creating it lazily on first use.
    async fn fetch_or_create_cart(&self, owner: &CartOwner) -> Result<Cart, StorefrontDbError>;

    /// Fetches the cart for the identity, or `None` if the identity never added anything.
    async fn fetch_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, StorefrontDbError>;

    /// The cart's lines, ordered by line id.
    async fn fetch_cart_items(&self, cart_id: i64) -> Result<Vec<CartItem>, StorefrontDbError>;

    /// Upserts the (cart, variant) line in one transaction: re-reads the current line, checks the
    /// requested target quantity against the variant's stock, and increments (or overrides) the
    /// quantity. Fails with [`StorefrontDbError::InsufficientStock`] when the target exceeds
    /// stock, so concurrent add requests cannot overcommit.
    async fn upsert_cart_item(
        &self,
        cart_id: i64,
        variant_id: i64,
        quantity: i64,
        override_quantity: bool,
        selections: Option<String>,
    ) -> Result<CartItem, StorefrontDbError>;

    /// Folds the source cart into the destination cart, summing quantities for matching
    /// variants, then deletes the source cart. Atomic.
    async fn merge_carts(&self, source_cart_id: i64, dest_cart_id: i64) -> Result<(), StorefrontDbError>;

    async fn delete_cart(&self, cart_id: i64) -> Result<(), StorefrontDbError>;

    //--------------------------------------- Variants ---------------------------------------

    async fn fetch_variant(&self, variant_id: i64) -> Result<Option<ProductVariant>, StorefrontDbError>;

    //---------------------------------------- Orders ----------------------------------------

    /// Inserts the order and its frozen lines in one transaction and recomputes the totals once.
    /// Retries with a fresh public id on the (unlikely) id collision.
    async fn insert_order_snapshot(
        &self,
        order: NewOrder,
        lines: Vec<NewOrderItem>,
    ) -> Result<Order, StorefrontDbError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorefrontDbError>;

    /// The order's lines, ordered by line id (the deterministic proration order).
    async fn fetch_order_items(&self, order_pk: i64) -> Result<Vec<OrderItem>, StorefrontDbError>;

    /// Overwrites the frozen courier selection and shipping fee, then recomputes the totals, in
    /// one transaction. Returns the updated order.
    async fn assign_shipping(&self, order_id: &OrderId, rate: &RateOption) -> Result<Order, StorefrontDbError>;

    //---------------------------------------- Coupons ---------------------------------------

    async fn fetch_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StorefrontDbError>;

    /// Number of redemptions of the coupon across all orders, excluding the given order (so that
    /// re-applying to the same order supersedes rather than self-blocks).
    async fn count_redemptions(&self, coupon_id: i64, exclude_order_pk: i64) -> Result<i64, StorefrontDbError>;

    /// As [`Self::count_redemptions`], restricted to one user.
    async fn count_redemptions_for_user(
        &self,
        coupon_id: i64,
        user_id: i64,
        exclude_order_pk: i64,
    ) -> Result<i64, StorefrontDbError>;

    /// Coupon ids currently redeemed against the order, with their vendors. Used by the caller to
    /// enforce single-coupon policies before `apply_coupon_allocations`.
    async fn fetch_redeemed_coupons(&self, order_pk: i64) -> Result<Vec<(i64, i64)>, StorefrontDbError>;

    /// Persists a coupon application in one transaction:
    /// 1. deletes any existing allocation rows for (the vendor's lines of this order, coupon),
    /// 2. re-derives each affected line's discount total from the surviving allocation rows,
    /// 3. inserts the new allocation rows (positive amounts only) and adds them to the lines,
    /// 4. recomputes each affected line's net subtotal,
    /// 5. upserts the redemption keyed on (coupon, order, vendor) with the new discount,
    /// 6. recomputes the order totals.
    ///
    /// Returns the updated order.
    async fn apply_coupon_allocations(
        &self,
        order_pk: i64,
        coupon: &Coupon,
        user_id: i64,
        discount: Money,
        allocations: &[LineAllocation],
    ) -> Result<Order, StorefrontDbError>;

    /// Reverses a coupon application in one transaction: deletes the allocation rows and the
    /// redemption, subtracts the summed amounts from each line (floored at zero), recomputes line
    /// nets and order totals. Returns the updated order and whether the coupon had been applied.
    async fn remove_coupon_allocations(&self, order_pk: i64, coupon: &Coupon) -> Result<(Order, bool), StorefrontDbError>;

    //--------------------------------------- Payments ---------------------------------------

    /// Records an accepted gateway initiation: stores the transaction id and provider and moves
    /// `payment_status` to Pending.
    async fn record_payment_initiation(
        &self,
        order_id: &OrderId,
        provider: &str,
        txn_id: &str,
    ) -> Result<Order, StorefrontDbError>;

    /// The conditional PAID transition: in one atomic statement, iff `payment_status != Paid`,
    /// sets it to Paid, moves fulfillment Pending → Processing and stores the gateway payment id.
    /// The affected-row count decides the single winner under racing entry points.
    async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        gateway_payment_id: Option<&str>,
    ) -> Result<PaidTransition, StorefrontDbError>;

    /// Marks the order Failed iff it is not Paid. Paid is sticky.
    async fn mark_order_failed(&self, order_id: &OrderId) -> Result<Order, StorefrontDbError>;

    /// Appends the raw gateway payload to the audit trail. Called for every exchange regardless
    /// of parse outcome.
    async fn append_payment_audit(
        &self,
        order_pk: i64,
        kind: AuditKind,
        payload: &Value,
    ) -> Result<(), StorefrontDbError>;

    //------------------------------------- Notifications ------------------------------------

    /// Inserts the notification iff no row with the same (recipient, title, order) exists.
    /// Returns whether a row was inserted.
    async fn notify_once(&self, notification: NewNotification) -> Result<bool, StorefrontDbError>;

    /// Per-vendor rollups of the order's lines, for the vendor notification fan-out.
    async fn vendor_summaries(&self, order_pk: i64) -> Result<Vec<VendorLineSummary>, StorefrontDbError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), StorefrontDbError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum StorefrontDbError {
    #[error("Internal database engine error: {0}")]
    DatabaseError(String),
    #[error("The requested variant {0} does not exist")]
    VariantNotFound(i64),
    #[error("Insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
    InsufficientStock { variant_id: i64, requested: i64, available: i64 },
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderPkNotFound(i64),
    #[error("Could not allocate a unique order id after {0} attempts")]
    OrderIdSpaceExhausted(u32),
    #[error("Order state would violate an invariant: {0}")]
    IntegrityViolation(String),
}

impl From<sqlx::Error> for StorefrontDbError {
    fn from(e: sqlx::Error) -> Self {
        StorefrontDbError::DatabaseError(e.to_string())
    }
}
