use std::{fmt::Display, str::FromStr};

use bcg_common::{Money, STORE_CURRENCY_CODE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}: {1}")]
pub struct ConversionError(pub &'static str, pub String);

//--------------------------------------      CartOwner      ---------------------------------------------------------

/// The identity a cart is keyed on: an authenticated user, or an anonymous browsing session.
/// Exactly one cart exists per identity; the session cart is folded into the user cart on login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(i64),
    Session(String),
}

impl Display for CartOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CartOwner::User(id) => write!(f, "user #{id}"),
            CartOwner::Session(key) => write!(f, "session {key}"),
        }
    }
}

//--------------------------------------        Cart         ---------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct Cart {
    pub id: i64,
    pub user_id: Option<i64>,
    pub session_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CartItem {
    pub id: i64,
    pub cart_id: i64,
    pub variant_id: i64,
    pub quantity: i64,
    /// Captured variant-selection labels, serialized JSON. Display only; never used for pricing.
    pub selections: Option<String>,
    pub added_at: DateTime<Utc>,
}

//--------------------------------------    ProductVariant   ---------------------------------------------------------

/// Read-only projection of a sellable variant. The catalog itself is maintained elsewhere; the
/// engine only reads the sale price, vendor attribution and availability at cart/snapshot time.
#[derive(Debug, Clone, FromRow)]
pub struct ProductVariant {
    pub id: i64,
    pub product_name: String,
    pub vendor_id: i64,
    pub sale_price: Money,
    pub stock_quantity: i64,
    pub is_active: bool,
}

//--------------------------------------      OrderId        ---------------------------------------------------------

/// The public order identifier used in URLs and gateway payloads (8 decimal digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   PaymentStatus     ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// No payment attempt has been made for the order yet.
    Unpaid,
    /// A gateway transaction has been initiated and not yet settled.
    Pending,
    /// The gateway has confirmed the payment. Sticky: no entry point may revert it.
    Paid,
    /// The gateway reported a definitive failure. The buyer may retry.
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Unpaid => write!(f, "Unpaid"),
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Paid => write!(f, "Paid"),
            PaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unpaid" => Ok(Self::Unpaid),
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError("payment status", s.to_string())),
        }
    }
}

//--------------------------------------  FulfillmentStatus  ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum FulfillmentStatus {
    /// The order exists but has not been confirmed for fulfillment.
    Pending,
    /// Payment confirmed; vendors are preparing the shipment.
    Processing,
    Shipped,
    Delivered,
    Canceled,
    Refunded,
}

impl Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FulfillmentStatus::Pending => write!(f, "Pending"),
            FulfillmentStatus::Processing => write!(f, "Processing"),
            FulfillmentStatus::Shipped => write!(f, "Shipped"),
            FulfillmentStatus::Delivered => write!(f, "Delivered"),
            FulfillmentStatus::Canceled => write!(f, "Canceled"),
            FulfillmentStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for FulfillmentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Canceled" => Ok(Self::Canceled),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError("fulfillment status", s.to_string())),
        }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------

/// An immutable snapshot of a cart at checkout-start, plus the layered totals derived from its
/// line items. Prices are frozen here; nothing downstream re-derives them from the catalog.
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: i64,
    pub currency: String,
    /// Gross item total: Σ price × quantity over all lines.
    pub item_total: Money,
    /// Cumulative coupon discount: Σ line_discount_total over all lines.
    pub item_discount_total: Money,
    /// `item_total − item_discount_total`, floored at zero.
    pub item_total_net: Money,
    pub shipping_fee: Money,
    /// `item_total_net + shipping_fee`. Only the totals recompute may write this.
    pub amount_payable: Money,
    pub courier_name: String,
    pub courier_code: String,
    pub courier_mode: String,
    pub etd_days: Option<i64>,
    pub payment_provider: Option<String>,
    pub payment_txn_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub status: FulfillmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub buyer_id: i64,
    pub currency: String,
    pub shipping_fee: Money,
    pub courier_name: String,
    pub courier_code: String,
    pub courier_mode: String,
    pub etd_days: Option<i64>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, buyer_id: i64) -> Self {
        Self {
            order_id,
            buyer_id,
            currency: STORE_CURRENCY_CODE.to_string(),
            shipping_fee: Money::ZERO,
            courier_name: String::new(),
            courier_code: String::new(),
            courier_mode: String::new(),
            etd_days: None,
        }
    }
}

//--------------------------------------      OrderItem      ---------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_pk: i64,
    pub variant_id: i64,
    pub vendor_id: i64,
    pub quantity: i64,
    /// Unit price frozen from the variant's sale price at snapshot time.
    pub unit_price: Money,
    /// Sum of all coupon allocations against this line.
    pub line_discount_total: Money,
    /// `unit_price × quantity − line_discount_total`, floored at zero.
    pub line_subtotal_net: Money,
    pub selections: Option<String>,
}

impl OrderItem {
    pub fn line_gross(&self) -> Money {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub variant_id: i64,
    pub vendor_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    pub selections: Option<String>,
}

//--------------------------------------       Coupon        ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum DiscountType {
    Percent,
    Fixed,
}

impl Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountType::Percent => write!(f, "Percent"),
            DiscountType::Fixed => write!(f, "Fixed"),
        }
    }
}

impl FromStr for DiscountType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Percent" => Ok(Self::Percent),
            "Fixed" => Ok(Self::Fixed),
            s => Err(ConversionError("discount type", s.to_string())),
        }
    }
}

/// A vendor-scoped discount code. Exactly one of `percent_off_bps` / `amount_off` is meaningful,
/// depending on `discount_type`. Percentages are carried as basis points (2000 = 20.00%).
#[derive(Debug, Clone, FromRow)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    pub vendor_id: i64,
    pub title: String,
    pub discount_type: DiscountType,
    pub percent_off_bps: Option<i64>,
    pub amount_off: Option<Money>,
    /// Cap on the computed discount. Percent coupons only.
    pub max_discount_amount: Option<Money>,
    /// The vendor's gross subtotal in the order must reach this for the coupon to apply.
    pub min_order_amount: Money,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub usage_limit_total: Option<i64>,
    pub usage_limit_per_user: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// A coupon is live when it is active and `now` falls inside its validity window.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        if self.starts_at.is_some_and(|t| now < t) {
            return false;
        }
        if self.ends_at.is_some_and(|t| now > t) {
            return false;
        }
        true
    }
}

//--------------------------------------  CouponRedemption   ---------------------------------------------------------

/// One redemption per (coupon, order, vendor). Re-applying the same coupon supersedes the
/// existing redemption rather than stacking a second one.
#[derive(Debug, Clone, FromRow)]
pub struct CouponRedemption {
    pub id: i64,
    pub coupon_id: i64,
    pub order_pk: i64,
    pub user_id: i64,
    pub vendor_id: i64,
    pub discount_amount: Money,
    pub applied_at: DateTime<Utc>,
}

/// One allocation row per (order item, coupon). The rows for a coupon+vendor sum to exactly the
/// redemption's `discount_amount`.
#[derive(Debug, Clone, FromRow)]
pub struct OrderItemDiscount {
    pub id: i64,
    pub order_item_id: i64,
    pub coupon_id: i64,
    pub vendor_id: i64,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    Notification     ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
}

impl Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationLevel::Info => write!(f, "Info"),
            NotificationLevel::Success => write!(f, "Success"),
            NotificationLevel::Warning => write!(f, "Warning"),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub ntype: String,
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub order_pk: i64,
    pub created_at: DateTime<Utc>,
}

/// Insert-once payload. The storage layer deduplicates on (recipient, title, order), so racing
/// entry points can both request the fan-out and only one row lands.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: i64,
    pub ntype: String,
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub order_pk: i64,
}

//--------------------------------------    PaymentAudit     ---------------------------------------------------------

/// Which leg of the gateway conversation produced an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type)]
pub enum AuditKind {
    Initiate,
    Return,
    Webhook,
    Verify,
}

impl Display for AuditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditKind::Initiate => write!(f, "Initiate"),
            AuditKind::Return => write!(f, "Return"),
            AuditKind::Webhook => write!(f, "Webhook"),
            AuditKind::Verify => write!(f, "Verify"),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PaymentAuditEntry {
    pub id: i64,
    pub order_pk: i64,
    pub kind: AuditKind,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

//-------------------------------------- VendorLineSummary   ---------------------------------------------------------

/// Per-vendor rollup of an order's lines, used for the vendor notification fan-out.
#[derive(Debug, Clone, FromRow)]
pub struct VendorLineSummary {
    pub vendor_id: i64,
    pub item_count: i64,
    pub gross: Money,
    pub discount: Money,
}

impl VendorLineSummary {
    pub fn net(&self) -> Money {
        self.gross - self.discount
    }
}
