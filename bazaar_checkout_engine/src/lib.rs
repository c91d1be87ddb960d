//! Bazaar Checkout Engine
//!
//! The checkout engine holds the money-correctness core of the Bazaar multi-vendor storefront:
//! cart freezing, layered order totals, vendor-scoped coupon allocation and payment-status
//! reconciliation. It is provider-agnostic.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You
//!    should never need to access the database directly. Instead, use the public API provided by
//!    the engine. The exception is the data types used in the database, which are defined in the
//!    `db_types` module and are public.
//! 2. The engine public API ([`mod@api`]). This provides the public-facing functionality of the
//!    engine: carts, checkout snapshots, coupon allocation and payment reconciliation. A backend
//!    needs to implement the traits in the [`mod@traits`] module in order to drive these APIs.
//! 3. A set of events that can be subscribed to ([`mod@events`]). Events are emitted after the
//!    relevant transaction has committed. For example, when an order is first confirmed as paid,
//!    an `OrderPaid` event is emitted. A simple actor framework lets you hook into these events
//!    and perform custom actions.
pub mod api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    cart_api::CartApi,
    checkout_api::CheckoutApi,
    coupon_api::{AppliedDiscount, CouponApi, CouponPolicy},
    errors::{CartError, CheckoutError, CouponApiError, CouponRejection, PaymentApiError},
    payment_api::{classify_status, PayerDetails, PaymentApi, PaymentInitiation, ReconcileOutcome},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    GatewayClientError,
    PaymentGatewayClient,
    ShippingRateResolver,
    StorefrontDatabase,
    StorefrontDbError,
    VerifiedStatus,
};
