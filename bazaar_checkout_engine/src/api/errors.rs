use bcg_common::Money;
use thiserror::Error;

use crate::{
    db_types::OrderId,
    helpers::AllocationError,
    traits::{GatewayClientError, StorefrontDbError},
};

//--------------------------------------      CartError      ---------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    BadQuantity,
    #[error("The requested variant does not exist")]
    VariantNotFound(i64),
    #[error("This variant is not available for purchase")]
    InactiveVariant,
    #[error("Insufficient stock for the requested quantity")]
    InsufficientStock,
    #[error("{0}")]
    Database(StorefrontDbError),
}

impl From<StorefrontDbError> for CartError {
    fn from(e: StorefrontDbError) -> Self {
        match e {
            StorefrontDbError::VariantNotFound(id) => CartError::VariantNotFound(id),
            StorefrontDbError::InsufficientStock { .. } => CartError::InsufficientStock,
            e => CartError::Database(e),
        }
    }
}

//--------------------------------------    CheckoutError    ---------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("Cannot check out an empty cart")]
    EmptyCart,
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("{0}")]
    Database(#[from] StorefrontDbError),
}

//--------------------------------------   CouponRejection   ---------------------------------------------------------

/// Why a coupon application was refused. These render as the structured, user-visible rejection
/// reasons; no partial state is written when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("Coupon code not found")]
    NotFound,
    #[error("Coupon is inactive or outside its validity window")]
    NotLive,
    #[error("Coupon vendor has no items in this order")]
    VendorNotInOrder,
    #[error("Coupon usage limit reached")]
    UsageLimitReached,
    #[error("You have reached the usage limit for this coupon")]
    PerUserLimitReached,
    #[error("Minimum order amount not met: requires {required}, vendor subtotal is {subtotal}")]
    MinimumNotMet { required: Money, subtotal: Money },
    #[error("Coupon produces no discount for this order")]
    NoDiscount,
    #[error("Only one coupon may be applied per order")]
    SingleCouponPerOrder,
    #[error("A coupon has already been applied for this vendor")]
    SingleCouponPerVendor,
}

#[derive(Debug, Clone, Error)]
pub enum CouponApiError {
    #[error("{0}")]
    Rejected(#[from] CouponRejection),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("{0}")]
    Allocation(#[from] AllocationError),
    #[error("{0}")]
    Database(#[from] StorefrontDbError),
}

//--------------------------------------   PaymentApiError   ---------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum PaymentApiError {
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order is already paid")]
    AlreadyPaid,
    #[error("Amount payable must be greater than zero")]
    NothingPayable,
    #[error("Payload does not identify an order")]
    MissingOrderReference,
    #[error("{0}")]
    Gateway(#[from] GatewayClientError),
    #[error("{0}")]
    Database(#[from] StorefrontDbError),
}
