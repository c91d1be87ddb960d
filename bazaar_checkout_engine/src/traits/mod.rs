//! The traits that storage backends and external collaborators implement in order to drive the
//! checkout engine. The engine APIs are generic over these, so the money-correctness logic can be
//! exercised against the real SQLite backend or against test doubles.
mod payment_gateway;
mod shipping;
mod storefront_database;

pub use payment_gateway::{
    GatewayCallback,
    GatewayClientError,
    PaymentGatewayClient,
    PaymentInitRequest,
    PaymentInitResponse,
    VerifiedStatus,
};
pub use shipping::{choose_rate, RateOption, ShippingRateResolver, ShippingRateError};
pub use storefront_database::{PaidTransition, StorefrontDatabase, StorefrontDbError};
