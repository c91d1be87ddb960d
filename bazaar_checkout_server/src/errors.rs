use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use bazaar_checkout_engine::{
    traits::ShippingRateError,
    CartError,
    CheckoutError,
    CouponApiError,
    GatewayClientError,
    PaymentApiError,
};
use thiserror::Error;

/// The server-level error surface. Every variant renders as a structured `{"error": …}` body —
/// rejection reasons are user-visible, internals never are.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    CouponRejected(String),
    #[error("{0}")]
    CartRejected(String),
    #[error("{0}")]
    PaymentConflict(String),
    #[error("The payment gateway is unavailable. {0}")]
    GatewayUnavailable(String),
    #[error("Shipping rates are unavailable. {0}")]
    ShippingUnavailable(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CartRejected(_) => StatusCode::BAD_REQUEST,
            Self::CouponRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PaymentConflict(_) => StatusCode::CONFLICT,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::ShippingUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<CartError> for ServerError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::Database(e) => Self::BackendError(e.to_string()),
            e => Self::CartRejected(e.to_string()),
        }
    }
}

impl From<CheckoutError> for ServerError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::EmptyCart => Self::CartRejected(e.to_string()),
            CheckoutError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id}")),
            CheckoutError::Database(e) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<CouponApiError> for ServerError {
    fn from(e: CouponApiError) -> Self {
        match e {
            CouponApiError::Rejected(reason) => Self::CouponRejected(reason.to_string()),
            CouponApiError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id}")),
            CouponApiError::Allocation(e) => Self::BackendError(e.to_string()),
            CouponApiError::Database(e) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<PaymentApiError> for ServerError {
    fn from(e: PaymentApiError) -> Self {
        match e {
            PaymentApiError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id}")),
            PaymentApiError::AlreadyPaid => Self::PaymentConflict(e.to_string()),
            PaymentApiError::NothingPayable => Self::PaymentConflict(e.to_string()),
            PaymentApiError::MissingOrderReference => Self::InvalidRequestBody(e.to_string()),
            PaymentApiError::Gateway(GatewayClientError::Rejected(reason)) => Self::GatewayUnavailable(reason),
            PaymentApiError::Gateway(e) => Self::GatewayUnavailable(e.to_string()),
            PaymentApiError::Database(e) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<ShippingRateError> for ServerError {
    fn from(e: ShippingRateError) -> Self {
        Self::ShippingUnavailable(e.to_string())
    }
}
