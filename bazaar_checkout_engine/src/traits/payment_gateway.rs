use bcg_common::Money;
use serde_json::Value;
use thiserror::Error;

use crate::db_types::OrderId;

/// Parameters for a gateway initiation. The client is responsible for the wire format, including
/// the signed hash over the provider's fixed field sequence.
#[derive(Debug, Clone)]
pub struct PaymentInitRequest {
    pub txn_id: String,
    pub amount: Money,
    pub product_info: String,
    pub payer_name: String,
    pub payer_email: String,
    pub payer_phone: String,
    /// The public order id, carried in the gateway's first user-defined field so that return and
    /// webhook payloads can be mapped back to the order.
    pub order_id: OrderId,
}

/// Outcome of a successful initiation: where to send the buyer, plus the raw exchange for audit.
#[derive(Debug, Clone)]
pub struct PaymentInitResponse {
    pub checkout_url: String,
    pub raw: Value,
}

/// A normalized inbound gateway notification (browser-redirect return or server-to-server
/// webhook), decoupled from any provider's wire format. The raw payload rides along for audit.
/// `signature_valid` is true only when the provider's cryptographic response signature was
/// checked and matched; an unsigned or unverifiable payload is treated as untrusted input.
#[derive(Debug, Clone)]
pub struct GatewayCallback {
    pub order_id: Option<OrderId>,
    pub txn_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub status: Option<String>,
    pub signature_valid: bool,
    pub raw: Value,
}

/// The gateway's authoritative verdict on a transaction, as re-verified server side.
#[derive(Debug, Clone)]
pub enum VerifiedStatus {
    Success { gateway_payment_id: Option<String>, raw: Value },
    Failure { gateway_status: String, raw: Value },
}

/// A client for the external payment gateway. Implementations live outside the engine; the
/// reconciler only relies on these two operations.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayClient: Clone {
    /// The provider tag recorded on orders paid through this client (e.g. `"EZPAY"`).
    fn provider(&self) -> &str;

    /// Initiates a hosted-checkout transaction. A rejection by the gateway's parameter
    /// validation surfaces as [`GatewayClientError::Rejected`] with the provider's reason.
    async fn initiate(&self, request: PaymentInitRequest) -> Result<PaymentInitResponse, GatewayClientError>;

    /// Queries the gateway's authoritative transaction-status endpoint(s). Network trouble,
    /// timeouts and unparseable responses are [`GatewayClientError::Inconclusive`]: the caller
    /// must fail closed and leave the order untouched.
    async fn verify_transaction(
        &self,
        txn_id: &str,
        gateway_ref: Option<&str>,
    ) -> Result<VerifiedStatus, GatewayClientError>;
}

#[derive(Debug, Clone, Error)]
pub enum GatewayClientError {
    #[error("The gateway rejected the request: {0}")]
    Rejected(String),
    #[error("Transaction status could not be verified: {0}")]
    Inconclusive(String),
}
