//! Adapter that lets the engine's payment reconciler drive the EzPay client.
//!
//! Transport failures and endpoint drift surface as *inconclusive* verification, never as a
//! verdict — the reconciler fails closed on them.
use bazaar_checkout_engine::traits::{
    GatewayClientError,
    PaymentGatewayClient,
    PaymentInitRequest,
    PaymentInitResponse,
    VerifiedStatus,
};
use ezpay_tools::{EzPayApi, EzPayApiError, EzPayConfig, InitiateRequest};

use crate::errors::ServerError;

#[derive(Clone)]
pub struct EzPayGateway {
    api: EzPayApi,
    return_url: String,
}

impl EzPayGateway {
    pub fn new(config: EzPayConfig, return_url: &str) -> Result<Self, ServerError> {
        let api = EzPayApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api, return_url: return_url.to_string() })
    }
}

impl PaymentGatewayClient for EzPayGateway {
    fn provider(&self) -> &str {
        "EZPAY"
    }

    async fn initiate(&self, request: PaymentInitRequest) -> Result<PaymentInitResponse, GatewayClientError> {
        let init = InitiateRequest {
            txnid: request.txn_id,
            amount: request.amount.to_amount_string(),
            productinfo: request.product_info,
            firstname: request.payer_name,
            email: request.payer_email,
            phone: request.payer_phone,
            // Success and failure both land on the same return handler; the redirect target is
            // decided from server-verified state, never from the gateway's claimed outcome.
            surl: self.return_url.clone(),
            furl: self.return_url.clone(),
            udf1: request.order_id.as_str().to_string(),
            ..InitiateRequest::default()
        };
        match self.api.initiate(&init).await {
            Ok((access_key, raw)) => {
                Ok(PaymentInitResponse { checkout_url: self.api.hosted_checkout_url(&access_key), raw })
            },
            Err(EzPayApiError::InitiationRejected(reason)) => Err(GatewayClientError::Rejected(reason)),
            Err(e) => Err(GatewayClientError::Rejected(format!("Gateway unreachable: {e}"))),
        }
    }

    async fn verify_transaction(
        &self,
        txn_id: &str,
        gateway_ref: Option<&str>,
    ) -> Result<VerifiedStatus, GatewayClientError> {
        match self.api.transaction_status(txn_id, gateway_ref).await {
            Ok(verdict) if verdict.success => {
                Ok(VerifiedStatus::Success { gateway_payment_id: verdict.payment_id, raw: verdict.raw })
            },
            Ok(verdict) => {
                let gateway_status =
                    if verdict.gateway_status.is_empty() { "no-response".to_string() } else { verdict.gateway_status };
                Ok(VerifiedStatus::Failure { gateway_status, raw: verdict.raw })
            },
            Err(e) => Err(GatewayClientError::Inconclusive(e.to_string())),
        }
    }
}
