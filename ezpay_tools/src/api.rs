use std::sync::Arc;

use log::*;
use reqwest::Client;
use serde_json::Value;

use crate::{
    config::EzPayConfig,
    data_objects::{InitiateRequest, InitiateResponse},
    hash::{request_hash, status_hash},
    EzPayApiError,
};

/// What the authoritative transaction-status API said about a transaction, normalized across the
/// response shapes the endpoint generations produce.
#[derive(Debug, Clone)]
pub struct StatusVerdict {
    pub success: bool,
    pub gateway_status: String,
    pub payment_id: Option<String>,
    pub raw: Value,
}

#[derive(Clone)]
pub struct EzPayApi {
    config: EzPayConfig,
    client: Arc<Client>,
}

impl EzPayApi {
    pub fn new(config: EzPayConfig) -> Result<Self, EzPayApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| EzPayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &EzPayConfig {
        &self.config
    }

    /// The hosted checkout page for an accepted initiation.
    pub fn hosted_checkout_url(&self, access_key: &str) -> String {
        format!("{}/pay/{access_key}", self.config.base_url())
    }

    /// Calls the Initiate Payment API. Returns the access key for the hosted checkout page.
    ///
    /// The request is form-urlencoded and signed over the full fixed field sequence; the raw
    /// response is returned alongside so callers can persist the exchange for audit.
    pub async fn initiate(&self, request: &InitiateRequest) -> Result<(String, Value), EzPayApiError> {
        let salt = self.config.salt.reveal().clone();
        let hash = request_hash(request, &self.config.key, &salt);
        let form = request.to_form(&self.config.key, &hash);
        let url = format!("{}/payment/initiateLink", self.config.base_url());
        debug!("💳️ Initiating EzPay transaction {} for {}", request.txnid, request.amount);
        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| EzPayApiError::RequestError(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| EzPayApiError::RequestError(e.to_string()))?;
        // Parameter-validation failures sometimes come back as plain text with a 200.
        let parsed: InitiateResponse = serde_json::from_str(&body).unwrap_or_else(|_| InitiateResponse {
            status: 0,
            data: Value::String(body.chars().take(1_000).collect()),
            error: None,
        });
        let raw = serde_json::to_value(&parsed).map_err(|e| EzPayApiError::JsonError(e.to_string()))?;
        if !status.is_success() {
            return Err(EzPayApiError::RequestError(format!("HTTP {status} from {url}")));
        }
        if parsed.status != 1 {
            let reason = parsed
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| parsed.data.to_string());
            warn!("💳️ EzPay initiation for {} rejected: {reason}", request.txnid);
            return Err(EzPayApiError::InitiationRejected(reason));
        }
        let access_key = match &parsed.data {
            Value::String(s) if !s.is_empty() => s.clone(),
            other => return Err(EzPayApiError::JsonError(format!("Unexpected access key payload: {other}"))),
        };
        info!("💳️ EzPay transaction {} initiated", request.txnid);
        Ok((access_key, raw))
    }

    /// Queries the authoritative transaction status, walking the candidate endpoint list until
    /// one returns parseable JSON. Only a definitive answer is returned; if every endpoint is
    /// unreachable or unparseable the result is [`EzPayApiError::StatusUnavailable`] and the
    /// caller must treat the transaction as unverified.
    pub async fn transaction_status(
        &self,
        txnid: &str,
        ezpay_id: Option<&str>,
    ) -> Result<StatusVerdict, EzPayApiError> {
        let salt = self.config.salt.reveal().clone();
        let mut form: Vec<(&str, String)> = vec![("key", self.config.key.clone()), ("txnid", txnid.to_string())];
        if let Some(id) = ezpay_id {
            form.push(("ezpay_id", id.to_string()));
        }
        if !salt.is_empty() {
            form.push(("hash", status_hash(&self.config.key, txnid, &salt)));
        }
        let mut last_failure = String::new();
        for url in self.config.status_urls() {
            match self.try_status_endpoint(&url, &form).await {
                Ok(data) => {
                    info!("💳️ Transaction status for {txnid} from {url}");
                    return Ok(parse_status_verdict(data));
                },
                Err(e) => {
                    warn!("💳️ Status endpoint {url} failed for {txnid}: {e}");
                    last_failure = e.to_string();
                },
            }
        }
        Err(EzPayApiError::StatusUnavailable(last_failure))
    }

    async fn try_status_endpoint(&self, url: &str, form: &[(&str, String)]) -> Result<Value, EzPayApiError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| EzPayApiError::RequestError(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(EzPayApiError::RequestError(format!("HTTP {status}")));
        }
        let body = response.text().await.map_err(|e| EzPayApiError::RequestError(e.to_string()))?;
        // Some endpoint generations send JSON with a text/plain content type.
        serde_json::from_str::<Value>(body.trim()).map_err(|e| EzPayApiError::JsonError(e.to_string()))
    }
}

/// Normalizes a status response. The canonical gateway result usually sits in `data.status`,
/// but older endpoints flatten it to the top level and spell the field differently.
fn parse_status_verdict(raw: Value) -> StatusVerdict {
    let data = if raw.get("data").map(Value::is_object).unwrap_or(false) { &raw["data"] } else { &raw };
    let gateway_status = ["status", "txn_status", "response_status"]
        .iter()
        .find_map(|k| data.get(*k).and_then(Value::as_str))
        .unwrap_or("")
        .to_lowercase();
    let payment_id = ["ezpay_id", "payment_id"]
        .iter()
        .find_map(|k| data.get(*k).and_then(Value::as_str))
        .or_else(|| raw.get("ezpay_id").and_then(Value::as_str))
        .map(String::from);
    let success = ["success", "captured", "success-verified"].contains(&gateway_status.as_str());
    StatusVerdict { success, gateway_status, payment_id, raw }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::parse_status_verdict;

    #[test]
    fn reads_the_nested_data_shape() {
        let verdict = parse_status_verdict(json!({
            "status": 1,
            "data": { "status": "success", "ezpay_id": "EZ991" }
        }));
        assert!(verdict.success);
        assert_eq!(verdict.gateway_status, "success");
        assert_eq!(verdict.payment_id.as_deref(), Some("EZ991"));
    }

    #[test]
    fn reads_flattened_and_variant_spellings() {
        let verdict = parse_status_verdict(json!({ "txn_status": "Captured", "payment_id": "EZ5" }));
        assert!(verdict.success);
        assert_eq!(verdict.gateway_status, "captured");
        assert_eq!(verdict.payment_id.as_deref(), Some("EZ5"));

        let verdict = parse_status_verdict(json!({ "data": { "status": "userCancelled" } }));
        assert!(!verdict.success);
        assert_eq!(verdict.gateway_status, "usercancelled");

        let verdict = parse_status_verdict(json!({}));
        assert!(!verdict.success);
        assert_eq!(verdict.gateway_status, "");
    }
}
