use serde::{Deserialize, Serialize};

/// Parameters for the Initiate Payment API. Every `udf` slot is always transmitted, empty or
/// not: the request hash is computed over the full fixed sequence, and omitting a slot changes
/// the pipe count and invalidates the signature.
#[derive(Debug, Clone, Default)]
pub struct InitiateRequest {
    pub txnid: String,
    /// `"123.45"` — two decimals, as the gateway validates the format strictly.
    pub amount: String,
    pub productinfo: String,
    pub firstname: String,
    pub email: String,
    pub phone: String,
    /// Success return URL (browser redirect).
    pub surl: String,
    /// Failure return URL. Usually the same handler; the server decides from verified state.
    pub furl: String,
    pub udf1: String,
    pub udf2: String,
    pub udf3: String,
    pub udf4: String,
    pub udf5: String,
}

impl InitiateRequest {
    /// The form body, with the merchant key and the computed hash attached. All ten udf slots
    /// are present; slots 6–10 are reserved and always empty.
    pub fn to_form(&self, key: &str, hash: &str) -> Vec<(&'static str, String)> {
        vec![
            ("key", key.to_string()),
            ("txnid", self.txnid.clone()),
            ("amount", self.amount.clone()),
            ("productinfo", self.productinfo.clone()),
            ("firstname", self.firstname.clone()),
            ("email", self.email.clone()),
            ("phone", self.phone.clone()),
            ("surl", self.surl.clone()),
            ("furl", self.furl.clone()),
            ("udf1", self.udf1.clone()),
            ("udf2", self.udf2.clone()),
            ("udf3", self.udf3.clone()),
            ("udf4", self.udf4.clone()),
            ("udf5", self.udf5.clone()),
            ("udf6", String::new()),
            ("udf7", String::new()),
            ("udf8", String::new()),
            ("udf9", String::new()),
            ("udf10", String::new()),
            ("hash", hash.to_string()),
        ]
    }
}

/// Raw response of the Initiate Payment API. `status == 1` means accepted and `data` carries the
/// access key for the hosted checkout page; any other status carries the rejection reason in
/// `data` or `error`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InitiateResponse {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Fields EzPay posts to the return URL and the webhook endpoint. Unknown fields are ignored;
/// absent fields decode as empty strings, which is exactly how the response hash treats them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CallbackPayload {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub txnid: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub productinfo: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub udf1: String,
    #[serde(default)]
    pub udf2: String,
    #[serde(default)]
    pub udf3: String,
    #[serde(default)]
    pub udf4: String,
    #[serde(default)]
    pub udf5: String,
    #[serde(default)]
    pub ezpay_id: String,
    /// Some webhook variants reference the order through this instead of `udf1`.
    #[serde(default)]
    pub merchant_ref_no: String,
    #[serde(default)]
    pub hash: String,
}

impl CallbackPayload {
    /// The merchant-side order reference, wherever the payload variant carries it.
    pub fn order_reference(&self) -> Option<&str> {
        if !self.udf1.is_empty() {
            Some(self.udf1.as_str())
        } else if !self.merchant_ref_no.is_empty() {
            Some(self.merchant_ref_no.as_str())
        } else {
            None
        }
    }
}
