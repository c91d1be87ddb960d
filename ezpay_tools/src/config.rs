use log::*;
use bcg_common::Secret;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EzPayEnv {
    /// Sandbox / UAT environment.
    #[default]
    Uat,
    Prod,
}

impl EzPayEnv {
    pub fn base_url(&self) -> &'static str {
        match self {
            EzPayEnv::Uat => "https://testpay.ezpay.in",
            EzPayEnv::Prod => "https://pay.ezpay.in",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EzPayConfig {
    /// Merchant API key, sent in the clear with every request.
    pub key: String,
    /// Shared salt used for request and response hashes. Never sent over the wire.
    pub salt: Secret<String>,
    pub env: EzPayEnv,
    /// Exact transaction-status URL, when the merchant account documents one. When unset, the
    /// client walks the known endpoint shapes in order.
    pub status_url_override: Option<String>,
}

impl EzPayConfig {
    pub fn new_from_env_or_default() -> Self {
        let key = std::env::var("BCG_EZPAY_KEY").unwrap_or_else(|_| {
            warn!("🪛️ BCG_EZPAY_KEY is not set. Payment initiation will be rejected by the gateway.");
            String::default()
        });
        let salt = Secret::new(std::env::var("BCG_EZPAY_SALT").unwrap_or_else(|_| {
            warn!("🪛️ BCG_EZPAY_SALT is not set. Request hashes will not validate.");
            String::default()
        }));
        let env = match std::env::var("BCG_EZPAY_ENV").map(|s| s.to_uppercase()) {
            Ok(s) if ["PROD", "PRODUCTION", "LIVE"].contains(&s.as_str()) => EzPayEnv::Prod,
            Ok(s) if ["UAT", "TEST", "SANDBOX"].contains(&s.as_str()) => EzPayEnv::Uat,
            _ => {
                info!("🪛️ BCG_EZPAY_ENV not set. Using the UAT environment.");
                EzPayEnv::Uat
            },
        };
        let status_url_override = std::env::var("BCG_EZPAY_TXN_STATUS_URL").ok();
        Self { key, salt, env, status_url_override }
    }

    pub fn base_url(&self) -> &'static str {
        self.env.base_url()
    }

    /// The ordered list of transaction-status endpoints to try. Merchant accounts are migrated
    /// between API generations without notice, so the client is resilient to endpoint drift.
    pub fn status_urls(&self) -> Vec<String> {
        if let Some(url) = &self.status_url_override {
            return vec![url.clone()];
        }
        let base = self.base_url().trim_end_matches('/');
        vec![
            format!("{base}/payment/transaction/v2/retrieve"),
            format!("{base}/transaction/v2/retrieve"),
            format!("{base}/payment/v2/transaction"),
        ]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_urls_keep_documented_order() {
        let config = EzPayConfig::default();
        let urls = config.status_urls();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].ends_with("/payment/transaction/v2/retrieve"));
        assert!(urls[1].ends_with("/transaction/v2/retrieve"));
        assert!(urls[2].ends_with("/payment/v2/transaction"));
    }

    #[test]
    fn override_replaces_the_candidate_list() {
        let config = EzPayConfig {
            status_url_override: Some("https://pay.ezpay.in/custom/status".to_string()),
            ..EzPayConfig::default()
        };
        assert_eq!(config.status_urls(), vec!["https://pay.ezpay.in/custom/status".to_string()]);
    }
}
