//! ShipQuick courier-aggregator client: bearer-token auth with a cached token, plus the
//! serviceability/rate lookup the checkout flow consumes through [`ShippingRateResolver`].
use std::sync::Arc;

use bazaar_checkout_engine::traits::{RateOption, ShippingRateError, ShippingRateResolver};
use bcg_common::Money;
use log::*;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::CourierConfig;

#[derive(Clone)]
pub struct ShipQuickClient {
    config: CourierConfig,
    client: Arc<Client>,
    token: Arc<RwLock<Option<String>>>,
}

impl ShipQuickClient {
    pub fn new(config: CourierConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(12))
            .build()
            .unwrap_or_default();
        Self { config, client: Arc::new(client), token: Arc::new(RwLock::new(None)) }
    }

    /// The cached bearer token, logging in when none is held yet. Tokens expire provider-side;
    /// a 401 on lookup clears the cache so the next call re-authenticates.
    async fn token(&self) -> Result<String, ShippingRateError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        if self.config.email.is_empty() {
            return Err(ShippingRateError::AuthFailed("Courier credentials are not configured".to_string()));
        }
        let url = format!("{}/auth/login", self.config.api_base);
        let body = serde_json::json!({ "email": self.config.email, "password": self.config.password.reveal() });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ShippingRateError::AuthFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ShippingRateError::AuthFailed(format!("HTTP {} from {url}", response.status())));
        }
        let data: Value = response.json().await.map_err(|e| ShippingRateError::AuthFailed(e.to_string()))?;
        // The token sits under `token` or `data.token` depending on account generation.
        let token = data
            .get("token")
            .and_then(Value::as_str)
            .or_else(|| data.pointer("/data/token").and_then(Value::as_str))
            .map(String::from)
            .ok_or_else(|| ShippingRateError::AuthFailed("Token not found in login response".to_string()))?;
        *self.token.write().await = Some(token.clone());
        debug!("🚚️ ShipQuick token refreshed");
        Ok(token)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }
}

impl ShippingRateResolver for ShipQuickClient {
    async fn rates(
        &self,
        pickup_pincode: &str,
        delivery_pincode: &str,
        weight_kg: f64,
    ) -> Result<Vec<RateOption>, ShippingRateError> {
        let token = self.token().await?;
        let url = format!("{}/courier/serviceability/", self.config.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[
                ("pickup_postcode", pickup_pincode),
                ("delivery_postcode", delivery_pincode),
                ("weight", &weight_kg.to_string()),
                ("cod", "0"),
            ])
            .send()
            .await
            .map_err(|e| ShippingRateError::LookupFailed(e.to_string()))?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
            return Err(ShippingRateError::AuthFailed("Courier token expired".to_string()));
        }
        if !response.status().is_success() {
            return Err(ShippingRateError::LookupFailed(format!("HTTP {} from {url}", response.status())));
        }
        let data: Value = response.json().await.map_err(|e| ShippingRateError::LookupFailed(e.to_string()))?;
        let couriers = data
            .pointer("/data/available_courier_companies")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let options: Vec<RateOption> = couriers.iter().filter_map(parse_rate_option).collect();
        if options.is_empty() {
            return Err(ShippingRateError::NotServiceable);
        }
        debug!("🚚️ {} courier option(s) for {pickup_pincode} → {delivery_pincode}", options.len());
        Ok(options)
    }
}

/// One courier entry → a normalized rate option. Field names vary by provider generation, so
/// each value is taken from the first spelling that is present.
fn parse_rate_option(entry: &Value) -> Option<RateOption> {
    let name = ["courier_name", "name", "courier"]
        .iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_str))?
        .to_string();
    let code = ["courier_company_id", "courier_code", "id", "code"]
        .iter()
        .find_map(|k| entry.get(*k).map(json_to_code))
        .unwrap_or_default();
    let rate = ["rate", "shipping_charges", "freight_charge", "charge"]
        .iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_f64))?;
    let amount: Money = format!("{rate:.2}").parse().ok()?;
    let estimated_days = ["estimated_delivery_days", "etd_days"]
        .iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_i64));
    Some(RateOption { name, code, amount, currency: "INR".to_string(), estimated_days })
}

fn json_to_code(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
