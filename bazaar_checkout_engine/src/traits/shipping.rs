use bcg_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One courier option returned by the rate provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateOption {
    pub name: String,
    pub code: String,
    pub amount: Money,
    pub currency: String,
    pub estimated_days: Option<i64>,
}

impl RateOption {
    /// Courier mode sniffed from the option name, recorded on the order for display.
    pub fn mode(&self) -> &'static str {
        let name = self.name.to_lowercase();
        if name.contains("surface") {
            "surface"
        } else if name.contains("air") {
            "air"
        } else {
            ""
        }
    }
}

/// Rate lookup collaborator. Provider internals (auth tokens, serviceability queries) stay on the
/// implementation side; the engine only consumes the returned options.
#[allow(async_fn_in_trait)]
pub trait ShippingRateResolver {
    async fn rates(
        &self,
        pickup_pincode: &str,
        delivery_pincode: &str,
        weight_kg: f64,
    ) -> Result<Vec<RateOption>, ShippingRateError>;
}

#[derive(Debug, Clone, Error)]
pub enum ShippingRateError {
    #[error("Rate provider authentication failed: {0}")]
    AuthFailed(String),
    #[error("Rate lookup failed: {0}")]
    LookupFailed(String),
    #[error("No serviceable couriers for the given route")]
    NotServiceable,
}

/// Deterministic courier selection: prefer an option whose name carries both the preferred
/// courier and surface mode, then any surface option, then the first option returned.
pub fn choose_rate<'a>(options: &'a [RateOption], preferred_courier: &str) -> Option<&'a RateOption> {
    let preferred = preferred_courier.to_lowercase();
    options
        .iter()
        .find(|o| {
            let name = o.name.to_lowercase();
            name.contains(&preferred) && name.contains("surface")
        })
        .or_else(|| options.iter().find(|o| o.name.to_lowercase().contains("surface")))
        .or_else(|| options.first())
}
