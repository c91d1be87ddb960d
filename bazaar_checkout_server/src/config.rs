use std::env;

use bazaar_checkout_engine::CouponPolicy;
use bcg_common::Secret;
use ezpay_tools::EzPayConfig;
use log::*;

const DEFAULT_BCG_HOST: &str = "127.0.0.1";
const DEFAULT_BCG_PORT: u16 = 8460;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Single-coupon toggles enforced by the coupon route handlers before the engine is asked to
    /// apply anything.
    pub policy: CouponPolicy,
    pub ezpay: EzPayServerConfig,
    pub courier: CourierConfig,
}

#[derive(Clone, Debug)]
pub struct EzPayServerConfig {
    pub api: EzPayConfig,
    /// Absolute URL of the payment-return endpoint, registered with the gateway as both the
    /// success and failure redirect target.
    pub return_url: String,
    /// When false, webhook reverse-hash checks are skipped and every webhook takes the
    /// re-verification path. Useful against sandbox accounts that do not sign callbacks.
    pub signature_checks: bool,
}

#[derive(Clone, Debug)]
pub struct CourierConfig {
    pub api_base: String,
    pub email: String,
    pub password: Secret<String>,
    /// The warehouse pincode rate lookups originate from.
    pub pickup_pincode: String,
    /// The courier preferred by the deterministic rate-selection policy.
    pub preferred: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BCG_HOST.to_string(),
            port: DEFAULT_BCG_PORT,
            database_url: String::default(),
            policy: CouponPolicy::default(),
            ezpay: EzPayServerConfig {
                api: EzPayConfig::default(),
                return_url: String::default(),
                signature_checks: true,
            },
            courier: CourierConfig {
                api_base: "https://api.shipquick.in/v1/external".to_string(),
                email: String::default(),
                password: Secret::default(),
                pickup_pincode: String::default(),
                preferred: "delhivery".to_string(),
            },
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let host = env::var("BCG_HOST").ok().unwrap_or_else(|| DEFAULT_BCG_HOST.into());
        let port = env::var("BCG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for BCG_PORT. {e} Using the default, {DEFAULT_BCG_PORT}, instead.");
                    DEFAULT_BCG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_BCG_PORT);
        let database_url = env::var("BCG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ BCG_DATABASE_URL is not set. Please set it to the URL for the storefront database.");
            String::default()
        });
        let policy = CouponPolicy {
            single_coupon_per_order: env_flag("BCG_SINGLE_COUPON_PER_ORDER", false),
            single_coupon_per_vendor: env_flag("BCG_SINGLE_COUPON_PER_VENDOR", false),
        };
        let ezpay = EzPayServerConfig::from_env_or_default();
        let courier = CourierConfig::from_env_or_default();
        Self { host, port, database_url, policy, ezpay, courier }
    }
}

impl EzPayServerConfig {
    pub fn from_env_or_default() -> Self {
        let api = EzPayConfig::new_from_env_or_default();
        let return_url = env::var("BCG_PAYMENT_RETURN_URL").unwrap_or_else(|_| {
            warn!("🪛️ BCG_PAYMENT_RETURN_URL is not set. Gateway redirects will not reach this server.");
            String::default()
        });
        let signature_checks = env_flag("BCG_EZPAY_SIGNATURE_CHECKS", true);
        Self { api, return_url, signature_checks }
    }
}

impl CourierConfig {
    pub fn from_env_or_default() -> Self {
        let api_base =
            env::var("BCG_COURIER_API_BASE").unwrap_or_else(|_| "https://api.shipquick.in/v1/external".to_string());
        let email = env::var("BCG_COURIER_EMAIL").unwrap_or_else(|_| {
            warn!("🪛️ BCG_COURIER_EMAIL is not set. Shipping rate lookups will fail to authenticate.");
            String::default()
        });
        let password = Secret::new(env::var("BCG_COURIER_PASSWORD").unwrap_or_default());
        let pickup_pincode = env::var("BCG_COURIER_PICKUP_PINCODE").unwrap_or_else(|_| {
            warn!("🪛️ BCG_COURIER_PICKUP_PINCODE is not set. Using an empty pickup pincode.");
            String::default()
        });
        let preferred = env::var("BCG_COURIER_PREFERRED").unwrap_or_else(|_| "delhivery".to_string());
        Self { api_base, email, password, pickup_pincode, preferred }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!("🪛️ {name}={s} is not a valid flag value. Using the default ({default}).");
                default
            },
        },
        Err(_) => default,
    }
}
