use std::{env, str::FromStr, time::Duration};

use anyhow::Context;

use crate::{
    gateways::{delhivery::DelhiveryConfig, razorpay::RazorpayConfig},
    services::pricing::PricingConfig,
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub pricing: PricingConfig,
    pub razorpay: RazorpayConfig,
    pub delhivery: DelhiveryConfig,
    pub shipping: ShippingConfig,
    /// Shared token the courier sends on tracking webhooks. Unset disables the check.
    pub courier_webhook_token: Option<String>,
    pub http_timeout: Duration,
}

/// Where parcels are collected from and sent back to.
#[derive(Debug, Clone, PartialEq)]
pub struct PickupAddress {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct ShippingConfig {
    pub pickup: PickupAddress,
    pub return_address: PickupAddress,
    /// Courier service mode, e.g. "Surface" or "Express".
    pub method: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000u16);

        let pricing = PricingConfig {
            currency: env::var("CURRENCY").unwrap_or_else(|_| "INR".to_string()),
            free_shipping_threshold: parse_or("FREE_SHIPPING_THRESHOLD", 50_000i64),
            flat_shipping_fee: parse_or("FLAT_SHIPPING_FEE", 5_000i64),
            tax_rate_bps: parse_or("TAX_RATE_BPS", 800i64),
        };

        let razorpay = RazorpayConfig {
            key_id: env::var("RAZORPAY_KEY_ID").context("RAZORPAY_KEY_ID is not set")?,
            key_secret: env::var("RAZORPAY_KEY_SECRET")
                .context("RAZORPAY_KEY_SECRET is not set")?,
            base_url: env::var("RAZORPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com".to_string()),
        };

        let delhivery = DelhiveryConfig {
            api_token: env::var("DELHIVERY_API_TOKEN").context("DELHIVERY_API_TOKEN is not set")?,
            base_url: env::var("DELHIVERY_BASE_URL")
                .unwrap_or_else(|_| "https://track.delhivery.com".to_string()),
        };

        let pickup = address_from_env("PICKUP")?;
        let return_address = if env::var("RETURN_ADDRESS").is_ok() {
            address_from_env("RETURN")?
        } else {
            pickup.clone()
        };
        let shipping = ShippingConfig {
            pickup,
            return_address,
            method: env::var("DELHIVERY_SHIPPING_MODE").unwrap_or_else(|_| "Surface".to_string()),
        };

        Ok(Self {
            database_url,
            host,
            port,
            pricing,
            razorpay,
            delhivery,
            shipping,
            courier_webhook_token: env::var("COURIER_WEBHOOK_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 15u64)),
        })
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn address_from_env(prefix: &str) -> anyhow::Result<PickupAddress> {
    let var = |field: &str| {
        let key = format!("{prefix}_{field}");
        env::var(&key).with_context(|| format!("{key} is not set"))
    };
    Ok(PickupAddress {
        name: var("NAME")?,
        address: var("ADDRESS")?,
        city: var("CITY")?,
        state: var("STATE")?,
        postal_code: var("POSTAL_CODE")?,
        country: env::var(format!("{prefix}_COUNTRY")).unwrap_or_else(|_| "India".to_string()),
        phone: var("PHONE")?,
    })
}
