use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, instrument};

use super::{
    CreatePaymentOrder, GatewayError, GatewayOrder, GatewayRefund, PaymentGateway, ensure_success,
};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "razorpay";

#[derive(Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct RazorpayGateway {
    config: RazorpayConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a std::collections::BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct OrderReply {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Serialize)]
struct RefundBody {
    amount: i64,
}

#[derive(Deserialize)]
struct RefundReply {
    id: String,
    amount: i64,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

/// Hex HMAC-SHA256 of `"<order_id>|<payment_id>"`, the value checkout callbacks carry.
pub fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
    mac_for(secret, order_id, payment_id)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

pub fn verify(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    if order_id.is_empty() || payment_id.is_empty() || signature.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    mac_for(secret, order_id, payment_id)
        .is_some_and(|mac| mac.verify_slice(&expected).is_ok())
}

fn mac_for(secret: &str, order_id: &str, payment_id: &str) -> Option<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Some(mac)
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn name(&self) -> &'static str {
        SERVICE
    }

    fn key_id(&self) -> String {
        self.config.key_id.clone()
    }

    #[instrument(skip(self, request), fields(receipt = %request.receipt, amount = request.amount))]
    async fn create_order(&self, request: CreatePaymentOrder) -> Result<GatewayOrder, GatewayError> {
        let response = self
            .client
            .post(self.url("/v1/orders"))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&OrderBody {
                amount: request.amount,
                currency: &request.currency,
                receipt: &request.receipt,
                notes: &request.notes,
            })
            .send()
            .await?;
        let raw: Value = ensure_success(SERVICE, response).await?.json().await?;
        let reply: OrderReply = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::Decode(format!("razorpay order: {e}")))?;

        info!(gateway_order_id = %reply.id, "razorpay order created");
        Ok(GatewayOrder {
            id: reply.id,
            amount: reply.amount,
            currency: reply.currency,
            raw,
        })
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify(&self.config.key_secret, order_id, payment_id, signature)
    }

    #[instrument(skip(self))]
    async fn refund(&self, payment_id: &str, amount: i64) -> Result<GatewayRefund, GatewayError> {
        let response = self
            .client
            .post(self.url(&format!("/v1/payments/{payment_id}/refund")))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&RefundBody { amount })
            .send()
            .await?;
        let raw: Value = ensure_success(SERVICE, response).await?.json().await?;
        let reply: RefundReply = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::Decode(format!("razorpay refund: {e}")))?;

        info!(refund_id = %reply.id, "razorpay refund created");
        Ok(GatewayRefund {
            id: reply.id,
            amount: reply.amount,
            raw,
        })
    }
}
