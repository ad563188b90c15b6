//! Outbound adapters for the payment gateway and the courier.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod delhivery;
pub mod razorpay;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("rejected: {0}")]
    Rejected(String),
}

/// Request for a hosted payment order. `amount` is in minor units.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePaymentOrder {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    /// Full provider response, kept verbatim on the payment row.
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRefund {
    pub id: String,
    pub amount: i64,
    pub raw: Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Short name persisted on payment rows.
    fn name(&self) -> &'static str;

    /// Public key the browser checkout needs.
    fn key_id(&self) -> String;

    async fn create_order(&self, request: CreatePaymentOrder) -> Result<GatewayOrder, GatewayError>;

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;

    async fn refund(&self, payment_id: &str, amount: i64) -> Result<GatewayRefund, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickupLocation {
    pub name: String,
}

/// One consignment line of a manifest request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipmentLine {
    pub name: String,
    pub add: String,
    pub pin: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub phone: String,
    pub order: String,
    pub payment_mode: String,
    pub products_desc: String,
    pub total_amount: String,
    pub cod_amount: String,
    pub quantity: String,
    /// Grams.
    pub weight: String,
    pub shipping_mode: String,
    pub return_name: String,
    pub return_add: String,
    pub return_city: String,
    pub return_state: String,
    pub return_pin: String,
    pub return_country: String,
    pub return_phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipmentRequest {
    pub pickup_location: PickupLocation,
    pub shipments: Vec<ShipmentLine>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShipmentPackage {
    #[serde(default)]
    pub waybill: String,
    #[serde(default)]
    pub refnum: String,
    #[serde(default)]
    pub serviceable: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShipmentResponse {
    pub success: bool,
    #[serde(default)]
    pub packages: Vec<ShipmentPackage>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShipmentScan {
    pub current_status: String,
    #[serde(default)]
    pub current_status_type: Option<String>,
    #[serde(default)]
    pub current_status_location: Option<String>,
    #[serde(default)]
    pub current_status_time: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub delivered_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackingData {
    #[serde(default)]
    pub shipment_data: Vec<ShipmentScan>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackingResponse {
    pub success: bool,
    #[serde(default)]
    pub tracking_data: Option<TrackingData>,
}

#[async_trait]
pub trait CourierGateway: Send + Sync {
    fn carrier(&self) -> &'static str;

    async fn check_serviceability(&self, postal_code: &str) -> Result<bool, GatewayError>;

    async fn create_shipment(
        &self,
        request: ShipmentRequest,
    ) -> Result<ShipmentResponse, GatewayError>;

    async fn track_shipment(&self, tracking_number: &str) -> Result<TrackingResponse, GatewayError>;
}

pub(crate) async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(service, status = status.as_u16(), %body, "gateway call failed");
    Err(GatewayError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}
