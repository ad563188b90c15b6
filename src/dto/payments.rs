use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{entity::orders::OrderStatus, models::Payment};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentIntentRequest {
    pub order_id: Uuid,
}

/// What the browser needs to open the hosted checkout.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentIntent {
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub gateway_order_id: String,
    pub key_id: String,
    pub amount: i64,
    pub currency: String,
}

/// Fields the hosted checkout posts back after the customer pays.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentVerification {
    pub payment: Payment,
    pub order_status: OrderStatus,
    /// Set once a courier shipment exists for the order.
    pub tracking_number: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RefundRequest {
    pub reason: Option<String>,
}
