use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{orders::OrderStatus, shippings::ShippingStatus};

/// Scan pushed by the courier.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUpdate {
    pub tracking_number: String,
    pub external_status: String,
    pub external_status_code: Option<String>,
    pub location: Option<String>,
    pub scan_date_time: Option<String>,
    pub instructions: Option<String>,
    pub reason_code: Option<String>,
    pub reason_description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStatusChange {
    pub order_id: Uuid,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub applied: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackingUpdateResult {
    pub tracking_number: String,
    pub shipping_status: ShippingStatus,
    pub orders: Vec<OrderStatusChange>,
}
