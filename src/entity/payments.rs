use chrono::{DateTime, Utc};
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "FAILED")]
    Failed,
    #[sea_orm(string_value = "REFUNDED")]
    Refunded,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Hosted checkout whose callbacks carry an HMAC signature.
    #[sea_orm(string_value = "RAZORPAY")]
    Razorpay,
}

pub const GATEWAY_RECORD_VERSION: u32 = 1;

/// What the gateway told us about a payment, kept alongside what we did with it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct GatewayRecord {
    pub version: u32,
    /// Provider payload exactly as returned when the gateway order was created.
    pub provider_payload: Value,
    #[serde(default)]
    pub verification: Option<VerificationRecord>,
    #[serde(default)]
    pub refund: Option<RefundRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub gateway_payment_id: Option<String>,
    pub signature_valid: bool,
    pub verified_at: DateTime<Utc>,
    pub failure_reason: Option<String>,
    /// Set when a valid capture arrived for an order that can no longer take it.
    #[serde(default)]
    pub reconciliation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub refund_id: Option<String>,
    pub amount: i64,
    pub reason: Option<String>,
    pub refunded_at: DateTime<Utc>,
    pub provider_payload: Value,
}

impl GatewayRecord {
    pub fn new(provider_payload: Value) -> Self {
        Self {
            version: GATEWAY_RECORD_VERSION,
            provider_payload,
            verification: None,
            refund: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub gateway: String,
    /// Gateway order id; callbacks are matched on it.
    pub transaction_id: String,
    pub gateway_payment_id: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub gateway_response: GatewayRecord,
    pub paid_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id"
    )]
    Orders,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
