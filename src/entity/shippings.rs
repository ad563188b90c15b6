use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "PROCESSING")]
    Processing,
    #[sea_orm(string_value = "IN_TRANSIT")]
    InTransit,
    #[sea_orm(string_value = "OUT_FOR_DELIVERY")]
    OutForDelivery,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "RETURNED")]
    Returned,
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

impl ShippingStatus {
    fn progress(self) -> Option<u8> {
        match self {
            ShippingStatus::Pending => Some(0),
            ShippingStatus::Processing => Some(1),
            ShippingStatus::InTransit => Some(2),
            ShippingStatus::OutForDelivery => Some(3),
            ShippingStatus::Delivered => Some(4),
            ShippingStatus::Returned | ShippingStatus::Failed => None,
        }
    }

    /// Delivered and returned parcels are settled. A failed attempt may be
    /// retried; otherwise scans only move the parcel forward.
    pub fn can_advance_to(self, next: ShippingStatus) -> bool {
        use ShippingStatus::*;
        match (self, next) {
            (Delivered | Returned, _) => false,
            (_, Returned | Failed) => true,
            (Failed, _) => true,
            (from, to) => matches!(
                (from.progress(), to.progress()),
                (Some(a), Some(b)) if b >= a
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "shippings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    /// Courier waybill. Not unique at the database level.
    pub tracking_number: Option<String>,
    pub carrier: String,
    pub method: String,
    pub cost: i64,
    pub status: ShippingStatus,
    pub estimated_delivery: Option<DateTimeWithTimeZone>,
    pub shipped_at: Option<DateTimeWithTimeZone>,
    pub delivered_at: Option<DateTimeWithTimeZone>,
    pub notes: Option<String>,
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

#[cfg(test)]
mod tests {
    use super::ShippingStatus::*;

    #[test]
    fn scans_move_parcels_forward_only() {
        assert!(Processing.can_advance_to(InTransit));
        assert!(InTransit.can_advance_to(InTransit));
        assert!(InTransit.can_advance_to(Delivered));
        assert!(!OutForDelivery.can_advance_to(Processing));
        assert!(!Delivered.can_advance_to(InTransit));
        assert!(!Delivered.can_advance_to(Returned));
        assert!(!Returned.can_advance_to(Delivered));
        assert!(InTransit.can_advance_to(Failed));
        assert!(Failed.can_advance_to(OutForDelivery));
    }
}
