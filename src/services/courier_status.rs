//! Courier status vocabulary and its two independent mappings onto
//! [`ShippingStatus`] and [`OrderStatus`].

use crate::entity::{orders::OrderStatus, shippings::ShippingStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourierStatus {
    Manifested,
    PickupPending,
    PickedUp,
    InTransit,
    Dispatched,
    OutForDelivery,
    Delivered,
    Undelivered,
    ReturnInitiated,
    Returned,
    Cancelled,
    Lost,
    Unknown(String),
}

impl CourierStatus {
    /// Parse the courier's status text, falling back to its status-type code
    /// (`UD`, `DL`, `RT`, `PP`, `PU`, `CN`) when the text is not recognised.
    pub fn parse(status: &str, status_code: Option<&str>) -> Self {
        let normalized = status
            .trim()
            .to_ascii_lowercase()
            .replace([' ', '-'], "_");

        let from_text = match normalized.as_str() {
            "manifested" | "open" => Some(Self::Manifested),
            "not_picked" | "pending" | "pickup_scheduled" | "scheduled" => {
                Some(Self::PickupPending)
            }
            "picked_up" | "pickedup" => Some(Self::PickedUp),
            "in_transit" | "intransit" | "reached_at_destination_hub" => Some(Self::InTransit),
            "dispatched" => Some(Self::Dispatched),
            "out_for_delivery" => Some(Self::OutForDelivery),
            "delivered" => Some(Self::Delivered),
            "undelivered" | "delivery_attempted" => Some(Self::Undelivered),
            "rto" | "rto_initiated" | "rto_in_transit" | "return_initiated" => {
                Some(Self::ReturnInitiated)
            }
            "returned" | "rto_delivered" | "dto" => Some(Self::Returned),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "lost" | "damaged" | "destroyed" => Some(Self::Lost),
            _ => None,
        };
        if let Some(parsed) = from_text {
            return parsed;
        }

        match status_code.map(|c| c.trim().to_ascii_uppercase()).as_deref() {
            Some("UD") => Self::InTransit,
            Some("DL") => Self::Delivered,
            Some("RT") => Self::ReturnInitiated,
            Some("PP") => Self::PickupPending,
            Some("PU") => Self::PickedUp,
            Some("CN") => Self::Cancelled,
            _ => Self::Unknown(status.trim().to_string()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }

    pub fn shipping_status(&self) -> ShippingStatus {
        match self {
            Self::Manifested | Self::PickupPending => ShippingStatus::Processing,
            Self::PickedUp | Self::InTransit | Self::Dispatched | Self::Undelivered => {
                ShippingStatus::InTransit
            }
            Self::OutForDelivery => ShippingStatus::OutForDelivery,
            Self::Delivered => ShippingStatus::Delivered,
            Self::ReturnInitiated | Self::Returned => ShippingStatus::Returned,
            Self::Cancelled | Self::Lost => ShippingStatus::Failed,
            Self::Unknown(_) => ShippingStatus::Processing,
        }
    }

    /// Orders have no out-for-delivery state; anything on the road is `Shipped`.
    pub fn order_status(&self) -> OrderStatus {
        match self {
            Self::Manifested | Self::PickupPending => OrderStatus::Processing,
            Self::PickedUp
            | Self::InTransit
            | Self::Dispatched
            | Self::OutForDelivery
            | Self::Undelivered => OrderStatus::Shipped,
            Self::Delivered => OrderStatus::Delivered,
            Self::ReturnInitiated | Self::Returned | Self::Cancelled | Self::Lost => {
                OrderStatus::Cancelled
            }
            Self::Unknown(_) => OrderStatus::Processing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_for_delivery_maps_differently_per_table() {
        let s = CourierStatus::parse("Out for Delivery", Some("UD"));
        assert_eq!(s, CourierStatus::OutForDelivery);
        assert_eq!(s.shipping_status(), ShippingStatus::OutForDelivery);
        assert_eq!(s.order_status(), OrderStatus::Shipped);
    }

    #[test]
    fn delivered_text_and_code() {
        for (text, code) in [("delivered", None), ("DELIVERED", Some("DL")), ("???", Some("DL"))] {
            let s = CourierStatus::parse(text, code);
            assert_eq!(s.shipping_status(), ShippingStatus::Delivered);
            assert_eq!(s.order_status(), OrderStatus::Delivered);
        }
    }

    #[test]
    fn returns_and_losses_cancel_the_order() {
        let rto = CourierStatus::parse("RTO In Transit", Some("RT"));
        assert_eq!(rto.shipping_status(), ShippingStatus::Returned);
        assert_eq!(rto.order_status(), OrderStatus::Cancelled);

        let lost = CourierStatus::parse("Lost", None);
        assert_eq!(lost.shipping_status(), ShippingStatus::Failed);
        assert_eq!(lost.order_status(), OrderStatus::Cancelled);
    }

    #[test]
    fn unknown_defaults_to_in_progress() {
        let s = CourierStatus::parse("Shipment held at gate", None);
        assert!(s.is_unknown());
        assert_eq!(s.shipping_status(), ShippingStatus::Processing);
        assert_eq!(s.order_status(), OrderStatus::Processing);
    }

    #[test]
    fn in_transit_code_fallback() {
        let s = CourierStatus::parse("Bagged at hub", Some("ud"));
        assert_eq!(s, CourierStatus::InTransit);
        assert_eq!(s.shipping_status(), ShippingStatus::InTransit);
        assert_eq!(s.order_status(), OrderStatus::Shipped);
    }
}
