use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    clock::Clock,
    config::ShippingConfig,
    gateways::{CourierGateway, PaymentGateway},
    services::{
        payment_service::PaymentService, pricing::PricingConfig, shipment_service::ShipmentService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub pricing: PricingConfig,
    pub payments: PaymentService,
    pub shipments: ShipmentService,
    pub courier_webhook_token: Option<String>,
}

impl AppState {
    pub fn new(
        orm: DatabaseConnection,
        pricing: PricingConfig,
        shipping: ShippingConfig,
        payment_gateway: Arc<dyn PaymentGateway>,
        courier: Arc<dyn CourierGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let shipments = ShipmentService::new(orm.clone(), courier, shipping, clock);
        let payments = PaymentService::new(
            orm.clone(),
            payment_gateway,
            shipments.clone(),
            pricing.currency.clone(),
        );
        Self {
            orm,
            pricing,
            payments,
            shipments,
            courier_webhook_token: None,
        }
    }

    pub fn with_webhook_token(mut self, token: Option<String>) -> Self {
        self.courier_webhook_token = token;
        self
    }
}
