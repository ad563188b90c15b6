#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jewel_commerce::{
    clock::FixedClock,
    config::{PickupAddress, ShippingConfig},
    dto::orders::{CheckoutItem, CheckoutRequest},
    entity::{
        audit_logs, cart_items,
        coupons::{self, DiscountType},
        order_items,
        orders::{self, Address},
        payments, products, shippings,
    },
    gateways::{
        CourierGateway, CreatePaymentOrder, GatewayError, GatewayOrder, GatewayRefund,
        PaymentGateway, ShipmentPackage, ShipmentRequest, ShipmentResponse, TrackingResponse,
        razorpay,
    },
    middleware::auth::{ADMIN_ROLE, AuthUser},
    services::pricing::PricingConfig,
    state::AppState,
};
use mockall::mock;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    Schema, Set,
};
use uuid::Uuid;

pub const RAZORPAY_SECRET: &str = "rzp_test_secret";
pub const WAYBILL: &str = "1490710000123";

mock! {
    pub PaymentGw {}

    #[async_trait]
    impl PaymentGateway for PaymentGw {
        fn name(&self) -> &'static str;
        fn key_id(&self) -> String;
        async fn create_order(&self, request: CreatePaymentOrder) -> Result<GatewayOrder, GatewayError>;
        fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
        async fn refund(&self, payment_id: &str, amount: i64) -> Result<GatewayRefund, GatewayError>;
    }
}

mock! {
    pub Courier {}

    #[async_trait]
    impl CourierGateway for Courier {
        fn carrier(&self) -> &'static str;
        async fn check_serviceability(&self, postal_code: &str) -> Result<bool, GatewayError>;
        async fn create_shipment(&self, request: ShipmentRequest) -> Result<ShipmentResponse, GatewayError>;
        async fn track_shipment(&self, tracking_number: &str) -> Result<TrackingResponse, GatewayError>;
    }
}

/// Fresh in-memory SQLite database with every table created from the entities.
/// One connection only, so the database lives as long as the pool.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("connect to in-memory sqlite");

    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let statements = [
        schema.create_table_from_entity(products::Entity),
        schema.create_table_from_entity(coupons::Entity),
        schema.create_table_from_entity(cart_items::Entity),
        schema.create_table_from_entity(orders::Entity),
        schema.create_table_from_entity(order_items::Entity),
        schema.create_table_from_entity(payments::Entity),
        schema.create_table_from_entity(shippings::Entity),
        schema.create_table_from_entity(audit_logs::Entity),
    ];
    for statement in statements {
        db.execute(backend.build(&statement))
            .await
            .expect("create table");
    }
    db
}

/// Wednesday, so three business days land on the following Monday.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

pub fn fixed_clock() -> FixedClock {
    FixedClock {
        now: test_now(),
        transit_days: 3,
    }
}

pub fn shipping_config() -> ShippingConfig {
    let pickup = PickupAddress {
        name: "Jaipur Studio".into(),
        address: "12 Johari Bazaar".into(),
        city: "Jaipur".into(),
        state: "Rajasthan".into(),
        postal_code: "302003".into(),
        country: "India".into(),
        phone: "9000000001".into(),
    };
    ShippingConfig {
        return_address: pickup.clone(),
        pickup,
        method: "Surface".into(),
    }
}

pub fn build_state(db: DatabaseConnection, gateway: MockPaymentGw, courier: MockCourier) -> AppState {
    AppState::new(
        db,
        PricingConfig::default(),
        shipping_config(),
        Arc::new(gateway),
        Arc::new(courier),
        Arc::new(fixed_clock()),
    )
}

/// Gateway that opens orders named after the receipt and checks signatures
/// with the test secret. Repeat intents for a receipt get a numeric suffix.
pub fn razorpay_mock() -> MockPaymentGw {
    let mut gateway = MockPaymentGw::new();
    gateway.expect_name().return_const("razorpay");
    gateway.expect_key_id().return_const("rzp_test_key".to_string());
    let mut opened: HashMap<String, usize> = HashMap::new();
    gateway.expect_create_order().returning(move |request| {
        let seen = opened.entry(request.receipt.clone()).or_insert(0);
        *seen += 1;
        let id = match *seen {
            1 => format!("order_{}", request.receipt),
            n => format!("order_{}_{n}", request.receipt),
        };
        Ok(GatewayOrder {
            raw: serde_json::json!({
                "id": id,
                "entity": "order",
                "amount": request.amount,
                "currency": request.currency,
                "status": "created",
            }),
            id,
            amount: request.amount,
            currency: request.currency,
        })
    });
    gateway
        .expect_verify_signature()
        .returning(|order_id, payment_id, signature| {
            razorpay::verify(RAZORPAY_SECRET, order_id, payment_id, signature)
        });
    gateway
}

/// Courier that serves every postal code and manifests exactly once.
pub fn courier_mock() -> MockCourier {
    let mut courier = MockCourier::new();
    courier.expect_carrier().return_const("Delhivery");
    courier
        .expect_check_serviceability()
        .times(1)
        .returning(|_| Ok(true));
    courier
        .expect_create_shipment()
        .times(1)
        .returning(|request| Ok(manifested(&request.shipments[0].order)));
    courier
}

/// Courier that must never be contacted.
pub fn silent_courier() -> MockCourier {
    let mut courier = MockCourier::new();
    courier.expect_carrier().return_const("Delhivery");
    courier.expect_check_serviceability().never();
    courier.expect_create_shipment().never();
    courier.expect_track_shipment().never();
    courier
}

pub fn manifested(order_number: &str) -> ShipmentResponse {
    ShipmentResponse {
        success: true,
        packages: vec![ShipmentPackage {
            waybill: WAYBILL.into(),
            refnum: order_number.into(),
            serviceable: true,
            message: String::new(),
        }],
        message: None,
    }
}

pub async fn seed_product(db: &DatabaseConnection, name: &str, price: i64, stock: i32) -> products::Model {
    products::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        sku: Set(format!("SKU-{}", Uuid::new_v4().simple())),
        description: Set(None),
        image: Set(None),
        price: Set(price),
        stock: Set(stock),
        is_active: Set(true),
        created_at: Set(test_now().into()),
    }
    .insert(db)
    .await
    .expect("insert product")
}

pub async fn seed_save10(db: &DatabaseConnection) -> coupons::Model {
    coupons::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set("SAVE10".into()),
        discount_type: Set(DiscountType::Percentage),
        discount_value: Set(1_000),
        max_discount: Set(Some(5_000)),
        min_order_amount: Set(None),
        usage_limit: Set(None),
        used_count: Set(0),
        is_active: Set(true),
        valid_from: Set(None),
        valid_until: Set(None),
        created_at: Set(test_now().into()),
    }
    .insert(db)
    .await
    .expect("insert coupon")
}

pub async fn stock_of(db: &DatabaseConnection, product_id: Uuid) -> i32 {
    products::Entity::find_by_id(product_id)
        .one(db)
        .await
        .expect("query product")
        .expect("product exists")
        .stock
}

pub fn address(postal_code: &str) -> Address {
    Address {
        first_name: "Asha".into(),
        last_name: "Verma".into(),
        company: None,
        address1: "221 MG Road".into(),
        address2: Some("Flat 4B".into()),
        city: "Jaipur".into(),
        state: "Rajasthan".into(),
        postal_code: postal_code.into(),
        country: "India".into(),
        phone: Some("9876543210".into()),
    }
}

pub fn guest_checkout(items: &[(Uuid, i32)]) -> CheckoutRequest {
    CheckoutRequest {
        items: items
            .iter()
            .map(|(product_id, quantity)| CheckoutItem {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
        email: "asha@example.com".into(),
        phone: Some("9876543210".into()),
        shipping_address: address("302001"),
        billing_address: None,
        coupon_code: None,
        notes: None,
    }
}

pub fn customer() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: "customer".into(),
    }
}

pub fn admin() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: ADMIN_ROLE.into(),
    }
}

pub fn signed(order_id: &str, payment_id: &str) -> String {
    razorpay::sign(RAZORPAY_SECRET, order_id, payment_id)
}

/// Guest checkout followed by a correctly signed payment callback.
pub async fn checkout_and_pay(
    state: &AppState,
    items: &[(Uuid, i32)],
) -> (jewel_commerce::dto::payments::PaymentIntent, jewel_commerce::dto::payments::PaymentVerification) {
    use jewel_commerce::{dto::payments::VerifyPaymentRequest, services::order_service};

    let placed = order_service::create_order(state, None, guest_checkout(items))
        .await
        .expect("checkout")
        .data
        .expect("order data");
    let intent = state
        .payments
        .create_intent(placed.order.id)
        .await
        .expect("payment intent");
    let payment_id = "pay_N1x2y3z4";
    let outcome = state
        .payments
        .verify(VerifyPaymentRequest {
            razorpay_order_id: intent.gateway_order_id.clone(),
            razorpay_payment_id: Some(payment_id.into()),
            razorpay_signature: Some(signed(&intent.gateway_order_id, payment_id)),
        })
        .await
        .expect("verify");
    (intent, outcome)
}
