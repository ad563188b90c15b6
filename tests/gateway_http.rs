use std::collections::BTreeMap;

use jewel_commerce::gateways::{
    CourierGateway, CreatePaymentOrder, GatewayError, PaymentGateway, PickupLocation,
    ShipmentLine, ShipmentRequest,
    delhivery::{DelhiveryConfig, DelhiveryGateway},
    razorpay::{RazorpayConfig, RazorpayGateway, sign},
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{basic_auth, body_json, body_string_contains, header, method, path, query_param},
};

fn razorpay(server: &MockServer) -> RazorpayGateway {
    RazorpayGateway::new(
        RazorpayConfig {
            key_id: "rzp_test_key".into(),
            key_secret: "rzp_test_secret".into(),
            base_url: server.uri(),
        },
        reqwest::Client::new(),
    )
}

fn delhivery(server: &MockServer) -> DelhiveryGateway {
    DelhiveryGateway::new(
        DelhiveryConfig {
            api_token: "dlv_token".into(),
            base_url: format!("{}/", server.uri()),
        },
        reqwest::Client::new(),
    )
}

#[tokio::test]
async fn razorpay_creates_orders_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .and(basic_auth("rzp_test_key", "rzp_test_secret"))
        .and(body_json(json!({
            "amount": 108000,
            "currency": "INR",
            "receipt": "ORD-1714557600000-AB12C",
            "notes": { "order_number": "ORD-1714557600000-AB12C" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_Nx1",
            "entity": "order",
            "amount": 108000,
            "currency": "INR",
            "receipt": "ORD-1714557600000-AB12C",
            "status": "created",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut notes = BTreeMap::new();
    notes.insert("order_number".to_string(), "ORD-1714557600000-AB12C".to_string());
    let order = razorpay(&server)
        .create_order(CreatePaymentOrder {
            amount: 108_000,
            currency: "INR".into(),
            receipt: "ORD-1714557600000-AB12C".into(),
            notes,
        })
        .await
        .expect("gateway order");

    assert_eq!(order.id, "order_Nx1");
    assert_eq!(order.amount, 108_000);
    assert_eq!(order.raw["status"], "created");
}

#[tokio::test]
async fn razorpay_errors_surface_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Authentication failed"))
        .mount(&server)
        .await;

    let err = razorpay(&server)
        .create_order(CreatePaymentOrder {
            amount: 100,
            currency: "INR".into(),
            receipt: "r".into(),
            notes: BTreeMap::new(),
        })
        .await
        .expect_err("unauthorised");

    match err {
        GatewayError::Status { status, body, .. } => {
            assert_eq!(status, 401);
            assert_eq!(body, "Authentication failed");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn razorpay_refunds_and_verifies_signatures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payments/pay_Q9/refund"))
        .and(body_json(json!({ "amount": 54000 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "rfnd_Z1",
            "entity": "refund",
            "amount": 54000,
            "payment_id": "pay_Q9",
            "status": "processed",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = razorpay(&server);
    let refund = gateway.refund("pay_Q9", 54_000).await.expect("refund");
    assert_eq!(refund.id, "rfnd_Z1");
    assert_eq!(refund.amount, 54_000);

    let signature = sign("rzp_test_secret", "order_Nx1", "pay_Q9");
    assert!(gateway.verify_signature("order_Nx1", "pay_Q9", &signature));
    assert!(!gateway.verify_signature("order_Nx1", "pay_other", &signature));
}

#[tokio::test]
async fn delhivery_serviceability_requires_prepaid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/c/api/pin-codes/json/"))
        .and(query_param("filter_codes", "302001"))
        .and(header("authorization", "Token dlv_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "delivery_codes": [
                { "postal_code": { "pin": 302001, "pre_paid": "Y", "cod": "Y", "remarks": "" } }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c/api/pin-codes/json/"))
        .and(query_param("filter_codes", "999999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "delivery_codes": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c/api/pin-codes/json/"))
        .and(query_param("filter_codes", "110001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "delivery_codes": [
                { "postal_code": { "pin": 110001, "pre_paid": "Y", "remarks": "Embargo" } }
            ]
        })))
        .mount(&server)
        .await;

    let courier = delhivery(&server);
    assert!(courier.check_serviceability("302001").await.expect("lookup"));
    assert!(!courier.check_serviceability("999999").await.expect("lookup"));
    assert!(!courier.check_serviceability("110001").await.expect("lookup"));
}

fn manifest() -> ShipmentRequest {
    ShipmentRequest {
        pickup_location: PickupLocation {
            name: "Jaipur Studio".into(),
        },
        shipments: vec![ShipmentLine {
            name: "Asha Verma".into(),
            add: "221 MG Road, Flat 4B".into(),
            pin: "302001".into(),
            city: "Jaipur".into(),
            state: "Rajasthan".into(),
            country: "India".into(),
            phone: "9876543210".into(),
            order: "ORD-1714557600000-AB12C".into(),
            payment_mode: "Prepaid".into(),
            products_desc: "Gold Ring".into(),
            total_amount: "1080.00".into(),
            cod_amount: "0".into(),
            quantity: "2".into(),
            weight: "500".into(),
            shipping_mode: "Surface".into(),
            return_name: "Jaipur Studio".into(),
            return_add: "12 Johari Bazaar".into(),
            return_city: "Jaipur".into(),
            return_state: "Rajasthan".into(),
            return_pin: "302003".into(),
            return_country: "India".into(),
            return_phone: "9000000001".into(),
        }],
    }
}

#[tokio::test]
async fn delhivery_manifest_posts_form_and_reads_waybill() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/cmu/create.json"))
        .and(header("authorization", "Token dlv_token"))
        .and(body_string_contains("format=json"))
        .and(body_string_contains("Prepaid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "packages": [{
                "waybill": "1490710000123",
                "refnum": "ORD-1714557600000-AB12C",
                "status": "Success",
                "serviceable": true,
                "remarks": []
            }],
            "rmk": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = delhivery(&server)
        .create_shipment(manifest())
        .await
        .expect("manifest");
    assert!(response.success);
    assert_eq!(response.packages[0].waybill, "1490710000123");
    assert!(response.packages[0].serviceable);
}

#[tokio::test]
async fn delhivery_manifest_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/cmu/create.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "packages": [{
                "waybill": "",
                "refnum": "ORD-1714557600000-AB12C",
                "status": "Fail",
                "remarks": ["Crashing while saving package due to exception 'Non serviceable pincode'"]
            }],
            "rmk": "Package creation API error"
        })))
        .mount(&server)
        .await;

    let response = delhivery(&server)
        .create_shipment(manifest())
        .await
        .expect("manifest reply");
    assert!(!response.success);
    assert!(!response.packages[0].serviceable);
    assert!(response.packages[0].message.contains("Non serviceable"));
    assert_eq!(response.message.as_deref(), Some("Package creation API error"));
}

#[tokio::test]
async fn delhivery_tracking_reads_latest_scan() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/packages/json/"))
        .and(query_param("waybill", "1490710000123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ShipmentData": [{
                "Shipment": {
                    "AWB": "1490710000123",
                    "Status": {
                        "Status": "Delivered",
                        "StatusType": "DL",
                        "StatusLocation": "Jaipur_Malviya_Nagar",
                        "StatusDateTime": "2024-05-06T14:22:10",
                        "Instructions": "Delivered to consignee"
                    }
                }
            }]
        })))
        .mount(&server)
        .await;

    let response = delhivery(&server)
        .track_shipment("1490710000123")
        .await
        .expect("tracking");
    assert!(response.success);
    let scan = &response.tracking_data.expect("tracking data").shipment_data[0];
    assert_eq!(scan.current_status, "Delivered");
    assert_eq!(scan.current_status_type.as_deref(), Some("DL"));
    assert_eq!(scan.delivered_at.as_deref(), Some("2024-05-06T14:22:10"));
}

#[tokio::test]
async fn courier_server_errors_are_gateway_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/packages/json/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = delhivery(&server)
        .track_shipment("1490710000123")
        .await
        .expect_err("server error");
    assert!(matches!(err, GatewayError::Status { status: 500, .. }));
}
