mod common;

use common::*;
use jewel_commerce::{
    dto::{admin::UpdateOrderStatusRequest, shipments::TrackingUpdate},
    entity::{
        orders::{self, OrderStatus},
        shippings::{self, ShippingStatus},
    },
    error::AppError,
    gateways::{ShipmentPackage, ShipmentResponse, ShipmentScan, TrackingData, TrackingResponse},
    services::{admin_service, order_service},
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

fn scan(status: &str, code: Option<&str>) -> TrackingUpdate {
    TrackingUpdate {
        tracking_number: WAYBILL.into(),
        external_status: status.into(),
        external_status_code: code.map(str::to_string),
        location: Some("Jaipur_Hub".into()),
        scan_date_time: Some("2024-05-03T09:15:00".into()),
        instructions: None,
        reason_code: None,
        reason_description: None,
    }
}

async fn order_status(db: &sea_orm::DatabaseConnection, id: uuid::Uuid) -> OrderStatus {
    orders::Entity::find_by_id(id)
        .one(db)
        .await
        .expect("query order")
        .expect("order exists")
        .status
}

#[tokio::test]
async fn shipment_creation_is_idempotent() -> anyhow::Result<()> {
    let db = setup_db().await;
    let necklace = seed_product(&db, "Temple Necklace", 240_000, 3).await;
    let state = build_state(db.clone(), razorpay_mock(), courier_mock());

    let (intent, _) = checkout_and_pay(&state, &[(necklace.id, 1)]).await;

    // The payment already triggered one manifest; further triggers reuse it.
    let first = state.shipments.create_for_order(intent.order_id).await?;
    let second = state.shipments.create_for_order(intent.order_id).await?;
    assert_eq!(first.id, second.id);
    assert_eq!(second.tracking_number.as_deref(), Some(WAYBILL));

    let rows = shippings::Entity::find()
        .filter(shippings::Column::OrderId.eq(intent.order_id))
        .count(&db)
        .await?;
    assert_eq!(rows, 1);
    Ok(())
}

#[tokio::test]
async fn unpaid_orders_are_not_shipped() -> anyhow::Result<()> {
    let db = setup_db().await;
    let ring = seed_product(&db, "Gold Ring", 50_000, 5).await;
    let state = build_state(db.clone(), razorpay_mock(), silent_courier());

    let placed = order_service::create_order(&state, None, guest_checkout(&[(ring.id, 1)]))
        .await?
        .data
        .expect("order data");

    let err = state
        .shipments
        .create_for_order(placed.order.id)
        .await
        .expect_err("no payment yet");
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn refused_package_creates_no_row() -> anyhow::Result<()> {
    let db = setup_db().await;
    let ring = seed_product(&db, "Gold Ring", 50_000, 5).await;

    let mut courier = MockCourier::new();
    courier.expect_carrier().return_const("Delhivery");
    courier
        .expect_check_serviceability()
        .returning(|_| Ok(true));
    courier.expect_create_shipment().returning(|request| {
        Ok(ShipmentResponse {
            success: false,
            packages: vec![ShipmentPackage {
                waybill: String::new(),
                refnum: request.shipments[0].order.clone(),
                serviceable: false,
                message: "ODA pincode, not serviceable".into(),
            }],
            message: Some("Package creation failed".into()),
        })
    });

    let state = build_state(db.clone(), razorpay_mock(), courier);
    let (intent, outcome) = checkout_and_pay(&state, &[(ring.id, 1)]).await;
    assert_eq!(outcome.order_status, OrderStatus::Confirmed);

    let err = state
        .shipments
        .create_for_order(intent.order_id)
        .await
        .expect_err("courier refuses");
    assert!(matches!(err, AppError::NotServiceable(ref msg) if msg.contains("ODA")));
    assert_eq!(shippings::Entity::find().count(&db).await?, 0);
    assert_eq!(order_status(&db, intent.order_id).await, OrderStatus::Confirmed);
    Ok(())
}

#[tokio::test]
async fn delivered_scan_completes_the_order() -> anyhow::Result<()> {
    let db = setup_db().await;
    let bangle = seed_product(&db, "Antique Bangle", 26_000, 4).await;
    let state = build_state(db.clone(), razorpay_mock(), courier_mock());
    let (intent, _) = checkout_and_pay(&state, &[(bangle.id, 2)]).await;

    let result = state
        .shipments
        .apply_tracking_update(scan("Delivered", Some("DL")))
        .await?;
    assert_eq!(result.shipping_status, ShippingStatus::Delivered);
    assert_eq!(result.orders.len(), 1);
    assert!(result.orders[0].applied);
    assert_eq!(result.orders[0].from, OrderStatus::Processing);
    assert_eq!(result.orders[0].to, OrderStatus::Delivered);

    let shipping = shippings::Entity::find()
        .filter(shippings::Column::TrackingNumber.eq(WAYBILL))
        .one(&db)
        .await?
        .expect("shipping row");
    assert_eq!(shipping.status, ShippingStatus::Delivered);
    assert!(shipping.delivered_at.is_some());
    assert!(shipping.shipped_at.is_some());
    assert_eq!(
        shipping.notes.as_deref(),
        Some("Delivered at Jaipur_Hub (2024-05-03T09:15:00)")
    );
    assert_eq!(order_status(&db, intent.order_id).await, OrderStatus::Delivered);
    Ok(())
}

async fn shipping_row(db: &sea_orm::DatabaseConnection) -> shippings::Model {
    shippings::Entity::find()
        .filter(shippings::Column::TrackingNumber.eq(WAYBILL))
        .one(db)
        .await
        .expect("query shipping")
        .expect("shipping row")
}

#[tokio::test]
async fn backward_scans_move_neither_parcel_nor_order() -> anyhow::Result<()> {
    let db = setup_db().await;
    let anklet = seed_product(&db, "Ghungroo Anklet", 15_000, 4).await;
    let state = build_state(db.clone(), razorpay_mock(), courier_mock());
    let (intent, _) = checkout_and_pay(&state, &[(anklet.id, 1)]).await;

    state
        .shipments
        .apply_tracking_update(scan("In Transit", Some("UD")))
        .await?;
    assert_eq!(order_status(&db, intent.order_id).await, OrderStatus::Shipped);
    assert_eq!(shipping_row(&db).await.status, ShippingStatus::InTransit);

    let result = state
        .shipments
        .apply_tracking_update(scan("Manifested", Some("UD")))
        .await?;
    assert!(!result.orders[0].applied);
    assert_eq!(order_status(&db, intent.order_id).await, OrderStatus::Shipped);
    let shipping = shipping_row(&db).await;
    assert_eq!(shipping.status, ShippingStatus::InTransit);
    assert_eq!(
        shipping.notes.as_deref(),
        Some("Manifested at Jaipur_Hub (2024-05-03T09:15:00)")
    );

    // Unrecognised text with no code is treated as still in progress.
    let result = state
        .shipments
        .apply_tracking_update(scan("Held at customs", None))
        .await?;
    assert_eq!(result.orders[0].to, OrderStatus::Processing);
    assert!(!result.orders[0].applied);
    assert_eq!(shipping_row(&db).await.status, ShippingStatus::InTransit);
    Ok(())
}

#[tokio::test]
async fn late_scans_after_delivery_keep_the_parcel_delivered() -> anyhow::Result<()> {
    let db = setup_db().await;
    let chain = seed_product(&db, "Rope Chain", 18_000, 4).await;
    let state = build_state(db.clone(), razorpay_mock(), courier_mock());
    let (intent, _) = checkout_and_pay(&state, &[(chain.id, 1)]).await;

    state
        .shipments
        .apply_tracking_update(scan("Delivered", Some("DL")))
        .await?;

    let mut late = scan("In Transit", Some("UD"));
    late.scan_date_time = Some("2024-05-02T18:40:00".into());
    state.shipments.apply_tracking_update(late).await?;

    let shipping = shipping_row(&db).await;
    assert_eq!(shipping.status, ShippingStatus::Delivered);
    assert!(shipping.delivered_at.is_some());
    assert_eq!(
        shipping.notes.as_deref(),
        Some("In Transit at Jaipur_Hub (2024-05-02T18:40:00)")
    );
    assert_eq!(order_status(&db, intent.order_id).await, OrderStatus::Delivered);

    state
        .shipments
        .apply_tracking_update(scan("Held at customs", None))
        .await?;
    assert_eq!(shipping_row(&db).await.status, ShippingStatus::Delivered);
    Ok(())
}

#[tokio::test]
async fn cancelled_orders_are_never_manifested() -> anyhow::Result<()> {
    let db = setup_db().await;
    let ring = seed_product(&db, "Gold Ring", 50_000, 5).await;

    // Destination refused at payment time; no parcel may be manifested afterwards.
    let mut courier = MockCourier::new();
    courier.expect_carrier().return_const("Delhivery");
    courier.expect_create_shipment().never();
    courier
        .expect_check_serviceability()
        .times(1)
        .returning(|_| Ok(false));
    let state = build_state(db.clone(), razorpay_mock(), courier);

    let (intent, paid) = checkout_and_pay(&state, &[(ring.id, 1)]).await;
    assert_eq!(paid.order_status, OrderStatus::Confirmed);
    assert_eq!(stock_of(&db, ring.id).await, 4);

    admin_service::update_order_status(
        &state,
        &admin(),
        intent.order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Cancelled,
            note: None,
        },
    )
    .await?;
    assert_eq!(stock_of(&db, ring.id).await, 5);

    let err = state
        .shipments
        .create_for_order(intent.order_id)
        .await
        .expect_err("cancelled order");
    assert!(matches!(err, AppError::Conflict(_)));

    let rows = shippings::Entity::find()
        .filter(shippings::Column::OrderId.eq(intent.order_id))
        .count(&db)
        .await?;
    assert_eq!(rows, 0);
    assert_eq!(order_status(&db, intent.order_id).await, OrderStatus::Cancelled);
    Ok(())
}

#[tokio::test]
async fn unknown_waybill_is_not_found() {
    let db = setup_db().await;
    let state = build_state(db, razorpay_mock(), silent_courier());

    let err = state
        .shipments
        .apply_tracking_update(scan("Delivered", Some("DL")))
        .await
        .expect_err("no such waybill");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn refresh_polls_the_courier() -> anyhow::Result<()> {
    let db = setup_db().await;
    let studs = seed_product(&db, "Pearl Stud Earrings", 12_000, 4).await;

    let mut courier = courier_mock();
    courier
        .expect_track_shipment()
        .withf(|waybill| waybill == WAYBILL)
        .times(1)
        .returning(|_| {
            Ok(TrackingResponse {
                success: true,
                tracking_data: Some(TrackingData {
                    shipment_data: vec![ShipmentScan {
                        current_status: "Out for Delivery".into(),
                        current_status_type: Some("UD".into()),
                        current_status_location: Some("Jaipur_Malviya_Nagar".into()),
                        current_status_time: Some("2024-05-06T08:00:00".into()),
                        instructions: Some("Out for delivery".into()),
                        delivered_at: None,
                    }],
                }),
            })
        });

    let state = build_state(db.clone(), razorpay_mock(), courier);
    let (intent, _) = checkout_and_pay(&state, &[(studs.id, 1)]).await;

    let result = state.shipments.refresh_tracking(WAYBILL).await?;
    assert_eq!(result.shipping_status, ShippingStatus::OutForDelivery);
    assert_eq!(order_status(&db, intent.order_id).await, OrderStatus::Shipped);
    Ok(())
}
