use std::{collections::BTreeSet, sync::Arc};

use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    audit,
    clock::{self, Clock},
    config::ShippingConfig,
    dto::shipments::{OrderStatusChange, TrackingUpdate, TrackingUpdateResult},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Entity as Orders, Model as OrderModel, OrderStatus},
        payments::{Column as PaymentCol, Entity as Payments, PaymentStatus},
        shippings::{
            ActiveModel as ShippingActive, Column as ShippingCol, Entity as Shippings,
            Model as ShippingModel, ShippingStatus,
        },
    },
    error::{AppError, AppResult},
    gateways::{CourierGateway, PickupLocation, ShipmentLine, ShipmentRequest},
    services::courier_status::CourierStatus,
};

/// Default gram weight per jewelry keyword found in an item name.
const WEIGHT_TABLE: &[(&str, u32)] = &[
    ("necklace", 50),
    ("bangle", 40),
    ("bracelet", 30),
    ("chain", 25),
    ("anklet", 20),
    ("earring", 15),
    ("pendant", 15),
    ("ring", 10),
];
const DEFAULT_ITEM_WEIGHT_GRAMS: u32 = 20;
pub const MIN_PARCEL_WEIGHT_GRAMS: u32 = 500;

/// Approximate parcel weight from item names. Longer keywords are checked
/// first so "earring" is not counted as "ring".
pub fn estimate_weight_grams<'a, I>(items: I) -> u32
where
    I: IntoIterator<Item = (&'a str, i32)>,
{
    let total = items
        .into_iter()
        .map(|(name, quantity)| {
            let name = name.to_ascii_lowercase();
            let per_item = WEIGHT_TABLE
                .iter()
                .find(|(keyword, _)| name.contains(keyword))
                .map_or(DEFAULT_ITEM_WEIGHT_GRAMS, |(_, grams)| *grams);
            per_item.saturating_mul(quantity.max(0).unsigned_abs())
        })
        .fold(0u32, u32::saturating_add);
    total.max(MIN_PARCEL_WEIGHT_GRAMS)
}

#[derive(Clone)]
pub struct ShipmentService {
    db: DatabaseConnection,
    courier: Arc<dyn CourierGateway>,
    config: ShippingConfig,
    clock: Arc<dyn Clock>,
}

impl ShipmentService {
    pub fn new(
        db: DatabaseConnection,
        courier: Arc<dyn CourierGateway>,
        config: ShippingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            courier,
            config,
            clock,
        }
    }

    /// Creates the courier shipment for a paid order, or returns the one that
    /// already exists. The order row stays locked for the courier call so two
    /// triggers for the same order cannot both manifest a parcel.
    #[instrument(skip(self))]
    pub async fn create_for_order(&self, order_id: Uuid) -> AppResult<ShippingModel> {
        let paid = Payments::find()
            .filter(PaymentCol::OrderId.eq(order_id))
            .filter(PaymentCol::Status.eq(PaymentStatus::Completed))
            .count(&self.db)
            .await?;
        if paid == 0 {
            return Err(AppError::BadRequest(format!(
                "Order {order_id} has no completed payment"
            )));
        }

        let txn = self.db.begin().await?;

        let order = Orders::find_by_id(order_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

        let existing = Shippings::find()
            .filter(ShippingCol::OrderId.eq(order_id))
            .one(&txn)
            .await?;
        if let Some(shipping) = existing.as_ref().filter(|s| s.tracking_number.is_some()) {
            info!(
                tracking_number = ?shipping.tracking_number,
                "shipment already exists, reusing"
            );
            return Ok(shipping.clone());
        }

        if !matches!(order.status, OrderStatus::Confirmed | OrderStatus::Processing) {
            return Err(AppError::Conflict(format!(
                "Order {} is {:?} and cannot be shipped",
                order.order_number, order.status
            )));
        }

        let postal_code = order.shipping_address.postal_code.trim().to_string();
        if postal_code.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Order {} has no shipping postal code",
                order.order_number
            )));
        }

        if !self.courier.check_serviceability(&postal_code).await? {
            warn!(%postal_code, order_number = %order.order_number, "destination not serviceable");
            return Err(AppError::NotServiceable(format!(
                "{} does not deliver to postal code {postal_code}",
                self.courier.carrier()
            )));
        }

        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        let request = self.manifest_request(&order, &items);
        let response = self.courier.create_shipment(request).await?;
        let package = response.packages.into_iter().next();

        let package = match package {
            Some(pkg) if response.success && pkg.serviceable && !pkg.waybill.is_empty() => pkg,
            Some(pkg) => {
                warn!(message = %pkg.message, refnum = %pkg.refnum, "courier refused the shipment");
                return Err(AppError::NotServiceable(if pkg.message.is_empty() {
                    "Courier could not create the shipment".to_string()
                } else {
                    pkg.message
                }));
            }
            None => {
                let message = response
                    .message
                    .unwrap_or_else(|| "Courier returned no package".to_string());
                warn!(%message, "courier refused the shipment");
                return Err(AppError::NotServiceable(message));
            }
        };

        let now = self.clock.now();
        let estimated = clock::estimated_delivery(self.clock.as_ref());
        let notes = if package.message.is_empty() {
            "Manifested".to_string()
        } else {
            format!("Manifested: {}", package.message)
        };

        let shipping = match existing {
            Some(row) => {
                let mut active: ShippingActive = row.into();
                active.tracking_number = Set(Some(package.waybill.clone()));
                active.carrier = Set(self.courier.carrier().to_string());
                active.method = Set(self.config.method.clone());
                active.status = Set(ShippingStatus::Processing);
                active.estimated_delivery = Set(Some(estimated.into()));
                active.notes = Set(Some(notes));
                active.updated_at = Set(now.into());
                active.update(&txn).await
            }
            None => {
                ShippingActive {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order.id),
                    tracking_number: Set(Some(package.waybill.clone())),
                    carrier: Set(self.courier.carrier().to_string()),
                    method: Set(self.config.method.clone()),
                    cost: Set(order.shipping_cost),
                    status: Set(ShippingStatus::Processing),
                    estimated_delivery: Set(Some(estimated.into())),
                    shipped_at: Set(None),
                    delivered_at: Set(None),
                    notes: Set(Some(notes)),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                }
                .insert(&txn)
                .await
            }
        };
        let shipping = match shipping {
            Ok(row) => row,
            Err(err) => {
                error!(
                    waybill = %package.waybill,
                    order_number = %order.order_number,
                    error = %err,
                    "waybill issued but shipping row not saved"
                );
                return Err(err.into());
            }
        };

        if order.status.can_transition_to(OrderStatus::Processing) {
            let mut active: OrderActive = order.clone().into();
            active.status = Set(OrderStatus::Processing);
            active.updated_at = Set(now.into());
            active.update(&txn).await?;
        }

        txn.commit().await?;

        info!(
            tracking_number = %package.waybill,
            order_number = %order.order_number,
            "shipment created"
        );
        audit::record(
            &self.db,
            order.user_id,
            "shipment_created",
            "shippings",
            serde_json::json!({
                "order_id": order.id,
                "tracking_number": package.waybill,
                "carrier": shipping.carrier,
            }),
        )
        .await;

        Ok(shipping)
    }

    /// Applies a courier scan to every shipping row carrying the tracking
    /// number and moves the owning orders along legal transitions only.
    #[instrument(skip(self, update), fields(tracking_number = %update.tracking_number))]
    pub async fn apply_tracking_update(
        &self,
        update: TrackingUpdate,
    ) -> AppResult<TrackingUpdateResult> {
        let tracking_number = update.tracking_number.trim().to_string();
        if tracking_number.is_empty() {
            return Err(AppError::BadRequest("trackingNumber is required".into()));
        }

        let status = CourierStatus::parse(
            &update.external_status,
            update.external_status_code.as_deref(),
        );
        if status.is_unknown() {
            warn!(
                external_status = %update.external_status,
                external_status_code = ?update.external_status_code,
                "unrecognised courier status, treating as in progress"
            );
        }
        let shipping_status = status.shipping_status();
        let order_status = status.order_status();
        let notes = scan_notes(&update);
        let now = self.clock.now();

        let txn = self.db.begin().await?;

        let rows = Shippings::find()
            .filter(ShippingCol::TrackingNumber.eq(tracking_number.as_str()))
            .lock(LockType::Update)
            .all(&txn)
            .await?;
        if rows.is_empty() {
            return Err(AppError::NotFound(format!("shipment {tracking_number}")));
        }

        let mut order_ids = BTreeSet::new();
        for row in rows {
            order_ids.insert(row.order_id);
            let current = row.status;
            let shipped_at = row.shipped_at;
            let delivered_at = row.delivered_at;
            let mut active: ShippingActive = row.into();
            active.notes = Set(Some(notes.clone()));
            active.updated_at = Set(now.into());
            if !current.can_advance_to(shipping_status) {
                // Late scans are still recorded in the notes.
                warn!(from = ?current, to = ?shipping_status, "ignoring out-of-order scan");
                active.update(&txn).await?;
                continue;
            }
            active.status = Set(shipping_status);
            if shipped_at.is_none()
                && matches!(
                    shipping_status,
                    ShippingStatus::InTransit
                        | ShippingStatus::OutForDelivery
                        | ShippingStatus::Delivered
                )
            {
                active.shipped_at = Set(Some(now.into()));
            }
            if shipping_status == ShippingStatus::Delivered && delivered_at.is_none() {
                active.delivered_at = Set(Some(now.into()));
            }
            active.update(&txn).await?;
        }

        let mut changes = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            let Some(order) = Orders::find_by_id(order_id)
                .lock(LockType::Update)
                .one(&txn)
                .await?
            else {
                warn!(%order_id, "shipping row points at a missing order");
                continue;
            };
            let from = order.status;
            let applied = from.can_transition_to(order_status);
            if applied {
                let mut active: OrderActive = order.into();
                active.status = Set(order_status);
                active.updated_at = Set(now.into());
                active.update(&txn).await?;
            } else if from != order_status {
                warn!(%order_id, ?from, to = ?order_status, "skipping illegal order transition");
            }
            changes.push(OrderStatusChange {
                order_id,
                from,
                to: order_status,
                applied,
            });
        }

        txn.commit().await?;

        info!(?shipping_status, ?order_status, "tracking update applied");
        Ok(TrackingUpdateResult {
            tracking_number,
            shipping_status,
            orders: changes,
        })
    }

    /// Polls the courier for the latest scan and applies it.
    #[instrument(skip(self))]
    pub async fn refresh_tracking(&self, tracking_number: &str) -> AppResult<TrackingUpdateResult> {
        let response = self.courier.track_shipment(tracking_number).await?;
        let scan = response
            .tracking_data
            .and_then(|data| data.shipment_data.into_iter().next())
            .filter(|_| response.success)
            .ok_or_else(|| {
                AppError::NotFound(format!("no tracking data for {tracking_number}"))
            })?;

        self.apply_tracking_update(TrackingUpdate {
            tracking_number: tracking_number.to_string(),
            external_status: scan.current_status,
            external_status_code: scan.current_status_type,
            location: scan.current_status_location,
            scan_date_time: scan.delivered_at.or(scan.current_status_time),
            instructions: scan.instructions,
            reason_code: None,
            reason_description: None,
        })
        .await
    }

    fn manifest_request(&self, order: &OrderModel, items: &[OrderItemModel]) -> ShipmentRequest {
        let address = &order.shipping_address;
        let pickup = &self.config.pickup;
        let ret = &self.config.return_address;
        let weight = estimate_weight_grams(
            items
                .iter()
                .map(|item| (item.product_name.as_str(), item.quantity)),
        );
        let quantity: i32 = items.iter().map(|item| item.quantity).sum();
        let description = items
            .iter()
            .map(|item| item.product_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let phone = address
            .phone
            .clone()
            .or_else(|| order.phone.clone())
            .unwrap_or_default();

        ShipmentRequest {
            pickup_location: PickupLocation {
                name: pickup.name.clone(),
            },
            shipments: vec![ShipmentLine {
                name: address.full_name(),
                add: address.street(),
                pin: address.postal_code.trim().to_string(),
                city: address.city.clone(),
                state: address.state.clone(),
                country: address.country.clone(),
                phone,
                order: order.order_number.clone(),
                payment_mode: "Prepaid".to_string(),
                products_desc: description,
                total_amount: format_major_units(order.total_amount),
                cod_amount: "0".to_string(),
                quantity: quantity.to_string(),
                weight: weight.to_string(),
                shipping_mode: self.config.method.clone(),
                return_name: ret.name.clone(),
                return_add: ret.address.clone(),
                return_city: ret.city.clone(),
                return_state: ret.state.clone(),
                return_pin: ret.postal_code.clone(),
                return_country: ret.country.clone(),
                return_phone: ret.phone.clone(),
            }],
        }
    }
}

fn scan_notes(update: &TrackingUpdate) -> String {
    let mut notes = update.external_status.trim().to_string();
    if let Some(location) = update.location.as_deref().filter(|l| !l.is_empty()) {
        notes.push_str(&format!(" at {location}"));
    }
    if let Some(at) = update.scan_date_time.as_deref().filter(|t| !t.is_empty()) {
        notes.push_str(&format!(" ({at})"));
    }
    if let Some(instructions) = update.instructions.as_deref().filter(|i| !i.is_empty()) {
        notes.push_str(&format!(": {instructions}"));
    }
    if let Some(reason) = update
        .reason_description
        .as_deref()
        .or(update.reason_code.as_deref())
        .filter(|r| !r.is_empty())
    {
        notes.push_str(&format!(" [{reason}]"));
    }
    notes
}

fn format_major_units(minor: i64) -> String {
    format!("{}.{:02}", minor / 100, (minor % 100).abs())
}
