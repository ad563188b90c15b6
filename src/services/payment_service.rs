use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    audit,
    dto::payments::{PaymentIntent, PaymentVerification, VerifyPaymentRequest},
    entity::{
        orders::{ActiveModel as OrderActive, Entity as Orders, OrderStatus},
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments, GatewayRecord,
            Model as PaymentModel, PaymentMethod, PaymentStatus, RefundRecord, VerificationRecord,
        },
        shippings::{Column as ShippingCol, Entity as Shippings},
    },
    error::{AppError, AppResult},
    gateways::{CreatePaymentOrder, PaymentGateway},
    services::{order_service, shipment_service::ShipmentService},
};

const DUPLICATE_PAYMENT: &str = "duplicate payment: order already paid";
pub const ORDER_NOT_PAYABLE: &str = "order no longer payable: capture refunded";

#[derive(Clone)]
pub struct PaymentService {
    db: DatabaseConnection,
    gateway: Arc<dyn PaymentGateway>,
    shipments: ShipmentService,
    currency: String,
}

impl PaymentService {
    pub fn new(
        db: DatabaseConnection,
        gateway: Arc<dyn PaymentGateway>,
        shipments: ShipmentService,
        currency: String,
    ) -> Self {
        Self {
            db,
            gateway,
            shipments,
            currency,
        }
    }

    /// Opens a gateway order for a pending order and records a PENDING payment.
    #[instrument(skip(self))]
    pub async fn create_intent(&self, order_id: Uuid) -> AppResult<PaymentIntent> {
        let order = Orders::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

        let completed = Payments::find()
            .filter(PaymentCol::OrderId.eq(order.id))
            .filter(PaymentCol::Status.eq(PaymentStatus::Completed))
            .count(&self.db)
            .await?;
        if completed > 0 {
            return Err(AppError::Conflict(format!(
                "Order {} is already paid",
                order.order_number
            )));
        }
        if order.status != OrderStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Order {} is {:?} and cannot take a payment",
                order.order_number, order.status
            )));
        }

        let mut notes = BTreeMap::new();
        notes.insert("order_id".to_string(), order.id.to_string());
        notes.insert("order_number".to_string(), order.order_number.clone());

        let gateway_order = self
            .gateway
            .create_order(CreatePaymentOrder {
                amount: order.total_amount,
                currency: self.currency.clone(),
                receipt: order.order_number.clone(),
                notes,
            })
            .await
            .map_err(|err| {
                error!(order_number = %order.order_number, error = %err, "gateway order creation failed");
                err
            })?;

        let now = Utc::now();
        let payment = PaymentActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            amount: Set(order.total_amount),
            currency: Set(self.currency.clone()),
            payment_method: Set(PaymentMethod::Razorpay),
            status: Set(PaymentStatus::Pending),
            gateway: Set(self.gateway.name().to_string()),
            transaction_id: Set(gateway_order.id.clone()),
            gateway_payment_id: Set(None),
            gateway_response: Set(GatewayRecord::new(gateway_order.raw)),
            paid_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.db)
        .await?;

        info!(
            payment_id = %payment.id,
            gateway_order_id = %gateway_order.id,
            amount = payment.amount,
            "payment intent created"
        );

        Ok(PaymentIntent {
            payment_id: payment.id,
            order_id: order.id,
            order_number: order.order_number,
            gateway_order_id: gateway_order.id,
            key_id: self.gateway.key_id(),
            amount: payment.amount,
            currency: payment.currency,
        })
    }

    /// Settles a payment from the checkout callback. Redelivered callbacks
    /// for a settled payment return the recorded outcome unchanged.
    #[instrument(skip(self, callback), fields(gateway_order_id = %callback.razorpay_order_id))]
    pub async fn verify(&self, callback: VerifyPaymentRequest) -> AppResult<PaymentVerification> {
        let gateway_order_id = callback.razorpay_order_id.trim();
        if gateway_order_id.is_empty() {
            return Err(AppError::BadRequest("razorpay_order_id is required".into()));
        }
        let gateway_payment_id = callback
            .razorpay_payment_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let signature = callback
            .razorpay_signature
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let txn = self.db.begin().await?;

        let payment = Payments::find()
            .filter(PaymentCol::TransactionId.eq(gateway_order_id))
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payment for {gateway_order_id}")))?;

        if payment.status != PaymentStatus::Pending {
            txn.commit().await?;
            info!(payment_id = %payment.id, status = ?payment.status, "payment already settled");
            return self.outcome(payment).await;
        }

        let order = Orders::find_by_id(payment.order_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {}", payment.order_id)))?;

        let signature_valid = match (payment.payment_method, gateway_payment_id, signature) {
            (PaymentMethod::Razorpay, Some(payment_id), Some(signature)) => {
                self.gateway
                    .verify_signature(gateway_order_id, payment_id, signature)
            }
            _ => false,
        };

        let already_paid = Payments::find()
            .filter(PaymentCol::OrderId.eq(order.id))
            .filter(PaymentCol::Id.ne(payment.id))
            .filter(PaymentCol::Status.eq(PaymentStatus::Completed))
            .count(&txn)
            .await?
            > 0;

        let now = Utc::now();
        let failure_reason = match (signature_valid, already_paid) {
            (true, false) => None,
            (true, true) => Some(DUPLICATE_PAYMENT.to_string()),
            (false, _) if gateway_payment_id.is_none() => Some("missing payment id".to_string()),
            (false, _) => Some("signature mismatch".to_string()),
        };
        let status = if failure_reason.is_none() {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Failed
        };

        let order_id = order.id;
        let order_number = order.order_number.clone();
        let target = match status {
            PaymentStatus::Completed => OrderStatus::Confirmed,
            _ => OrderStatus::Cancelled,
        };
        // A duplicate never touches the order; a failure only cancels an unpaid order.
        let move_order = !already_paid
            && match status {
                PaymentStatus::Completed => order.status.can_transition_to(target),
                _ => order.status == OrderStatus::Pending,
            };
        // Money captured against a cancelled order goes straight back.
        let orphaned = status == PaymentStatus::Completed && !move_order;
        let reconciliation = orphaned.then(|| ORDER_NOT_PAYABLE.to_string());

        let mut record = payment.gateway_response.clone();
        record.verification = Some(VerificationRecord {
            gateway_payment_id: gateway_payment_id.map(str::to_string),
            signature_valid,
            verified_at: now,
            failure_reason: failure_reason.clone(),
            reconciliation: reconciliation.clone(),
        });

        let mut active: PaymentActive = payment.into();
        active.status = Set(status);
        active.gateway_payment_id = Set(gateway_payment_id.map(str::to_string));
        active.gateway_response = Set(record);
        if status == PaymentStatus::Completed {
            active.paid_at = Set(Some(now.into()));
        }
        active.updated_at = Set(now.into());
        let payment = active.update(&txn).await?;

        if move_order {
            let mut active: OrderActive = order.into();
            active.status = Set(target);
            active.updated_at = Set(now.into());
            active.update(&txn).await?;
            if target == OrderStatus::Cancelled {
                order_service::release_stock(&txn, order_id).await?;
            }
        } else if orphaned {
            warn!(
                %order_id,
                order_status = ?order.status,
                payment_id = %payment.id,
                "payment captured for an order that can no longer be confirmed"
            );
        }

        txn.commit().await?;

        match &failure_reason {
            None => info!(payment_id = %payment.id, %order_number, "payment completed"),
            Some(reason) => warn!(payment_id = %payment.id, %order_number, %reason, "payment failed"),
        }
        audit::record(
            &self.db,
            None,
            if status == PaymentStatus::Completed {
                "payment_completed"
            } else {
                "payment_failed"
            },
            "payments",
            serde_json::json!({
                "payment_id": payment.id,
                "order_id": order_id,
                "gateway_order_id": payment.transaction_id,
                "reason": failure_reason,
                "reconciliation": reconciliation,
            }),
        )
        .await;

        if orphaned {
            return match self
                .settle_refund(payment.id, Some(ORDER_NOT_PAYABLE.to_string()), None, false)
                .await
            {
                Ok(outcome) => Ok(outcome),
                Err(err) => {
                    error!(
                        payment_id = %payment.id,
                        %order_id,
                        error = %err,
                        "automatic refund failed, payment needs a manual refund"
                    );
                    self.outcome(payment).await
                }
            };
        }

        if status == PaymentStatus::Completed && move_order {
            if let Err(err) = self.shipments.create_for_order(order_id).await {
                error!(%order_id, %order_number, error = %err, "shipment creation after payment failed");
            }
        }

        self.outcome(payment).await
    }

    /// Refunds a completed payment in full and marks the order refunded.
    #[instrument(skip(self, reason))]
    pub async fn refund(
        &self,
        payment_id: Uuid,
        reason: Option<String>,
        actor: Option<Uuid>,
    ) -> AppResult<PaymentVerification> {
        self.settle_refund(payment_id, reason, actor, true).await
    }

    async fn settle_refund(
        &self,
        payment_id: Uuid,
        reason: Option<String>,
        actor: Option<Uuid>,
        refund_order: bool,
    ) -> AppResult<PaymentVerification> {
        let txn = self.db.begin().await?;

        let payment = Payments::find_by_id(payment_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payment {payment_id}")))?;

        if payment.status != PaymentStatus::Completed {
            return Err(AppError::Conflict(format!(
                "Payment {payment_id} is {:?} and cannot be refunded",
                payment.status
            )));
        }
        let gateway_payment_id = payment.gateway_payment_id.clone().ok_or_else(|| {
            AppError::Conflict(format!("Payment {payment_id} has no gateway payment id"))
        })?;

        let refund = self
            .gateway
            .refund(&gateway_payment_id, payment.amount)
            .await
            .map_err(|err| {
                error!(%payment_id, %gateway_payment_id, error = %err, "gateway refund failed");
                err
            })?;

        let now = Utc::now();
        let mut record = payment.gateway_response.clone();
        record.refund = Some(RefundRecord {
            refund_id: Some(refund.id.clone()),
            amount: refund.amount,
            reason: reason.clone(),
            refunded_at: now,
            provider_payload: refund.raw,
        });

        let order_id = payment.order_id;
        let mut active: PaymentActive = payment.into();
        active.status = Set(PaymentStatus::Refunded);
        active.gateway_response = Set(record);
        active.updated_at = Set(now.into());
        let payment = active.update(&txn).await?;

        let order = if refund_order {
            Orders::find_by_id(order_id)
                .lock(LockType::Update)
                .one(&txn)
                .await?
        } else {
            None
        };
        if let Some(order) = order {
            if order.status.can_transition_to(OrderStatus::Refunded) {
                let mut active: OrderActive = order.into();
                active.status = Set(OrderStatus::Refunded);
                active.updated_at = Set(now.into());
                active.update(&txn).await?;
            }
        }

        txn.commit().await?;

        info!(%payment_id, refund_id = %refund.id, amount = refund.amount, "payment refunded");
        audit::record(
            &self.db,
            actor,
            "payment_refunded",
            "payments",
            serde_json::json!({
                "payment_id": payment_id,
                "order_id": order_id,
                "refund_id": refund.id,
                "amount": refund.amount,
                "reason": reason,
            }),
        )
        .await;

        self.outcome(payment).await
    }

    async fn outcome(&self, payment: PaymentModel) -> AppResult<PaymentVerification> {
        let order_status = Orders::find_by_id(payment.order_id)
            .one(&self.db)
            .await?
            .map(|o| o.status)
            .ok_or_else(|| AppError::NotFound(format!("order {}", payment.order_id)))?;
        let tracking_number = Shippings::find()
            .filter(ShippingCol::OrderId.eq(payment.order_id))
            .one(&self.db)
            .await?
            .and_then(|s| s.tracking_number);

        Ok(PaymentVerification {
            payment: payment.into(),
            order_status,
            tracking_number,
        })
    }
}
