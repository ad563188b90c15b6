use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    cart_items::Model as CartItemModel,
    order_items::Model as OrderItemModel,
    orders::{Address, Model as OrderModel, OrderStatus},
    payments::{Model as PaymentModel, PaymentMethod, PaymentStatus},
    products::Model as ProductModel,
    shippings::{Model as ShippingModel, ShippingStatus},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// Amounts are in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub email: String,
    pub phone: Option<String>,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub tax_amount: i64,
    pub shipping_cost: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub currency: String,
    pub coupon_code: Option<String>,
    pub billing_address: Address,
    pub shipping_address: Address,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub image: Option<String>,
    pub quantity: i32,
    pub unit_price: i64,
    pub total_price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub gateway: String,
    pub transaction_id: String,
    pub gateway_payment_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Shipping {
    pub id: Uuid,
    pub order_id: Uuid,
    pub tracking_number: Option<String>,
    pub carrier: String,
    pub method: String,
    pub cost: i64,
    pub status: ShippingStatus,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl From<ProductModel> for Product {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            sku: model.sku,
            description: model.description,
            image: model.image,
            price: model.price,
            stock: model.stock,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<CartItemModel> for CartItem {
    fn from(model: CartItemModel) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            user_id: model.user_id,
            quantity: model.quantity,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<OrderModel> for Order {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            user_id: model.user_id,
            email: model.email,
            phone: model.phone,
            status: model.status,
            subtotal: model.subtotal,
            tax_amount: model.tax_amount,
            shipping_cost: model.shipping_cost,
            discount_amount: model.discount_amount,
            total_amount: model.total_amount,
            currency: model.currency,
            coupon_code: model.coupon_code,
            billing_address: model.billing_address,
            shipping_address: model.shipping_address,
            notes: model.notes,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<OrderItemModel> for OrderItem {
    fn from(model: OrderItemModel) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            product_name: model.product_name,
            sku: model.sku,
            image: model.image,
            quantity: model.quantity,
            unit_price: model.unit_price,
            total_price: model.total_price,
        }
    }
}

impl From<PaymentModel> for Payment {
    fn from(model: PaymentModel) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            amount: model.amount,
            currency: model.currency,
            payment_method: model.payment_method,
            status: model.status,
            gateway: model.gateway,
            transaction_id: model.transaction_id,
            gateway_payment_id: model.gateway_payment_id,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<ShippingModel> for Shipping {
    fn from(model: ShippingModel) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            tracking_number: model.tracking_number,
            carrier: model.carrier,
            method: model.method,
            cost: model.cost,
            status: model.status,
            estimated_delivery: model.estimated_delivery.map(|dt| dt.with_timezone(&Utc)),
            shipped_at: model.shipped_at.map(|dt| dt.with_timezone(&Utc)),
            delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
            notes: model.notes,
        }
    }
}
