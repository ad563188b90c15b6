use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CheckoutRequest, OrderDetail, OrderList, OrderWithItems},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        coupons::{Column as CouponCol, Entity as Coupons},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
        },
        orders::{
            ActiveModel as OrderActive, Address, Column as OrderCol, Entity as Orders,
            Model as OrderModel, OrderStatus,
        },
        payments::{Column as PaymentCol, Entity as Payments},
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
        shippings::{Column as ShippingCol, Entity as Shippings},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, Payment, Shipping},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::pricing,
    state::AppState,
};

const ORDER_SUFFIX_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// `ORD-<epoch-millis>-<5 base36 chars>`.
pub fn generate_order_number<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..5)
        .map(|_| ORDER_SUFFIX_ALPHABET[rng.gen_range(0..ORDER_SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("ORD-{}-{}", now.timestamp_millis(), suffix)
}

#[instrument(skip_all, fields(user_id = ?customer.map(|u| u.user_id)))]
pub async fn create_order(
    state: &AppState,
    customer: Option<&AuthUser>,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    validate_contact(&payload)?;

    if customer.is_none() && payload.items.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let txn = state.orm.begin().await?;

    let raw_lines: Vec<(Uuid, i32)> = match customer {
        Some(user) => CartItems::find()
            .filter(CartCol::UserId.eq(user.user_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|item| (item.product_id, item.quantity))
            .collect(),
        None => payload
            .items
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect(),
    };
    let lines = merge_lines(raw_lines)?;

    // Locks are taken in product-id order so concurrent checkouts cannot deadlock.
    let products: BTreeMap<Uuid, ProductModel> = Products::find()
        .filter(ProdCol::Id.is_in(lines.keys().copied().collect::<Vec<_>>()))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    for (product_id, quantity) in &lines {
        let product = products
            .get(product_id)
            .ok_or_else(|| AppError::BadRequest(format!("Product {product_id} not found")))?;
        if !product.is_active {
            return Err(AppError::BadRequest(format!(
                "Product {} is not available",
                product.name
            )));
        }
        if product.stock < *quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for product {}",
                product.name
            )));
        }
    }

    let subtotal = pricing::subtotal(
        lines
            .iter()
            .map(|(id, qty)| (products[id].price, *qty)),
    );

    let now = Utc::now();
    let coupon = match payload.coupon_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => redeem_coupon(&txn, code, subtotal, now).await?,
        _ => None,
    };
    let discount = coupon.as_ref().map_or(0, |c| c.discount);
    let quote = pricing::quote(&state.pricing, subtotal, discount);

    let order_number = generate_order_number(now, &mut rand::thread_rng());
    let shipping_address = payload.shipping_address.clone();
    let billing_address = payload
        .billing_address
        .clone()
        .unwrap_or_else(|| shipping_address.clone());

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        order_number: Set(order_number),
        user_id: Set(customer.map(|u| u.user_id)),
        email: Set(payload.email.trim().to_string()),
        phone: Set(payload.phone.clone()),
        status: Set(OrderStatus::Pending),
        subtotal: Set(quote.subtotal),
        tax_amount: Set(quote.tax_amount),
        shipping_cost: Set(quote.shipping_cost),
        discount_amount: Set(quote.discount_amount),
        total_amount: Set(quote.total_amount),
        currency: Set(state.pricing.currency.clone()),
        coupon_id: Set(coupon.as_ref().map(|c| c.id)),
        coupon_code: Set(coupon.as_ref().map(|c| c.code.clone())),
        billing_address: Set(billing_address),
        shipping_address: Set(shipping_address),
        notes: Set(payload.notes.clone()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for (product_id, quantity) in &lines {
        let product = &products[product_id];
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            product_name: Set(product.name.clone()),
            sku: Set(product.sku.clone()),
            image: Set(product.image.clone()),
            quantity: Set(*quantity),
            unit_price: Set(product.price),
            total_price: Set(product.price * i64::from(*quantity)),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;
        items.push(item.into());

        decrement_stock(&txn, product, *quantity).await?;
    }

    if let Some(user) = customer {
        CartItems::delete_many()
            .filter(CartCol::UserId.eq(user.user_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total_amount = order.total_amount,
        "order created"
    );
    audit::record(
        &state.orm,
        customer.map(|u| u.user_id),
        "checkout",
        "orders",
        serde_json::json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "total_amount": order.total_amount,
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Checkout success",
        OrderWithItems {
            order: order.into(),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders: Vec<Order> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Customers see their own orders; admins see any.
pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    let mut condition = Condition::all().add(OrderCol::Id.eq(id));
    if !user.is_admin() {
        condition = condition.add(OrderCol::UserId.eq(user.user_id));
    }
    let order = Orders::find()
        .filter(condition)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    let detail = load_detail(&state.orm, order).await?;
    Ok(ApiResponse::success("OK", detail, Some(Meta::empty())))
}

/// Guest lookup by order number and the email used at checkout.
pub async fn track_order(
    state: &AppState,
    order_number: &str,
    email: &str,
) -> AppResult<ApiResponse<OrderDetail>> {
    let order = Orders::find()
        .filter(OrderCol::OrderNumber.eq(order_number))
        .one(&state.orm)
        .await?
        .filter(|o| o.email.eq_ignore_ascii_case(email.trim()))
        .ok_or_else(|| AppError::NotFound(format!("order {order_number}")))?;

    let detail = load_detail(&state.orm, order).await?;
    Ok(ApiResponse::success("OK", detail, Some(Meta::empty())))
}

pub(crate) async fn load_detail<C: ConnectionTrait>(
    db: &C,
    order: OrderModel,
) -> AppResult<OrderDetail> {
    let items: Vec<OrderItem> = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let payments: Vec<Payment> = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .order_by_asc(PaymentCol::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let shipping: Option<Shipping> = Shippings::find()
        .filter(ShippingCol::OrderId.eq(order.id))
        .one(db)
        .await?
        .map(Into::into);

    Ok(OrderDetail {
        order: order.into(),
        items,
        payments,
        shipping,
    })
}

/// Conditional decrement: fails instead of letting stock go below zero.
async fn decrement_stock(
    txn: &DatabaseTransaction,
    product: &ProductModel,
    quantity: i32,
) -> AppResult<()> {
    let result = Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(quantity))
        .filter(ProdCol::Id.eq(product.id))
        .filter(ProdCol::Stock.gte(quantity))
        .exec(txn)
        .await?;

    if result.rows_affected != 1 {
        return Err(AppError::BadRequest(format!(
            "Insufficient stock for product {}",
            product.name
        )));
    }
    Ok(())
}

/// Put the quantities of an order back on the shelf.
pub(crate) async fn release_stock(txn: &DatabaseTransaction, order_id: Uuid) -> AppResult<()> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(txn)
        .await?;

    for item in items {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(txn)
            .await?;
    }
    info!(%order_id, "stock released");
    Ok(())
}

struct AppliedCoupon {
    id: Uuid,
    code: String,
    discount: i64,
}

/// Unknown or unusable codes give no discount; they never fail checkout.
async fn redeem_coupon(
    txn: &DatabaseTransaction,
    code: &str,
    subtotal: i64,
    now: DateTime<Utc>,
) -> AppResult<Option<AppliedCoupon>> {
    let code = code.to_ascii_uppercase();
    let Some(coupon) = Coupons::find()
        .filter(CouponCol::Code.eq(code.as_str()))
        .lock(LockType::Update)
        .one(txn)
        .await?
    else {
        info!(%code, "coupon not found, continuing without discount");
        return Ok(None);
    };

    if let Err(reason) = pricing::check_coupon(&coupon, subtotal, now) {
        info!(%code, ?reason, "coupon not applied");
        return Ok(None);
    }

    let discount = pricing::coupon_discount(&coupon, subtotal);
    if discount == 0 {
        return Ok(None);
    }

    let mut redeem = Coupons::update_many()
        .col_expr(CouponCol::UsedCount, Expr::col(CouponCol::UsedCount).add(1))
        .filter(CouponCol::Id.eq(coupon.id));
    if let Some(limit) = coupon.usage_limit {
        redeem = redeem.filter(CouponCol::UsedCount.lt(limit));
    }
    if redeem.exec(txn).await?.rows_affected != 1 {
        warn!(%code, "coupon usage limit reached during checkout");
        return Ok(None);
    }

    Ok(Some(AppliedCoupon {
        id: coupon.id,
        code: coupon.code,
        discount,
    }))
}

fn merge_lines(lines: Vec<(Uuid, i32)>) -> AppResult<BTreeMap<Uuid, i32>> {
    let mut merged: BTreeMap<Uuid, i32> = BTreeMap::new();
    for (product_id, quantity) in lines {
        if quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        let entry = merged.entry(product_id).or_insert(0);
        *entry = entry
            .checked_add(quantity)
            .ok_or_else(|| AppError::BadRequest("Cart has invalid quantity".into()))?;
    }
    if merged.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    Ok(merged)
}

fn validate_contact(payload: &CheckoutRequest) -> AppResult<()> {
    let email = payload.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }
    validate_address("shipping", &payload.shipping_address)?;
    if let Some(billing) = &payload.billing_address {
        validate_address("billing", billing)?;
    }
    Ok(())
}

fn validate_address(kind: &str, address: &Address) -> AppResult<()> {
    let required = [
        ("first_name", &address.first_name),
        ("address1", &address.address1),
        ("city", &address.city),
        ("state", &address.state),
        ("postal_code", &address.postal_code),
        ("country", &address.country),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(AppError::BadRequest(format!(
                "{kind} address {field} is required"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn order_number_shape() {
        let now = Utc::now();
        let number = generate_order_number(now, &mut StdRng::seed_from_u64(7));
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], now.timestamp_millis().to_string());
        assert_eq!(parts[2].len(), 5);
        assert!(
            parts[2]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn merge_rejects_bad_quantities() {
        let id = Uuid::new_v4();
        assert!(merge_lines(vec![]).is_err());
        assert!(merge_lines(vec![(id, 0)]).is_err());
        assert!(merge_lines(vec![(id, -2)]).is_err());
        let merged = merge_lines(vec![(id, 1), (id, 2)]).unwrap();
        assert_eq!(merged[&id], 3);
    }
}
