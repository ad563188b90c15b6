use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{InventoryAdjustRequest, ProductList, UpdateOrderStatusRequest},
        cart::{AddToCartRequest, CartLine, CartList},
        orders::{CheckoutItem, CheckoutRequest, OrderDetail, OrderList, OrderWithItems},
        payments::{
            CreatePaymentIntentRequest, PaymentIntent, PaymentVerification, RefundRequest,
            VerifyPaymentRequest,
        },
        shipments::{OrderStatusChange, TrackingUpdate, TrackingUpdateResult},
    },
    entity::{
        orders::{Address, OrderStatus},
        payments::{PaymentMethod, PaymentStatus},
        shippings::ShippingStatus,
    },
    models::{CartItem, Order, OrderItem, Payment, Product, Shipping},
    response::{ApiResponse, ErrorData, Meta},
    routes::{admin, cart, health, orders, params, payments, shipments, webhooks},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::track_order,
        payments::create_intent,
        payments::verify_payment,
        payments::refund_payment,
        shipments::create_shipment,
        shipments::refresh_tracking,
        webhooks::tracking_webhook,
        admin::list_all_orders,
        admin::update_order_status,
        admin::list_low_stock,
        admin::adjust_inventory
    ),
    components(
        schemas(
            Address,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            ShippingStatus,
            Product,
            CartItem,
            Order,
            OrderItem,
            Payment,
            Shipping,
            AddToCartRequest,
            CartLine,
            CartList,
            CheckoutItem,
            CheckoutRequest,
            OrderWithItems,
            OrderDetail,
            OrderList,
            CreatePaymentIntentRequest,
            PaymentIntent,
            VerifyPaymentRequest,
            PaymentVerification,
            RefundRequest,
            TrackingUpdate,
            TrackingUpdateResult,
            OrderStatusChange,
            UpdateOrderStatusRequest,
            InventoryAdjustRequest,
            ProductList,
            params::Pagination,
            params::SortOrder,
            Meta,
            ErrorData,
            health::HealthData,
            ApiResponse<ErrorData>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderDetail>,
            ApiResponse<OrderList>,
            ApiResponse<PaymentIntent>,
            ApiResponse<PaymentVerification>,
            ApiResponse<Shipping>,
            ApiResponse<TrackingUpdateResult>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Server-side cart of signed-in customers"),
        (name = "Orders", description = "Checkout and order lookup"),
        (name = "Payments", description = "Hosted checkout intents, verification and refunds"),
        (name = "Shipments", description = "Courier manifests and tracking"),
        (name = "Webhooks", description = "Inbound courier callbacks"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
