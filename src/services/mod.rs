pub mod admin_service;
pub mod cart_service;
pub mod courier_status;
pub mod order_service;
pub mod payment_service;
pub mod pricing;
pub mod shipment_service;
