pub mod audit_logs;
pub mod cart_items;
pub mod coupons;
pub mod order_items;
pub mod orders;
pub mod payments;
pub mod products;
pub mod shippings;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use coupons::Entity as Coupons;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use products::Entity as Products;
pub use shippings::Entity as Shippings;
