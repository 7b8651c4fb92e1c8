//! Order-side domain types: delivery addresses, shipping methods and
//! the order document with its status state machine.

mod address;
mod order;
mod shipping;

pub use address::Address;
pub use order::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus};
pub use shipping::ShippingMethod;
