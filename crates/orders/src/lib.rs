//! Orders domain module.
//!
//! This crate contains business rules for pharmacy orders and the payments
//! recorded with them, implemented purely as deterministic domain logic (no IO,
//! no HTTP, no storage).

pub mod order;
pub mod payment;

pub use order::{
    NewOrder, NewOrderItem, Order, OrderDetails, OrderDraft, OrderFilter, OrderId, OrderItem,
    OrderPatch, OrderStatus, StatusUpdate,
};
pub use payment::{Payment, PaymentFilter, PaymentStatus};
