pub mod error;
pub mod lifecycle;
pub mod models;
pub mod notification;
pub mod reconciler;
pub mod repository;

pub use error::{OrderError, OrderResult};
pub use lifecycle::PaymentTransition;
pub use models::{
    CheckoutLine, CheckoutRequest, LineItem, Order, OrderFilter, OrderPatch, OrderStatus, OrderUpdate,
    PaymentMethod, ResolvedLineItem, ResolvedOrder, ShippingAddress, UpdateOutcome,
};
pub use notification::{NotificationOutcome, PaymentNotification};
pub use reconciler::{Checkout, OrderReconciler, PaymentInitiation};
pub use repository::{InMemoryOrderRepository, OrderRepository};
