use crate::error::OrderError;
use crate::models::OrderStatus;

/// What an approved payment does to an order in a given status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTransition {
    /// pending -> paid
    Apply,
    /// Re-delivery of a confirmation that already landed.
    AlreadyPaid,
    /// The order left the payable path (e.g. an admin cancelled it).
    Blocked(OrderStatus),
}

impl OrderStatus {
    /// Transition taken when the gateway confirms a payment as approved.
    pub fn on_payment_approved(self) -> PaymentTransition {
        match self {
            OrderStatus::Pending => PaymentTransition::Apply,
            OrderStatus::Paid => PaymentTransition::AlreadyPaid,
            other => PaymentTransition::Blocked(other),
        }
    }

    /// Administrative moves. `paid` is reachable only through a confirmed
    /// payment and `pending` only at creation.
    pub fn check_admin_transition(self, to: OrderStatus) -> Result<(), OrderError> {
        match to {
            OrderStatus::Pending | OrderStatus::Paid if self != to => Err(OrderError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
