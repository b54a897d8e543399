use serde::Deserialize;
use uuid::Uuid;

use storefront_core::payment::{deserialize_payment_id, PaymentStatus};

/// Asynchronous, at-least-once notice from the payment provider.
///
/// Only `type` and `data.id` are read. Any status in the body is ignored;
/// the payment is always re-fetched.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PaymentNotification {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Option<NotificationData>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NotificationData {
    #[serde(deserialize_with = "deserialize_payment_id")]
    pub id: String,
}

impl PaymentNotification {
    pub const PAYMENT: &'static str = "payment";

    pub fn payment(payment_id: impl Into<String>) -> Self {
        Self {
            kind: Some(Self::PAYMENT.to_string()),
            data: Some(NotificationData { id: payment_id.into() }),
        }
    }

    /// Parse a raw webhook body. Anything unparseable yields `None`.
    pub fn from_slice(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// The payment id, if this is a payment notification that carries one.
    pub fn payment_id(&self) -> Option<&str> {
        if self.kind.as_deref() != Some(Self::PAYMENT) {
            return None;
        }
        self.data
            .as_ref()
            .map(|d| d.id.trim())
            .filter(|id| !id.is_empty())
    }
}

/// Result of processing one notification. Every variant is acknowledged to
/// the provider; only errors from the gateway or the store are not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Ignored { reason: String },
    PaymentNotFound { payment_id: String },
    NotApproved { payment_id: String, status: PaymentStatus },
    MissingReference { payment_id: String },
    OrderNotFound { order_id: Uuid },
    MarkedPaid { order_id: Uuid },
    AlreadyPaid { order_id: Uuid },
    NotPayable { order_id: Uuid, status: crate::models::OrderStatus },
}
