use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Payment status as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Authorized,
    InProcess,
    InMediation,
    Rejected,
    Cancelled,
    Refunded,
    ChargedBack,
    #[serde(other)]
    Unknown,
}

/// One purchasable line in a checkout preference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreferenceItem {
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub quantity: u32,
    pub picture_url: String,
    pub description: String,
}

impl PreferenceItem {
    pub const MAX_DESCRIPTION_CHARS: usize = 255;

    pub fn new(
        title: impl Into<String>,
        unit_price: Decimal,
        quantity: u32,
        picture_url: Option<&str>,
        description: Option<&str>,
    ) -> Self {
        Self {
            title: title.into(),
            unit_price,
            quantity,
            picture_url: picture_url.unwrap_or_default().to_string(),
            description: description
                .unwrap_or_default()
                .chars()
                .take(Self::MAX_DESCRIPTION_CHARS)
                .collect(),
        }
    }
}

/// Where to send the buyer to complete a checkout preference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentRedirect {
    #[serde(rename = "id")]
    pub preference_id: String,
    pub init_point: String,
    pub sandbox_init_point: String,
}

/// Live payment detail fetched from the provider.
///
/// Unmodelled provider fields are kept in `extra` so the raw detail can be
/// handed back to API callers untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    #[serde(deserialize_with = "deserialize_payment_id")]
    pub id: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub status_detail: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Payment {
    pub fn new(id: impl Into<String>, status: PaymentStatus, external_reference: Option<String>) -> Self {
        Self {
            id: id.into(),
            status,
            status_detail: None,
            external_reference,
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == PaymentStatus::Approved
    }

    /// The order this payment was created for, if the reference is an order id.
    pub fn order_reference(&self) -> Option<Uuid> {
        self.external_reference
            .as_deref()
            .and_then(|r| Uuid::parse_str(r.trim()).ok())
    }
}

/// Provider ids arrive as JSON strings or numbers depending on the endpoint.
pub fn deserialize_payment_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// Every gateway failure, whatever the provider said, collapses into this.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("payment provider unreachable: {0}")]
    Transport(String),
    #[error("payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("payment {0} not found at provider")]
    NotFound(String),
    #[error("payment provider returned an unexpected response: {0}")]
    InvalidResponse(String),
    #[error("payment provider did not answer within {0:?}")]
    Timeout(Duration),
}

/// The only legitimate source of payment status.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a checkout preference whose external reference is `order_id`.
    async fn create_preference(
        &self,
        items: &[PreferenceItem],
        order_id: Uuid,
    ) -> Result<PaymentRedirect, GatewayError>;

    /// Fetch the current state of a payment.
    async fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError>;
}

/// Scriptable gateway for tests and local development.
#[derive(Default)]
pub struct MockPaymentGateway {
    payments: RwLock<HashMap<String, Payment>>,
    preferences: RwLock<Vec<(Uuid, Vec<PreferenceItem>)>>,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose every call fails with a transport error.
    pub fn failing() -> Self {
        let gateway = Self::default();
        gateway.failing.store(true, Ordering::SeqCst);
        gateway
    }

    /// Sleep before answering, to exercise caller-side timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn insert_payment(&self, payment: Payment) {
        self.payments.write().await.insert(payment.id.clone(), payment);
    }

    /// Preferences created so far, in call order.
    pub async fn preferences(&self) -> Vec<(Uuid, Vec<PreferenceItem>)> {
        self.preferences.read().await.clone()
    }

    async fn simulate(&self) -> Result<(), GatewayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("simulated provider outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_preference(
        &self,
        items: &[PreferenceItem],
        order_id: Uuid,
    ) -> Result<PaymentRedirect, GatewayError> {
        self.simulate().await?;
        self.preferences.write().await.push((order_id, items.to_vec()));

        let preference_id = format!("mock-pref-{}", order_id.simple());
        Ok(PaymentRedirect {
            init_point: format!("https://checkout.example.test/pay?pref_id={}", preference_id),
            sandbox_init_point: format!("https://sandbox.checkout.example.test/pay?pref_id={}", preference_id),
            preference_id,
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError> {
        self.simulate().await?;
        self.payments
            .read()
            .await
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(payment_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_parses_numeric_id_and_keeps_raw_fields() {
        let raw = serde_json::json!({
            "id": 1234567890u64,
            "status": "approved",
            "status_detail": "accredited",
            "external_reference": "0b5e1c1e-6f0a-4c39-9d43-6c7d1d1f1a11",
            "transaction_amount": 25.0
        });

        let payment: Payment = serde_json::from_value(raw).unwrap();
        assert_eq!(payment.id, "1234567890");
        assert!(payment.is_approved());
        assert!(payment.order_reference().is_some());
        assert_eq!(payment.extra["transaction_amount"], serde_json::json!(25.0));
    }

    #[test]
    fn test_unknown_status_does_not_fail_parsing() {
        let payment: Payment =
            serde_json::from_value(serde_json::json!({"id": "9", "status": "something_new"})).unwrap();
        assert_eq!(payment.status, PaymentStatus::Unknown);
        assert_eq!(payment.order_reference(), None);
    }

    #[test]
    fn test_preference_item_truncates_description() {
        let long = "x".repeat(400);
        let item = PreferenceItem::new("Tee", Decimal::new(1000, 2), 2, None, Some(&long));
        assert_eq!(item.description.chars().count(), PreferenceItem::MAX_DESCRIPTION_CHARS);
        assert_eq!(item.picture_url, "");
    }

    #[tokio::test]
    async fn test_mock_gateway_failure_mode() {
        let gateway = MockPaymentGateway::failing();
        let err = gateway.create_preference(&[], Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));

        gateway.set_failing(false);
        let redirect = gateway.create_preference(&[], Uuid::new_v4()).await.unwrap();
        assert!(redirect.init_point.contains(&redirect.preference_id));
    }
}
