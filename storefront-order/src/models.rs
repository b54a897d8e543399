use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use storefront_core::{CoreError, Product, ProductSummary};

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(CoreError::ValidationError(format!("unknown order status '{}'", other))),
        }
    }
}

/// Payment channel chosen at checkout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[serde(rename = "mercadopago", alias = "gateway")]
    MercadoPago,
    Paypal,
    Stripe,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MercadoPago => "mercadopago",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Stripe => "stripe",
        }
    }

    /// Whether checkout must hand the buyer off to the hosted payment gateway.
    pub fn uses_external_gateway(&self) -> bool {
        matches!(self, PaymentMethod::MercadoPago)
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mercadopago" | "gateway" => Ok(PaymentMethod::MercadoPago),
            "paypal" => Ok(PaymentMethod::Paypal),
            "stripe" => Ok(PaymentMethod::Stripe),
            other => Err(CoreError::ValidationError(format!("unknown payment method '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

impl ShippingAddress {
    pub fn validate(&self) -> Result<(), CoreError> {
        let fields = [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("zipCode", &self.zip_code),
            ("country", &self.country),
        ];

        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::ValidationError(format!(
                "shipping address is missing: {}",
                missing.join(", ")
            )))
        }
    }
}

/// A purchased product with the price it had when the order was placed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: Uuid,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

impl LineItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The persisted purchase record. Never deleted; retained as an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub items: Vec<LineItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    /// Gateway payment that confirmed this order, once paid.
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        user_id: String,
        items: Vec<LineItem>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            total: Self::compute_total(&items),
            items,
            status: OrderStatus::Pending,
            shipping_address,
            payment_method,
            payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Largest total the store can hold (`NUMERIC(12, 2)`).
    pub fn max_total() -> Decimal {
        Decimal::new(999_999_999_999, 2)
    }

    pub fn compute_total(items: &[LineItem]) -> Decimal {
        items.iter().map(LineItem::subtotal).sum()
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        self.items.iter().map(|item| item.product_id).collect()
    }
}

/// One line of a checkout submission. Prices are never taken from the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine {
    pub product_id: Uuid,
    pub quantity: i64,
}

impl CheckoutLine {
    pub const MAX_QUANTITY: u32 = 10_000;

    pub fn checked_quantity(&self) -> Result<u32, CoreError> {
        u32::try_from(self.quantity)
            .ok()
            .filter(|q| (1..=Self::MAX_QUANTITY).contains(q))
            .ok_or_else(|| {
                CoreError::ValidationError(format!(
                    "invalid quantity {} for product {}",
                    self.quantity, self.product_id
                ))
            })
    }
}

/// What the buyer submits at checkout. Any client-side `total` is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default, alias = "products")]
    pub items: Vec<CheckoutLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

impl CheckoutRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.items.is_empty() {
            return Err(CoreError::ValidationError("order has no line items".to_string()));
        }
        for line in &self.items {
            line.checked_quantity()?;
        }
        self.shipping_address.validate()
    }
}

/// Admin-mutable fields of an order. Anything else in the request body is dropped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
}

/// Store-level change applied atomically to a single order document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub payment_id: Option<String>,
    /// Apply only if the stored status still equals this value.
    pub expected_status: Option<OrderStatus>,
}

impl OrderUpdate {
    /// pending -> paid, recording the confirming payment.
    pub fn mark_paid(payment_id: impl Into<String>) -> Self {
        Self {
            status: Some(OrderStatus::Paid),
            payment_id: Some(payment_id.into()),
            expected_status: Some(OrderStatus::Pending),
        }
    }

    pub fn set_status(from: OrderStatus, to: OrderStatus) -> Self {
        Self {
            status: Some(to),
            payment_id: None,
            expected_status: Some(from),
        }
    }

    pub fn precondition_holds(&self, current: OrderStatus) -> bool {
        self.expected_status.map_or(true, |expected| expected == current)
    }

    /// Apply to an in-memory document, refreshing `updated_at`.
    pub fn apply(&self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(payment_id) = &self.payment_id {
            order.payment_id = Some(payment_id.clone());
        }
        order.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Order),
    /// The precondition did not hold; the current document is returned untouched.
    Unchanged(Order),
    NotFound,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<String>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn owned_by(user_id: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()), status: None }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.user_id.as_deref().map_or(true, |u| u == order.user_id)
            && self.status.map_or(true, |s| s == order.status)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLineItem {
    pub product_id: Uuid,
    /// `None` when the product has since been removed from the catalog.
    pub product: Option<ProductSummary>,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

/// An order with its product references expanded for display.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOrder {
    pub id: Uuid,
    pub user_id: String,
    pub items: Vec<ResolvedLineItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResolvedOrder {
    pub fn resolve(order: Order, products: &HashMap<Uuid, Product>) -> Self {
        let items = order
            .items
            .iter()
            .map(|item| ResolvedLineItem {
                product_id: item.product_id,
                product: products.get(&item.product_id).map(Product::summary),
                quantity: item.quantity,
                unit_price: item.unit_price,
                subtotal: item.subtotal(),
            })
            .collect();

        Self {
            id: order.id,
            user_id: order.user_id,
            items,
            total: order.total,
            status: order.status,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            payment_id: order.payment_id,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}
