use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use storefront_core::{
    GatewayError, Identity, Payment, PaymentGateway, PaymentRedirect, PreferenceItem, Product,
    ProductRepository,
};

use crate::error::{OrderError, OrderResult};
use crate::lifecycle::PaymentTransition;
use crate::models::{
    CheckoutRequest, LineItem, Order, OrderFilter, OrderPatch, OrderStatus, OrderUpdate,
    ResolvedOrder, UpdateOutcome,
};
use crate::notification::{NotificationOutcome, PaymentNotification};
use crate::repository::OrderRepository;

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of the payment hand-off attempted during checkout.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentInitiation {
    /// The payment method settles outside the hosted gateway.
    NotRequired,
    Redirect(PaymentRedirect),
    /// The order is kept; payment can be retried against it.
    Failed(GatewayError),
}

#[derive(Debug, Clone)]
pub struct Checkout {
    pub order: Order,
    pub payment: PaymentInitiation,
}

/// Turns carts into paid orders: creation, preference hand-off, and
/// webhook-driven confirmation.
pub struct OrderReconciler {
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
    gateway: Arc<dyn PaymentGateway>,
    gateway_timeout: Duration,
}

impl OrderReconciler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        products: Arc<dyn ProductRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            orders,
            products,
            gateway,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    /// Persist a pending order priced from the catalog and, for gateway
    /// payments, request a checkout preference for it.
    ///
    /// A failed preference does not undo the order; the failure is reported
    /// in [`Checkout::payment`].
    pub async fn place_order(&self, identity: &Identity, request: CheckoutRequest) -> OrderResult<Checkout> {
        request.validate()?;

        let ids: Vec<Uuid> = request.items.iter().map(|line| line.product_id).collect();
        let products = self.load_products(&ids).await?;

        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let product = products
                .get(&line.product_id)
                .ok_or_else(|| OrderError::NotFound(format!("Product {}", line.product_id)))?;
            items.push(LineItem {
                product_id: product.id,
                quantity: line.checked_quantity()?,
                unit_price: product.price,
            });
        }

        let order = Order::new(
            identity.user_id.clone(),
            items,
            request.shipping_address,
            request.payment_method,
        );
        if order.total > Order::max_total() {
            return Err(OrderError::Validation(format!(
                "order total {} exceeds the maximum of {}",
                order.total,
                Order::max_total()
            )));
        }
        let order = self.orders.create(order).await?;
        info!(
            "Order {} created for user {} ({} items, total {}, via {})",
            order.id,
            order.user_id,
            order.items.len(),
            order.total,
            order.payment_method.as_str()
        );

        let payment = if order.payment_method.uses_external_gateway() {
            match self.initiate_payment(&order, &products).await {
                Ok(redirect) => {
                    info!("Preference {} created for order {}", redirect.preference_id, order.id);
                    PaymentInitiation::Redirect(redirect)
                }
                Err(e) => {
                    error!("Preference creation failed for order {}, order kept pending: {}", order.id, e);
                    PaymentInitiation::Failed(e)
                }
            }
        } else {
            PaymentInitiation::NotRequired
        };

        Ok(Checkout { order, payment })
    }

    /// (Re)create a checkout preference for an existing pending order.
    pub async fn create_preference(&self, identity: &Identity, order_id: Uuid) -> OrderResult<PaymentRedirect> {
        let order = self.authorized_order(identity, order_id).await?;

        if order.status != OrderStatus::Pending {
            return Err(OrderError::Validation(format!(
                "order {} is {} and cannot be paid",
                order.id, order.status
            )));
        }

        let products = self.load_products(&order.product_ids()).await?;
        let redirect = self.initiate_payment(&order, &products).await?;
        info!("Preference {} created for order {}", redirect.preference_id, order.id);
        Ok(redirect)
    }

    /// Process a provider notification.
    ///
    /// The notification is only a wake-up signal: the payment is re-fetched
    /// from the gateway and only that answer can move an order to paid.
    /// Returns `Err` only when the gateway or the store fails unexpectedly.
    pub async fn handle_notification(&self, notification: &PaymentNotification) -> OrderResult<NotificationOutcome> {
        let Some(payment_id) = notification.payment_id() else {
            let reason = format!("unhandled notification type {:?}", notification.kind);
            debug!("Ignoring webhook: {}", reason);
            return Ok(NotificationOutcome::Ignored { reason });
        };

        let payment = match self.bounded(self.gateway.get_payment(payment_id)).await {
            Ok(payment) => payment,
            Err(GatewayError::NotFound(_)) => {
                warn!("Webhook referenced unknown payment {}", payment_id);
                return Ok(NotificationOutcome::PaymentNotFound { payment_id: payment_id.to_string() });
            }
            Err(e) => return Err(e.into()),
        };

        if !payment.is_approved() {
            info!("Payment {} is {:?}, no order change", payment.id, payment.status);
            return Ok(NotificationOutcome::NotApproved {
                payment_id: payment.id,
                status: payment.status,
            });
        }

        let Some(order_id) = payment.order_reference() else {
            warn!(
                "Approved payment {} has no usable external reference ({:?})",
                payment.id, payment.external_reference
            );
            return Ok(NotificationOutcome::MissingReference { payment_id: payment.id });
        };

        let outcome = self
            .orders
            .find_by_id_and_update(order_id, &OrderUpdate::mark_paid(payment.id.clone()))
            .await?;

        Ok(match outcome {
            UpdateOutcome::Updated(order) => {
                info!("Order {} marked as paid by payment {}", order.id, payment.id);
                NotificationOutcome::MarkedPaid { order_id }
            }
            UpdateOutcome::NotFound => {
                warn!("Approved payment {} references unknown order {}", payment.id, order_id);
                NotificationOutcome::OrderNotFound { order_id }
            }
            UpdateOutcome::Unchanged(order) => match order.status.on_payment_approved() {
                PaymentTransition::AlreadyPaid => {
                    debug!("Order {} already paid, duplicate notification for {}", order_id, payment.id);
                    NotificationOutcome::AlreadyPaid { order_id }
                }
                PaymentTransition::Apply => {
                    // Still pending, yet the conditional write was refused.
                    error!(
                        "Order {} is pending but the paid transition for payment {} was not applied",
                        order_id, payment.id
                    );
                    return Err(OrderError::Conflict(order_id.to_string()));
                }
                PaymentTransition::Blocked(status) => {
                    warn!(
                        "Approved payment {} arrived for order {} in status {}, left unchanged",
                        payment.id, order_id, status
                    );
                    NotificationOutcome::NotPayable { order_id, status }
                }
            },
        })
    }

    /// Fetch one order for display. Owner or admin only.
    pub async fn get_order(&self, identity: &Identity, order_id: Uuid) -> OrderResult<ResolvedOrder> {
        let order = self.authorized_order(identity, order_id).await?;
        let products = self.load_products(&order.product_ids()).await?;
        Ok(ResolvedOrder::resolve(order, &products))
    }

    /// Every order in the store, newest first. Admin only.
    pub async fn list_orders(&self, identity: &Identity) -> OrderResult<Vec<ResolvedOrder>> {
        if !identity.is_admin() {
            return Err(OrderError::Forbidden("listing all orders requires admin".to_string()));
        }
        let orders = self.orders.find(&OrderFilter::default()).await?;
        self.resolve_all(orders).await
    }

    /// The requester's own orders, newest first.
    pub async fn list_my_orders(&self, identity: &Identity) -> OrderResult<Vec<ResolvedOrder>> {
        let orders = self.orders.find(&OrderFilter::owned_by(identity.user_id.clone())).await?;
        self.resolve_all(orders).await
    }

    /// Apply an administrative patch. Only whitelisted fields are mutable.
    pub async fn update_order(&self, identity: &Identity, order_id: Uuid, patch: OrderPatch) -> OrderResult<ResolvedOrder> {
        if !identity.is_admin() {
            return Err(OrderError::Forbidden("updating orders requires admin".to_string()));
        }
        let Some(target) = patch.status else {
            return Err(OrderError::Validation("no admin-mutable field supplied".to_string()));
        };

        let current = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("Order {}", order_id)))?;
        current.status.check_admin_transition(target)?;

        let updated = match self
            .orders
            .find_by_id_and_update(order_id, &OrderUpdate::set_status(current.status, target))
            .await?
        {
            UpdateOutcome::Updated(order) => order,
            UpdateOutcome::Unchanged(_) => return Err(OrderError::Conflict(order_id.to_string())),
            UpdateOutcome::NotFound => return Err(OrderError::NotFound(format!("Order {}", order_id))),
        };
        info!(
            "Order {} moved from {} to {} by admin {}",
            order_id, current.status, target, identity.user_id
        );

        let products = self.load_products(&updated.product_ids()).await?;
        Ok(ResolvedOrder::resolve(updated, &products))
    }

    /// Live payment detail. Visible to admins and to the owner of the order
    /// the payment references.
    pub async fn get_payment(&self, identity: &Identity, payment_id: &str) -> OrderResult<Payment> {
        let payment = match self.bounded(self.gateway.get_payment(payment_id)).await {
            Err(GatewayError::NotFound(id)) => return Err(OrderError::NotFound(format!("Payment {}", id))),
            other => other?,
        };

        if identity.is_admin() {
            return Ok(payment);
        }

        let owner = match payment.order_reference() {
            Some(order_id) => self.orders.find_by_id(order_id).await?.map(|o| o.user_id),
            None => None,
        };
        match owner {
            Some(owner) if identity.can_access(&owner) => Ok(payment),
            _ => Err(OrderError::Forbidden(format!("payment {} is not yours", payment_id))),
        }
    }

    async fn authorized_order(&self, identity: &Identity, order_id: Uuid) -> OrderResult<Order> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("Order {}", order_id)))?;

        if !identity.can_access(&order.user_id) {
            return Err(OrderError::Forbidden(format!("order {} belongs to another user", order_id)));
        }
        Ok(order)
    }

    async fn initiate_payment(
        &self,
        order: &Order,
        products: &HashMap<Uuid, Product>,
    ) -> Result<PaymentRedirect, GatewayError> {
        let items: Vec<PreferenceItem> = order
            .items
            .iter()
            .map(|item| match products.get(&item.product_id) {
                Some(product) => PreferenceItem::new(
                    product.name.clone(),
                    item.unit_price,
                    item.quantity,
                    product.primary_image(),
                    product.description.as_deref(),
                ),
                None => PreferenceItem::new(
                    format!("Product {}", item.product_id),
                    item.unit_price,
                    item.quantity,
                    None,
                    None,
                ),
            })
            .collect();

        self.bounded(self.gateway.create_preference(&items, order.id)).await
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T, GatewayError>>) -> Result<T, GatewayError> {
        tokio::time::timeout(self.gateway_timeout, call)
            .await
            .map_err(|_| GatewayError::Timeout(self.gateway_timeout))?
    }

    async fn load_products(&self, ids: &[Uuid]) -> OrderResult<HashMap<Uuid, Product>> {
        let products = self.products.find_many(ids).await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }

    async fn resolve_all(&self, orders: Vec<Order>) -> OrderResult<Vec<ResolvedOrder>> {
        let mut ids: Vec<Uuid> = orders.iter().flat_map(|o| o.product_ids()).collect();
        ids.sort();
        ids.dedup();
        let products = self.load_products(&ids).await?;
        Ok(orders
            .into_iter()
            .map(|order| ResolvedOrder::resolve(order, &products))
            .collect())
    }
}
