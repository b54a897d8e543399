use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use storefront_core::CoreResult;

use crate::models::{Order, OrderFilter, OrderUpdate, UpdateOutcome};

/// Persistence contract for orders.
///
/// `find_by_id_and_update` must be atomic per order: the precondition check
/// and the write happen as one step, so concurrent status changes never lose
/// an update.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: Order) -> CoreResult<Order>;

    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<Order>>;

    async fn find_by_id_and_update(&self, id: Uuid, update: &OrderUpdate) -> CoreResult<UpdateOutcome>;

    /// Matching orders, newest first.
    async fn find(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>>;
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: Order) -> CoreResult<Order> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_by_id_and_update(&self, id: Uuid, update: &OrderUpdate) -> CoreResult<UpdateOutcome> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.get_mut(&id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        if !update.precondition_holds(order.status) {
            return Ok(UpdateOutcome::Unchanged(order.clone()));
        }

        update.apply(order);
        Ok(UpdateOutcome::Updated(order.clone()))
    }

    async fn find(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>> {
        let mut found: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}
