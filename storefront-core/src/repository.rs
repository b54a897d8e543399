use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::catalog::Product;
use crate::CoreResult;

/// Read access to the product catalog.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<Product>>;

    /// Fetch every product in `ids` that exists. Missing ids are simply absent
    /// from the result.
    async fn find_many(&self, ids: &[Uuid]) -> CoreResult<Vec<Product>>;
}

/// Catalog held in process memory. Used by tests and the `mock` profile.
#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<Uuid, Product>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: RwLock::new(products.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    pub async fn insert(&self, product: Product) {
        self.products.write().await.insert(product.id, product);
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> CoreResult<Vec<Product>> {
        let products = self.products.read().await;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }
}
