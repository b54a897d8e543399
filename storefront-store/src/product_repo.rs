use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use storefront_core::{CoreResult, Product, ProductRepository};

use crate::storage_error;

/// Read side of the catalog table. Product CRUD lives with the catalog service.
pub struct StoreProductRepository {
    pool: PgPool,
}

impl StoreProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: Decimal,
    images: Vec<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            images: row.images,
        }
    }
}

#[async_trait]
impl ProductRepository for StoreProductRepository {
    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as("SELECT id, name, description, price, images FROM products WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;

        Ok(row.map(Product::from))
    }

    async fn find_many(&self, ids: &[Uuid]) -> CoreResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<ProductRow> =
            sqlx::query_as("SELECT id, name, description, price, images FROM products WHERE id = ANY($1)")
                .bind(ids.to_vec())
                .fetch_all(&self.pool)
                .await
                .map_err(storage_error)?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}
