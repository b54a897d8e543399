use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use storefront_core::{CoreError, CoreResult};
use storefront_order::{
    LineItem, Order, OrderFilter, OrderRepository, OrderUpdate, ShippingAddress, UpdateOutcome,
};

use crate::storage_error;

const ORDER_COLUMNS: &str =
    "id, user_id, status, total, payment_method, payment_id, items, shipping_address, created_at, updated_at";

pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn select_by_id(&self, id: Uuid) -> CoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(Order::try_from).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: String,
    status: String,
    total: Decimal,
    payment_method: String,
    payment_id: Option<String>,
    items: Json<Vec<LineItem>>,
    shipping_address: Json<ShippingAddress>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = CoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            items: row.items.0,
            total: row.total,
            status: row.status.parse()?,
            shipping_address: row.shipping_address.0,
            payment_method: row.payment_method.parse()?,
            payment_id: row.payment_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn create(&self, order: Order) -> CoreResult<Order> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, total, payment_method, payment_id, items, shipping_address, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id)
        .bind(&order.user_id)
        .bind(order.status.as_str())
        .bind(order.total)
        .bind(order.payment_method.as_str())
        .bind(&order.payment_id)
        .bind(Json(&order.items))
        .bind(Json(&order.shipping_address))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(order)
    }

    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<Order>> {
        self.select_by_id(id).await
    }

    async fn find_by_id_and_update(&self, id: Uuid, update: &OrderUpdate) -> CoreResult<UpdateOutcome> {
        // Precondition and write in one statement; Postgres row locking makes it atomic.
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"
            UPDATE orders
            SET status = COALESCE($2, status),
                payment_id = COALESCE($3, payment_id),
                updated_at = NOW()
            WHERE id = $1 AND ($4::TEXT IS NULL OR status = $4)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(update.status.map(|s| s.as_str()))
        .bind(&update.payment_id)
        .bind(update.expected_status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        if let Some(row) = row {
            return Ok(UpdateOutcome::Updated(Order::try_from(row)?));
        }

        Ok(match self.select_by_id(id).await? {
            Some(current) => UpdateOutcome::Unchanged(current),
            None => UpdateOutcome::NotFound,
        })
    }

    async fn find(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM orders
            WHERE ($1::TEXT IS NULL OR user_id = $1)
              AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
            ORDER_COLUMNS
        ))
        .bind(filter.user_id.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.into_iter().map(Order::try_from).collect()
    }
}
