use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ItemId, ListPage, OrderId, TenantId};
use domain::{
    Order, OrderItem, OrderQuery, OrderRepository, OrderStatus, RepositoryError, Sku,
};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use uuid::Uuid;

use crate::StoreError;

fn db(err: sqlx::Error) -> RepositoryError {
    StoreError::Database(err).into()
}

fn corrupt(msg: impl std::fmt::Display) -> RepositoryError {
    StoreError::CorruptRow(msg.to_string()).into()
}

/// PostgreSQL-backed order repository.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Creates a new PostgreSQL order repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem, RepositoryError> {
        let quantity: i64 = row.try_get("quantity").map_err(db)?;
        let sku: String = row.try_get("sku").map_err(db)?;

        Ok(OrderItem {
            item_id: ItemId::from_uuid(row.try_get::<Uuid, _>("item_id").map_err(db)?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id").map_err(db)?),
            sku: Sku::new(sku).map_err(corrupt)?,
            quantity: u32::try_from(quantity)
                .map_err(|_| corrupt(format!("quantity {quantity} out of range")))?,
        })
    }

    fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let status: String = row.try_get("status").map_err(db)?;
        let tenant: String = row.try_get("tenant_id").map_err(db)?;

        Ok(Order::restore(
            OrderId::from_uuid(row.try_get::<Uuid, _>("order_id").map_err(db)?),
            TenantId::new(tenant).map_err(corrupt)?,
            status.parse::<OrderStatus>().map_err(corrupt)?,
            row.try_get::<DateTime<Utc>, _>("created_at").map_err(db)?,
            items,
        ))
    }

    /// Loads items for several orders, grouped by order and kept in stored
    /// position.
    async fn items_for(
        &self,
        order_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<OrderItem>>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT item_id, order_id, sku, quantity
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let item = Self::row_to_item(row)?;
            grouped
                .entry(item.order_id.as_uuid())
                .or_default()
                .push(item);
        }
        Ok(grouped)
    }

    /// Conditionally moves a `Created` order to `target`.
    async fn transition(
        &self,
        order_id: OrderId,
        tenant_id: &TenantId,
        target: OrderStatus,
        action: &'static str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, updated_at = NOW()
            WHERE order_id = $2 AND tenant_id = $3 AND status = $4
            "#,
        )
        .bind(target.as_str())
        .bind(order_id.as_uuid())
        .bind(tenant_id.as_str())
        .bind(OrderStatus::Created.as_str())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if result.rows_affected() > 0 {
            tracing::debug!(%order_id, status = %target, "order status updated");
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM orders WHERE order_id = $1 AND tenant_id = $2)",
        )
        .bind(order_id.as_uuid())
        .bind(tenant_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        if exists {
            Err(RepositoryError::StatusConflict {
                order_id,
                expected: OrderStatus::Created,
                action,
            })
        } else {
            Err(RepositoryError::NotFound(order_id))
        }
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        order.check_invariants()?;

        let mut tx = self.pool.begin().await.map_err(db)?;

        sqlx::query(
            r#"
            INSERT INTO orders (order_id, tenant_id, status, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.order_id().as_uuid())
        .bind(order.tenant_id().as_str())
        .bind(order.status().as_str())
        .bind(order.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_pkey")
            {
                return RepositoryError::Duplicate(order.order_id());
            }
            db(e)
        })?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (item_id, order_id, tenant_id, position, sku, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.item_id.as_uuid())
            .bind(order.order_id().as_uuid())
            .bind(order.tenant_id().as_str())
            .bind(position as i32)
            .bind(item.sku.as_str())
            .bind(i64::from(item.quantity))
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn find_by_id(
        &self,
        order_id: OrderId,
        tenant_id: &TenantId,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT order_id, tenant_id, status, created_at
            FROM orders
            WHERE order_id = $1 AND tenant_id = $2
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(tenant_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .ok_or(RepositoryError::NotFound(order_id))?;

        let mut items = self.items_for(&[order_id.as_uuid()]).await?;
        let items = items.remove(&order_id.as_uuid()).unwrap_or_default();

        Self::row_to_order(&row, items)
    }

    async fn confirm(
        &self,
        order_id: OrderId,
        tenant_id: &TenantId,
    ) -> Result<(), RepositoryError> {
        self.transition(order_id, tenant_id, OrderStatus::Confirmed, "confirm")
            .await
    }

    async fn cancel(&self, order_id: OrderId, tenant_id: &TenantId) -> Result<(), RepositoryError> {
        self.transition(order_id, tenant_id, OrderStatus::Cancelled, "cancel")
            .await
    }

    async fn list(
        &self,
        tenant_id: &TenantId,
        query: &OrderQuery,
    ) -> Result<ListPage<Order>, RepositoryError> {
        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM orders WHERE tenant_id = ");
        count.push_bind(tenant_id.as_str());
        if let Some(status) = query.status {
            count.push(" AND status = ").push_bind(status.as_str());
        }
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;

        let page = query.pagination;
        let mut select: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT order_id, tenant_id, status, created_at FROM orders WHERE tenant_id = ",
        );
        select.push_bind(tenant_id.as_str());
        if let Some(status) = query.status {
            select.push(" AND status = ").push_bind(status.as_str());
        }
        select
            .push(format!(
                " ORDER BY created_at {dir}, order_id {dir}",
                dir = query.sort.as_sql()
            ))
            .push(" LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows = select.build().fetch_all(&self.pool).await.map_err(db)?;

        let ids: Vec<Uuid> = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("order_id"))
            .collect::<Result<_, _>>()
            .map_err(db)?;
        let mut items = self.items_for(&ids).await?;

        let orders = rows
            .iter()
            .zip(&ids)
            .map(|(row, id)| Self::row_to_order(row, items.remove(id).unwrap_or_default()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ListPage::new(orders, total as usize, page))
    }
}
