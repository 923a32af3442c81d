//! Persistence contract for the order aggregate.

use std::sync::Arc;

use async_trait::async_trait;
use common::{ListPage, OrderId, Pagination, SortOrder, TenantId};

use crate::error::RepositoryError;
use crate::order::{Order, OrderStatus};

/// Filters and paging for listing a tenant's orders.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Only return orders in this status.
    pub status: Option<OrderStatus>,

    /// Ordering by creation time.
    pub sort: SortOrder,

    /// Page to return.
    pub pagination: Pagination,
}

impl OrderQuery {
    /// Creates a query returning the first page, newest first.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the sort direction on `created_at`.
    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Sets the page.
    pub fn page(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Returns true if `order` passes the filters.
    pub fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|status| order.status() == status)
    }
}

/// Atomic persistence operations for orders.
///
/// Every operation is scoped by tenant. A tenant mismatch is reported as
/// [`RepositoryError::NotFound`].
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists the order and all of its items as one unit.
    ///
    /// Fails without writing anything if any item is invalid.
    async fn save(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Loads an order with its items in stored order.
    async fn find_by_id(
        &self,
        order_id: OrderId,
        tenant_id: &TenantId,
    ) -> Result<Order, RepositoryError>;

    /// Atomically moves a `Created` order to `Confirmed`.
    async fn confirm(&self, order_id: OrderId, tenant_id: &TenantId)
    -> Result<(), RepositoryError>;

    /// Atomically moves a `Created` order to `Cancelled`.
    async fn cancel(&self, order_id: OrderId, tenant_id: &TenantId) -> Result<(), RepositoryError>;

    /// Lists a tenant's orders.
    async fn list(
        &self,
        tenant_id: &TenantId,
        query: &OrderQuery,
    ) -> Result<ListPage<Order>, RepositoryError>;
}

#[async_trait]
impl<T: OrderRepository + ?Sized> OrderRepository for Arc<T> {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        (**self).save(order).await
    }

    async fn find_by_id(
        &self,
        order_id: OrderId,
        tenant_id: &TenantId,
    ) -> Result<Order, RepositoryError> {
        (**self).find_by_id(order_id, tenant_id).await
    }

    async fn confirm(
        &self,
        order_id: OrderId,
        tenant_id: &TenantId,
    ) -> Result<(), RepositoryError> {
        (**self).confirm(order_id, tenant_id).await
    }

    async fn cancel(&self, order_id: OrderId, tenant_id: &TenantId) -> Result<(), RepositoryError> {
        (**self).cancel(order_id, tenant_id).await
    }

    async fn list(
        &self,
        tenant_id: &TenantId,
        query: &OrderQuery,
    ) -> Result<ListPage<Order>, RepositoryError> {
        (**self).list(tenant_id, query).await
    }
}
