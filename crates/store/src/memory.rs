use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{ListPage, OrderId, SortOrder, TenantId};
use domain::{Order, OrderQuery, OrderRepository, OrderStatus, RepositoryError};
use tokio::sync::RwLock;

use crate::StoreError;

/// In-memory order repository for testing.
///
/// Provides the same tenant scoping and conditional status updates as the
/// PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    writes: Arc<AtomicUsize>,
    fail_on_transition: Arc<AtomicBool>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns the number of successful writes (saves and transitions).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes subsequent confirm/cancel calls fail as a storage error.
    pub fn set_fail_on_transition(&self, fail: bool) {
        self.fail_on_transition.store(fail, Ordering::SeqCst);
    }

    async fn transition(
        &self,
        order_id: OrderId,
        tenant_id: &TenantId,
        action: &'static str,
        apply: fn(&mut Order) -> Result<(), domain::OrderError>,
    ) -> Result<(), RepositoryError> {
        if self.fail_on_transition.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{action} rejected")).into());
        }

        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .filter(|o| o.tenant_id() == tenant_id)
            .ok_or(RepositoryError::NotFound(order_id))?;

        apply(order).map_err(|_| RepositoryError::StatusConflict {
            order_id,
            expected: OrderStatus::Created,
            action,
        })?;

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        order.check_invariants()?;

        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_id()) {
            return Err(RepositoryError::Duplicate(order.order_id()));
        }
        orders.insert(order.order_id(), order.clone());

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_by_id(
        &self,
        order_id: OrderId,
        tenant_id: &TenantId,
    ) -> Result<Order, RepositoryError> {
        self.orders
            .read()
            .await
            .get(&order_id)
            .filter(|o| o.tenant_id() == tenant_id)
            .cloned()
            .ok_or(RepositoryError::NotFound(order_id))
    }

    async fn confirm(
        &self,
        order_id: OrderId,
        tenant_id: &TenantId,
    ) -> Result<(), RepositoryError> {
        self.transition(order_id, tenant_id, "confirm", Order::confirm)
            .await
    }

    async fn cancel(&self, order_id: OrderId, tenant_id: &TenantId) -> Result<(), RepositoryError> {
        self.transition(order_id, tenant_id, "cancel", Order::cancel)
            .await
    }

    async fn list(
        &self,
        tenant_id: &TenantId,
        query: &OrderQuery,
    ) -> Result<ListPage<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut matching: Vec<_> = orders
            .values()
            .filter(|o| o.tenant_id() == tenant_id && query.matches(o))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then(a.order_id().as_uuid().cmp(&b.order_id().as_uuid()))
        });
        if query.sort == SortOrder::Desc {
            matching.reverse();
        }

        let total = matching.len();
        let page = query.pagination;
        let items = matching
            .into_iter()
            .skip(page.offset())
            .take(page.limit())
            .collect();

        Ok(ListPage::new(items, total, page))
    }
}
