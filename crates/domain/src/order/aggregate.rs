//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, TenantId};
use serde::Serialize;

use super::{NewOrderItem, OrderError, OrderItem, OrderStatus};

/// Order aggregate root.
///
/// An order always holds at least one item, its items are fixed at
/// creation, and its status only moves from `Created` to one of the two
/// terminal statuses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    order_id: OrderId,
    tenant_id: TenantId,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    items: Vec<OrderItem>,
}

impl Order {
    /// Builds a new order in `Created` status.
    ///
    /// Lines are validated in order and the first invalid one is returned
    /// as the error.
    pub fn create(tenant_id: TenantId, lines: &[NewOrderItem]) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::NoItems);
        }

        let order_id = OrderId::new();
        let items = lines
            .iter()
            .map(|line| OrderItem::new(order_id, line))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            order_id,
            tenant_id,
            status: OrderStatus::Created,
            created_at: Utc::now(),
            items,
        })
    }

    /// Rebuilds an order from persisted rows.
    ///
    /// No validation is performed; use [`Order::check_invariants`] before
    /// writing a restored order back.
    pub fn restore(
        order_id: OrderId,
        tenant_id: TenantId,
        status: OrderStatus,
        created_at: DateTime<Utc>,
        items: Vec<OrderItem>,
    ) -> Self {
        Self {
            order_id,
            tenant_id,
            status,
            created_at,
            items,
        }
    }

    /// Verifies the aggregate invariants before persistence.
    pub fn check_invariants(&self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &self.items {
            if item.sku.as_str().trim().is_empty() {
                return Err(OrderError::SkuRequired);
            }
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    sku: item.sku.to_string(),
                    quantity: 0,
                });
            }
        }
        Ok(())
    }
}

// Query methods
impl Order {
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the items in the order they were stored.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the total quantity of all items.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}

// Status transitions
impl Order {
    /// Fails unless the order may be confirmed.
    pub fn ensure_confirmable(&self) -> Result<(), OrderError> {
        self.ensure(self.status.can_confirm(), "confirm")
    }

    /// Fails unless the order may be cancelled.
    pub fn ensure_cancellable(&self) -> Result<(), OrderError> {
        self.ensure(self.status.can_cancel(), "cancel")
    }

    /// Moves the order to `Confirmed`.
    pub fn confirm(&mut self) -> Result<(), OrderError> {
        self.ensure_confirmable()?;
        self.status = OrderStatus::Confirmed;
        Ok(())
    }

    /// Moves the order to `Cancelled`.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        self.ensure_cancellable()?;
        self.status = OrderStatus::Cancelled;
        Ok(())
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), OrderError> {
        if allowed {
            Ok(())
        } else {
            Err(OrderError::InvalidStatusTransition {
                order_id: self.order_id,
                current: self.status,
                action,
            })
        }
    }
}
