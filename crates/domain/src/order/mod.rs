//! Order aggregate and related types.

mod aggregate;
mod status;
mod value_objects;

pub use aggregate::Order;
pub use status::{OrderStatus, UnknownStatus};
pub use value_objects::{NewOrderItem, OrderItem, Sku};

use common::{EmptyTenantId, OrderId};
use thiserror::Error;

/// Errors raised by the order aggregate itself.
///
/// These are detected locally, before any storage or network I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Tenant ID is required.
    #[error("tenant_id is required")]
    TenantRequired,

    /// SKU is required.
    #[error("sku is required")]
    SkuRequired,

    /// Invalid quantity.
    #[error("invalid quantity {quantity} for sku '{sku}' (must be greater than 0)")]
    InvalidQuantity { sku: String, quantity: i64 },

    /// Order has no items.
    #[error("order must have at least one item")]
    NoItems,

    /// Order is not in the status the action requires.
    #[error("cannot {action} order {order_id}: order is in {current} state, expected CREATED")]
    InvalidStatusTransition {
        order_id: OrderId,
        current: OrderStatus,
        action: &'static str,
    },
}

impl OrderError {
    /// Returns true for input validation failures.
    pub fn is_validation(&self) -> bool {
        !matches!(self, OrderError::InvalidStatusTransition { .. })
    }
}

impl From<EmptyTenantId> for OrderError {
    fn from(_: EmptyTenantId) -> Self {
        OrderError::TenantRequired
    }
}
