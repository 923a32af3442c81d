//! Repository error types.

use common::OrderId;
use thiserror::Error;

use crate::order::{OrderError, OrderStatus};

/// Errors returned by [`OrderRepository`](crate::OrderRepository)
/// implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The order does not exist for this tenant.
    ///
    /// Also returned for orders owned by another tenant, so existence never
    /// leaks across tenants.
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// A conditional status update matched no row because the order is no
    /// longer in the expected status.
    #[error("order {order_id} is no longer {expected}; {action} not applied")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
        action: &'static str,
    },

    /// The aggregate failed validation on save; nothing was written.
    #[error("invalid order: {0}")]
    InvalidOrder(#[from] OrderError),

    /// The order already exists.
    #[error("order already exists: {0}")]
    Duplicate(OrderId),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RepositoryError {
    /// Wraps any backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        RepositoryError::Backend(Box::new(err))
    }
}
