//! Orchestrator error types.

use common::OrderId;
use domain::{OrderError, OrderStatus, RepositoryError};
use thiserror::Error;

use crate::services::{StockError, StockOperation};

/// Errors that can occur while driving an order through its lifecycle.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Input rejected before any I/O.
    #[error("validation failed: {0}")]
    Validation(OrderError),

    /// Stock operations need an idempotency reference.
    #[error("reference is required")]
    ReferenceRequired,

    /// The order is not in the status the operation requires.
    #[error("cannot {action} order {order_id}: order is {current}, expected CREATED")]
    InvalidState {
        order_id: OrderId,
        current: OrderStatus,
        action: &'static str,
    },

    /// Unknown order, or an order owned by another tenant.
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// The stock service refused a reservation.
    #[error("insufficient stock for SKU {sku}: {source}")]
    InsufficientStock {
        sku: String,
        #[source]
        source: StockError,
    },

    /// The stock service refused a release or consume.
    #[error("insufficient reserved stock for SKU {sku}: {source}")]
    InsufficientReservedStock {
        sku: String,
        #[source]
        source: StockError,
    },

    /// Any other stock service failure.
    #[error("error during {operation} of SKU {sku}: {source}")]
    Stock {
        operation: StockOperation,
        sku: String,
        #[source]
        source: StockError,
    },

    /// The caller cancelled a multi-item operation between items.
    #[error("{action} of order {order_id} cancelled after {completed} item(s)")]
    Cancelled {
        order_id: OrderId,
        action: &'static str,
        completed: usize,
    },

    /// The status write failed after every stock call succeeded; the stock
    /// changes have been reverted.
    #[error("{action} of order {order_id} could not be saved: {source}")]
    PersistenceFailed {
        order_id: OrderId,
        action: &'static str,
        #[source]
        source: RepositoryError,
    },

    /// Reverting earlier stock changes failed; remote stock and the order
    /// disagree until someone reconciles the listed SKUs.
    #[error("{action} of order {order_id} left stock unreconciled for {skus:?}: {cause}")]
    Unreconciled {
        order_id: OrderId,
        action: &'static str,
        skus: Vec<String>,
        #[source]
        cause: Box<SagaError>,
    },

    /// A repository error outside the status transition.
    #[error("repository error: {0}")]
    Repository(RepositoryError),
}

impl SagaError {
    /// Classifies a gateway failure for one SKU.
    pub fn from_stock(operation: StockOperation, sku: impl Into<String>, err: StockError) -> Self {
        let sku = sku.into();
        match err {
            source @ StockError::InsufficientAvailable { .. } => {
                SagaError::InsufficientStock { sku, source }
            }
            source @ StockError::InsufficientReserved { .. } => {
                SagaError::InsufficientReservedStock { sku, source }
            }
            source => SagaError::Stock {
                operation,
                sku,
                source,
            },
        }
    }
}

impl From<OrderError> for SagaError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidStatusTransition {
                order_id,
                current,
                action,
            } => SagaError::InvalidState {
                order_id,
                current,
                action,
            },
            other => SagaError::Validation(other),
        }
    }
}

impl From<RepositoryError> for SagaError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(order_id) => SagaError::NotFound(order_id),
            RepositoryError::InvalidOrder(e) => e.into(),
            other => SagaError::Repository(other),
        }
    }
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_conflicts_keep_their_kind() {
        let err = SagaError::from_stock(
            StockOperation::Reserve,
            "SKU-001",
            StockError::InsufficientAvailable {
                body: "no".to_string(),
            },
        );
        assert!(matches!(err, SagaError::InsufficientStock { ref sku, .. } if sku == "SKU-001"));

        let err = SagaError::from_stock(
            StockOperation::Consume,
            "SKU-001",
            StockError::InsufficientReserved {
                body: "no".to_string(),
            },
        );
        assert!(matches!(err, SagaError::InsufficientReservedStock { .. }));

        let err = SagaError::from_stock(
            StockOperation::Consume,
            "SKU-001",
            StockError::Upstream {
                status: 500,
                body: "boom".to_string(),
            },
        );
        assert!(matches!(
            err,
            SagaError::Stock {
                operation: StockOperation::Consume,
                ..
            }
        ));
    }

    #[test]
    fn status_transition_becomes_invalid_state() {
        let order_id = OrderId::new();
        let err: SagaError = OrderError::InvalidStatusTransition {
            order_id,
            current: OrderStatus::Confirmed,
            action: "cancel",
        }
        .into();
        assert!(matches!(
            err,
            SagaError::InvalidState {
                current: OrderStatus::Confirmed,
                ..
            }
        ));

        let err: SagaError = OrderError::NoItems.into();
        assert!(matches!(err, SagaError::Validation(OrderError::NoItems)));
    }

    #[test]
    fn repository_not_found_is_not_found() {
        let order_id = OrderId::new();
        let err: SagaError = RepositoryError::NotFound(order_id).into();
        assert!(matches!(err, SagaError::NotFound(id) if id == order_id));
    }
}
