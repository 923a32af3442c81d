//! Domain layer for the order service.
//!
//! This crate provides:
//! - The Order aggregate with its items and status machine
//! - Validation errors raised before any I/O
//! - The repository contract the lifecycle orchestrator depends on

pub mod error;
pub mod order;
pub mod repository;

pub use error::RepositoryError;
pub use order::{NewOrderItem, Order, OrderError, OrderItem, OrderStatus, Sku, UnknownStatus};
pub use repository::{OrderQuery, OrderRepository};
