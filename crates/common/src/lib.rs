//! Shared types for the order and sequence services.

pub mod criteria;
pub mod types;

pub use criteria::{ListPage, Pagination, SortOrder};
pub use types::{EmptyTenantId, ItemId, OrderId, TenantId};
