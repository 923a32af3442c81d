//! Order repository implementations.
//!
//! [`InMemoryOrderRepository`] backs tests and local runs;
//! [`PostgresOrderRepository`] is the production store.

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderRepository;
pub use postgres::PostgresOrderRepository;
