//! Per-tenant document numbering.
//!
//! Numbers are assigned with an optimistic compare-and-swap on a versioned
//! row, so concurrent callers never receive the same number and no number
//! is skipped.

pub mod error;
pub mod generator;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, SequenceError};
pub use generator::{RetryPolicy, SequenceGenerator};
pub use memory::InMemorySequenceStore;
pub use postgres::PostgresSequenceStore;
pub use store::{DocumentType, SequenceKey, SequenceRow, SequenceStore, Version};
