//! Order lifecycle orchestration against a remote stock service.
//!
//! [`OrderLifecycle`] sequences remote stock calls with local status
//! transitions for create, confirm and cancel. There is no distributed
//! transaction between the order store and the stock service; a failed
//! confirm or cancel is undone with compensating stock calls.

pub mod context;
pub mod coordinator;
pub mod error;
pub mod services;

pub use context::{CancelHandle, RequestContext};
pub use coordinator::OrderLifecycle;
pub use error::{Result, SagaError};
pub use services::{
    AvailabilityCheck, ConsumeResult, HttpStockGateway, InMemoryStockGateway, ReleaseResult,
    ReserveResult, RevertConsumeResult, StockAvailability, StockCall, StockError, StockGateway,
    StockGatewayConfig, StockLevel, StockOperation, StockRequest,
};
