//! Remote stock service: contract, HTTP client and in-memory simulator.

pub mod http;
pub mod memory;
pub mod stock;

pub use http::{HttpStockGateway, StockGatewayConfig};
pub use memory::{InMemoryStockGateway, StockCall, StockLevel};
pub use stock::{
    AvailabilityCheck, ConsumeResult, ReleaseResult, ReserveResult, RevertConsumeResult,
    StockAvailability, StockError, StockGateway, StockOperation, StockRequest,
};
