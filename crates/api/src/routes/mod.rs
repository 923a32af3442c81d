//! HTTP handlers and the state they share.

pub mod health;
pub mod metrics;
pub mod orders;
pub mod sequences;
pub mod stock;

use std::sync::Arc;

use domain::OrderRepository;
use saga::{OrderLifecycle, StockGateway};
use sequence::{SequenceGenerator, SequenceStore};

/// Orchestrator over type-erased order and stock backends.
pub type Lifecycle = OrderLifecycle<Arc<dyn OrderRepository>, Arc<dyn StockGateway>>;

/// Generator over a type-erased sequence store.
pub type Sequences = SequenceGenerator<Arc<dyn SequenceStore>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub lifecycle: Lifecycle,
    pub sequences: Sequences,
}

impl AppState {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        stock: Arc<dyn StockGateway>,
        sequences: Arc<dyn SequenceStore>,
    ) -> Self {
        Self {
            lifecycle: OrderLifecycle::new(orders, stock),
            sequences: SequenceGenerator::new(sequences),
        }
    }
}
