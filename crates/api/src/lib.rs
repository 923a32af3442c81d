//! HTTP API server for the order lifecycle and document sequence services.
//!
//! Routes under `/api/v1` forward into [`saga::OrderLifecycle`] and
//! [`sequence::SequenceGenerator`]; `/health` and `/metrics` sit at the root.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::InMemoryStockGateway;
use sequence::{InMemorySequenceStore, SequenceStore};
use store::InMemoryOrderRepository;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::SequenceSeed;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api = Router::new()
        .route(
            "/orders",
            post(routes::orders::create).get(routes::orders::list),
        )
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/confirm", post(routes::orders::confirm))
        .route("/orders/{id}/cancel", post(routes::orders::cancel))
        .route("/stock/validate", post(routes::stock::validate))
        .route("/stock/reserve", post(routes::stock::reserve))
        .route("/stock/release", post(routes::stock::release))
        .route(
            "/sequences/{document_type}/next",
            post(routes::sequences::next),
        )
        .with_state(state);

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api/v1", api)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// In-memory backends, kept so callers can seed stock and sequences.
#[derive(Clone, Default)]
pub struct InMemoryBackends {
    pub orders: InMemoryOrderRepository,
    pub stock: InMemoryStockGateway,
    pub sequences: InMemorySequenceStore,
}

/// Creates application state over in-memory stores and a simulated stock
/// service.
pub fn create_in_memory_state() -> (Arc<AppState>, InMemoryBackends) {
    let backends = InMemoryBackends::default();
    let state = Arc::new(AppState::new(
        Arc::new(backends.orders.clone()),
        Arc::new(backends.stock.clone()),
        Arc::new(backends.sequences.clone()),
    ));
    (state, backends)
}

/// Provisions each seeded sequence that does not exist yet. Returns how many
/// rows were created.
pub async fn provision_sequences(
    store: &dyn SequenceStore,
    seeds: &[SequenceSeed],
) -> sequence::Result<usize> {
    let mut created = 0;
    for seed in seeds {
        if store.provision(&seed.key, seed.start).await? {
            tracing::info!(key = %seed.key, start = seed.start, "sequence provisioned");
            created += 1;
        }
    }
    Ok(created)
}
