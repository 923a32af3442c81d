//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use api::routes::AppState;
use domain::OrderRepository;
use saga::{HttpStockGateway, StockGateway};
use sequence::{PostgresSequenceStore, SequenceStore};
use sqlx::postgres::PgPoolOptions;
use store::PostgresOrderRepository;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Builds state over Postgres when `DATABASE_URL` is set, in-memory stores
/// otherwise. The stock service is always reached over HTTP.
async fn build_state(config: &Config) -> Arc<AppState> {
    let stock: Arc<dyn StockGateway> = Arc::new(
        HttpStockGateway::new(config.stock.clone()).expect("failed to build stock HTTP client"),
    );

    let (orders, sequences): (Arc<dyn OrderRepository>, Arc<dyn SequenceStore>) =
        match config.database_url.as_deref() {
            Some(database_url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.database_max_connections)
                    .connect(database_url)
                    .await
                    .expect("failed to connect to database");

                let orders = PostgresOrderRepository::new(pool.clone());
                orders
                    .run_migrations()
                    .await
                    .expect("failed to run migrations");
                tracing::info!("database migrations applied");

                let orders: Arc<dyn OrderRepository> = Arc::new(orders);
                let sequences: Arc<dyn SequenceStore> = Arc::new(PostgresSequenceStore::new(pool));
                (orders, sequences)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory order and sequence stores");
                if config.sequence_seeds.is_empty() {
                    tracing::warn!(
                        "SEQUENCE_SEEDS not set, every sequence request will return not found"
                    );
                }
                let backends = api::InMemoryBackends::default();
                let orders: Arc<dyn OrderRepository> = Arc::new(backends.orders);
                let sequences: Arc<dyn SequenceStore> = Arc::new(backends.sequences);
                (orders, sequences)
            }
        };

    let created = api::provision_sequences(sequences.as_ref(), &config.sequence_seeds)
        .await
        .expect("failed to provision sequences");
    if created > 0 {
        tracing::info!(created, "seeded sequences");
    }

    Arc::new(AppState::new(orders, stock, sequences))
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Wire stores, stock gateway and the router
    let state = build_state(&config).await;
    let app = api::create_app(state, metrics_handle);

    // 4. Start server
    let addr = config.addr();
    tracing::info!(
        %addr,
        stock_gateway = %config.stock.gateway_url,
        "starting API server"
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
