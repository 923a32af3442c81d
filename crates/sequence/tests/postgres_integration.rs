//! PostgreSQL integration tests for the sequence store.
//!
//! Requires Docker. Run with:
//!
//! ```bash
//! cargo test -p sequence --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use common::TenantId;
use sequence::{
    DocumentType, PostgresSequenceStore, SequenceError, SequenceGenerator, SequenceKey,
    SequenceStore, Version,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresSequenceStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresSequenceStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE document_sequences")
        .execute(&pool)
        .await
        .unwrap();

    PostgresSequenceStore::new(pool)
}

fn invoice_key(tenant: &str) -> SequenceKey {
    SequenceKey::new(
        TenantId::new(tenant).unwrap(),
        DocumentType::new("INVOICE").unwrap(),
    )
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn provision_then_swap_bumps_version() {
    let store = get_test_store().await;
    let key = invoice_key("tenant-a");

    assert!(store.provision(&key, 0).await.unwrap());
    assert!(!store.provision(&key, 10).await.unwrap());

    assert!(
        store
            .compare_and_swap(&key, Version::initial(), 1, Version::new(1))
            .await
            .unwrap()
    );
    assert!(
        !store
            .compare_and_swap(&key, Version::initial(), 2, Version::new(1))
            .await
            .unwrap()
    );

    let row = store.read(&key).await.unwrap().unwrap();
    assert_eq!(row.current_number, 1);
    assert_eq!(row.version, Version::new(1));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn unprovisioned_sequence_is_not_found() {
    let store = get_test_store().await;
    let generator = SequenceGenerator::new(store);

    let result = generator
        .next_number(
            &TenantId::new("tenant-a").unwrap(),
            &DocumentType::new("INVOICE").unwrap(),
        )
        .await;
    assert!(matches!(result, Err(SequenceError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires Docker"]
async fn concurrent_numbers_are_unique() {
    let store = get_test_store().await;
    let key = invoice_key("tenant-a");
    store.provision(&key, 0).await.unwrap();
    let generator = Arc::new(SequenceGenerator::new(store));

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let generator = Arc::clone(&generator);
            let key = key.clone();
            tokio::spawn(async move {
                generator
                    .next_number(&key.tenant_id, &key.document_type)
                    .await
            })
        })
        .collect();

    let mut issued = HashSet::new();
    for handle in handles {
        // Some callers may exhaust their retries; the ones that succeed
        // must never collide.
        if let Ok(number) = handle.await.unwrap() {
            assert!(issued.insert(number), "duplicate number {number}");
        }
    }

    let row = generator.store().read(&key).await.unwrap().unwrap();
    assert_eq!(row.current_number as usize, issued.len());
    assert_eq!(row.version.as_i64() as usize, issued.len());
}
