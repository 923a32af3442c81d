use common::TenantId;
use criterion::{Criterion, criterion_group, criterion_main};
use futures_util::future::join_all;
use sequence::{DocumentType, InMemorySequenceStore, SequenceGenerator, SequenceKey, SequenceStore};

fn setup(rt: &tokio::runtime::Runtime) -> (SequenceGenerator<InMemorySequenceStore>, TenantId, DocumentType) {
    let tenant_id = TenantId::new("bench-tenant").unwrap();
    let document_type = DocumentType::new("INVOICE").unwrap();
    let store = InMemorySequenceStore::new();
    rt.block_on(async {
        store
            .provision(&SequenceKey::new(tenant_id.clone(), document_type.clone()), 0)
            .await
            .unwrap();
    });
    (SequenceGenerator::new(store), tenant_id, document_type)
}

fn bench_next_number(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (generator, tenant_id, document_type) = setup(&rt);

    c.bench_function("sequence/next_number", |b| {
        b.iter(|| {
            rt.block_on(async {
                generator
                    .next_number(&tenant_id, &document_type)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_next_number_concurrent_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (generator, tenant_id, document_type) = setup(&rt);

    c.bench_function("sequence/next_number_concurrent_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let calls = (0..10).map(|_| generator.next_number(&tenant_id, &document_type));
                for result in join_all(calls).await {
                    result.unwrap();
                }
            });
        });
    });
}

criterion_group!(benches, bench_next_number, bench_next_number_concurrent_10);
criterion_main!(benches);
