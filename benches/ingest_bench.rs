use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use quarry::config::{EngineConfig, IndexingMode, PendingConfig};
use quarry::models::Document;
use quarry::SearchEngine;

fn make_doc(id: u64) -> Document {
    Document::new(id)
        .with_title(format!("document title {}", id % 97))
        .with_body("the quick brown fox jumps over the lazy dog while indexing text")
}

fn bench_ingest(c: &mut Criterion) {
    let batch = 1_000u64;
    let mut group = c.benchmark_group("ingest");
    group.throughput(Throughput::Elements(batch));

    for mode in [IndexingMode::Direct, IndexingMode::Buffered] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", mode)),
            &mode,
            |b, &mode| {
                let config = EngineConfig::default()
                    .with_indexing_mode(mode)
                    .with_pending(PendingConfig {
                        hard_cap: usize::MAX,
                        ..Default::default()
                    });
                let engine = SearchEngine::new(config).unwrap();
                let mut next = 0u64;
                b.iter(|| {
                    for _ in 0..batch {
                        black_box(engine.on_document_written(&make_doc(next)).unwrap());
                        next += 1;
                    }
                });
            },
        );
    }
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_batch");
    for batch in [100usize, 1_000, 5_000] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter_batched(
                || {
                    let engine = SearchEngine::new(EngineConfig::default()).unwrap();
                    for i in 0..batch as u64 {
                        engine.on_document_written(&make_doc(i)).unwrap();
                    }
                    engine
                },
                |engine| black_box(engine.merge_pending(batch)),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ingest, bench_merge);
criterion_main!(benches);
