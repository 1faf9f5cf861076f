use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use quarry::config::{EngineConfig, IndexingMode, RankingConfig};
use quarry::models::{Document, RankingMode, SearchRequest};
use quarry::SearchEngine;

fn build_engine(doc_count: usize) -> SearchEngine {
    let config = EngineConfig::default()
        .with_indexing_mode(IndexingMode::Direct)
        .with_ranking(RankingConfig {
            default_sample_size: 1_000,
            sample_seed: Some(7),
            ..Default::default()
        });
    let engine = SearchEngine::new(config).unwrap();

    for i in 1..=doc_count as u64 {
        let doc = Document::new(i)
            .with_title(format!("rust programming guide {}", i % 13))
            .with_body(format!("rust language document number {}", i));
        engine.on_document_written(&doc).unwrap();
    }
    engine
}

fn bench_ranking_modes(c: &mut Criterion) {
    let counts = [1_000usize, 10_000, 50_000];
    let mut engines: Vec<(usize, SearchEngine)> = Vec::new();
    for &count in &counts {
        engines.push((count, build_engine(count)));
    }

    for (name, mode) in [("exact", RankingMode::Exact), ("sampled", RankingMode::Sampled)] {
        let mut group = c.benchmark_group(format!("rank_{}", name));
        let request = SearchRequest::new(10)
            .require("rust")
            .optional("guide")
            .with_mode(mode);
        for (count, engine) in engines.iter() {
            group.bench_with_input(BenchmarkId::from_parameter(count), engine, |b, engine| {
                b.iter(|| {
                    black_box(engine.search(&request).unwrap());
                });
            });
        }
        group.finish();
    }
}

fn bench_pending_overlay(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_with_pending");
    for pending in [0usize, 1_000, 5_000] {
        let engine = SearchEngine::new(EngineConfig::default()).unwrap();
        for i in 0..10_000u64 {
            engine
                .on_document_written(&Document::new(i).with_title("rust programming"))
                .unwrap();
        }
        engine.flush();
        for i in 0..pending as u64 {
            engine
                .on_document_written(&Document::new(i).with_title("rust updated"))
                .unwrap();
        }

        let request = SearchRequest::new(10).require("rust");
        group.bench_with_input(BenchmarkId::from_parameter(pending), &engine, |b, engine| {
            b.iter(|| {
                black_box(engine.search(&request).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ranking_modes, bench_pending_overlay);
criterion_main!(benches);
