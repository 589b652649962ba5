//! Performance benchmarks for hybrid recall (C4/C5/C7 §4.5.2).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use umc::cache::CacheLayer;
use umc::config::CoreConfig;
use umc::embedder::{Embedder, LocalHashEmbedder};
use umc::graph::GraphStore;
use umc::llm::{LlmService, NullLlmService};
use umc::memory_manager::MemoryManager;
use umc::search::{rrf_fusion, HeuristicReranker, Reranker};
use umc::storage::{tokenize, KvStore, LexicalIndex, SqliteKvStore, SqliteLexicalIndex, SqliteVectorIndex, VectorIndex};
use umc::types::{MemoryScope, MemorySpec, MemoryValue, RecallOptions};

const SAMPLE_CONTENTS: &[&str] = &[
    "Authentication using JWT tokens and refresh mechanism",
    "Database migration strategy for PostgreSQL",
    "React component lifecycle and hooks optimization",
    "API rate limiting implementation with Redis",
    "Docker container orchestration with Kubernetes",
    "GraphQL schema design best practices",
    "Microservices communication patterns",
    "CI/CD pipeline configuration with GitHub Actions",
    "Memory leak detection in Node.js applications",
    "Rust ownership and borrowing concepts",
];

fn build_manager_with_data(count: usize) -> MemoryManager {
    let config = CoreConfig {
        db_path: ":memory:".to_string(),
        ..CoreConfig::default()
    };
    let kv: Arc<dyn KvStore> = Arc::new(SqliteKvStore::open_in_memory().unwrap());
    let vector: Arc<dyn VectorIndex> = Arc::new(SqliteVectorIndex::open(":memory:", "local-hash-v1", 64).unwrap());
    let lexical: Arc<dyn LexicalIndex> = Arc::new(SqliteLexicalIndex::open(":memory:").unwrap());
    let graph = Arc::new(GraphStore::open(":memory:").unwrap());
    let embedder: Arc<dyn Embedder> = Arc::new(LocalHashEmbedder::new(64));
    let llm: Arc<dyn LlmService> = Arc::new(NullLlmService);
    let reranker: Option<Arc<dyn Reranker>> = Some(Arc::new(HeuristicReranker));
    let cache = CacheLayer::new(100);
    let mgr = MemoryManager::new(config, kv, vector, lexical, graph, embedder, llm, reranker, cache);

    for i in 0..count {
        let content = format!(
            "{} - variation {} with additional context about software development",
            SAMPLE_CONTENTS[i % SAMPLE_CONTENTS.len()],
            i
        );
        mgr.remember(MemorySpec {
            user_id: "u1".to_string(),
            agent_name: "global".to_string(),
            key: Some(format!("mem{i}")),
            value: MemoryValue::Text(content),
            scope: MemoryScope::Persistent,
            tags: vec![format!("topic{}", i % 5)],
            importance: (i % 10) as f32 / 10.0,
        })
        .unwrap();
    }
    mgr
}

fn bench_recall_semantic(c: &mut Criterion) {
    let mgr = build_manager_with_data(500);
    let mut group = c.benchmark_group("recall_semantic");
    group.throughput(Throughput::Elements(1));

    for top_k in [5usize, 20].iter() {
        group.bench_with_input(BenchmarkId::new("top_k", top_k), top_k, |b, &top_k| {
            b.iter(|| {
                mgr.recall_semantic("u1", "global", black_box("database migration patterns"), top_k).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_recall_hybrid(c: &mut Criterion) {
    let mgr = build_manager_with_data(500);
    let mut group = c.benchmark_group("recall_hybrid");
    group.throughput(Throughput::Elements(1));

    group.bench_function("rerank_disabled", |b| {
        let opts = RecallOptions::default();
        b.iter(|| mgr.recall_hybrid("u1", "global", black_box("Kubernetes orchestration"), &opts).unwrap())
    });

    group.bench_function("rerank_enabled", |b| {
        let opts = RecallOptions {
            rerank_enabled: true,
            ..RecallOptions::default()
        };
        b.iter(|| mgr.recall_hybrid("u1", "global", black_box("Kubernetes orchestration"), &opts).unwrap())
    });

    group.finish();
}

fn bench_rrf_fusion(c: &mut Criterion) {
    let vector: Vec<(i64, f32)> = (0..100).map(|i| (i, 1.0 - i as f32 * 0.001)).collect();
    let lexical: Vec<(i64, f32)> = (0..100).rev().map(|i| (i, 1.0 - i as f32 * 0.001)).collect();

    c.bench_function("rrf_fusion_100_candidates", |b| {
        b.iter(|| rrf_fusion(black_box(&vector), black_box(&lexical), 60.0))
    });
}

fn bench_tokenize(c: &mut Criterion) {
    let text = "Authentication using JWT tokens and refresh mechanism with additional context";
    c.bench_function("tokenize", |b| b.iter(|| tokenize(black_box(text))));
}

criterion_group!(benches, bench_recall_semantic, bench_recall_hybrid, bench_rrf_fusion, bench_tokenize);
criterion_main!(benches);
