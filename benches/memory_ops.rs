//! Performance benchmarks for core memory operations (C3/C7 write/read path).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use umc::cache::CacheLayer;
use umc::config::CoreConfig;
use umc::embedder::{Embedder, LocalHashEmbedder};
use umc::graph::GraphStore;
use umc::llm::{LlmService, NullLlmService};
use umc::memory_manager::MemoryManager;
use umc::search::{HeuristicReranker, Reranker};
use umc::storage::{KvStore, LexicalIndex, SqliteKvStore, SqliteLexicalIndex, SqliteVectorIndex, VectorIndex};
use umc::types::{ListFilter, MemoryScope, MemorySpec, MemoryValue, ScopeFilter};

fn build_manager() -> MemoryManager {
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
    MemoryManager::new(config, kv, vector, lexical, graph, embedder, llm, reranker, cache)
}

fn spec(user: &str, key: &str, text: String) -> MemorySpec {
    MemorySpec {
        user_id: user.to_string(),
        agent_name: "global".to_string(),
        key: Some(key.to_string()),
        value: MemoryValue::Text(text),
        scope: MemoryScope::Persistent,
        tags: vec!["benchmark".to_string()],
        importance: 0.5,
    }
}

fn bench_remember(c: &mut Criterion) {
    let mgr = build_manager();

    let mut group = c.benchmark_group("remember");
    group.throughput(Throughput::Elements(1));

    group.bench_function("new_memory", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let key = format!("bench-{i}");
            i += 1;
            mgr.remember(black_box(spec("u1", &key, format!("benchmark content number {i}")))).unwrap()
        })
    });

    group.finish();
}

fn bench_recall_by_key(c: &mut Criterion) {
    let mgr = build_manager();
    for i in 0..1000 {
        mgr.remember(spec("u1", &format!("key{i}"), format!("Memory content number {i}"))).unwrap();
    }

    let mut group = c.benchmark_group("recall_by_key");
    group.throughput(Throughput::Elements(1));

    group.bench_function("exact_key", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let key = format!("key{}", i % 1000);
            i += 1;
            mgr.recall_by_key("u1", "global", black_box(ScopeFilter::Persistent), &key).unwrap()
        })
    });

    group.finish();
}

fn bench_list(c: &mut Criterion) {
    let mgr = build_manager();
    for i in 0..1000 {
        let spec = MemorySpec {
            tags: vec![format!("tag{}", i % 10), "benchmark".to_string()],
            ..spec("u1", &format!("key{i}"), format!("Memory content number {i} with longer text"))
        };
        mgr.remember(spec).unwrap();
    }

    let mut group = c.benchmark_group("list");

    for limit in [10usize, 50, 100].iter() {
        group.throughput(Throughput::Elements(*limit as u64));
        group.bench_with_input(BenchmarkId::new("limit", limit), limit, |b, &limit| {
            b.iter(|| {
                let filter = ListFilter {
                    limit,
                    ..Default::default()
                };
                mgr.list("u1", black_box(ScopeFilter::Persistent), &filter).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_forget(c: &mut Criterion) {
    let mgr = build_manager();
    for i in 0..2000 {
        mgr.remember(spec("u1", &format!("key{i}"), format!("content {i}"))).unwrap();
    }

    c.bench_function("forget", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let key = format!("key{}", i % 2000);
            i += 1;
            mgr.forget("u1", "global", black_box(ScopeFilter::Persistent), &key).unwrap()
        })
    });
}

criterion_group!(benches, bench_remember, bench_recall_by_key, bench_list, bench_forget);
criterion_main!(benches);
