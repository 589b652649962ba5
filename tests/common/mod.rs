//! Shared wiring for integration tests: an in-memory `MemoryManager` built
//! from the same public constructors `src/bin/server.rs` uses, minus the
//! network-facing pieces (no `openai` feature, no axum router).

use std::sync::Arc;

use umc::cache::CacheLayer;
use umc::config::CoreConfig;
use umc::embedder::{Embedder, LocalHashEmbedder};
use umc::graph::GraphStore;
use umc::llm::{LlmService, NullLlmService};
use umc::memory_manager::MemoryManager;
use umc::search::{HeuristicReranker, Reranker};
use umc::storage::{KvStore, LexicalIndex, SqliteKvStore, SqliteLexicalIndex, SqliteVectorIndex, VectorIndex};

#[allow(dead_code)]
pub fn manager() -> MemoryManager {
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
