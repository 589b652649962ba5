//! Universal Memory Core server
//!
//! Runs both TransportAdapter surfaces (C13, §4.11): the JSON-RPC tool
//! protocol over stdio, and the REST API over HTTP, sharing one
//! `MemoryManager`/`CodingMemory`/`GraphStore` instance.
//!
//! Run with: umc-server

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use umc::auth::AuthGate;
use umc::cache::CacheLayer;
use umc::coding_memory::CodingMemory;
use umc::config::{Args, CoreConfig};
use umc::embedder::create_embedder;
use umc::error::Result;
use umc::graph::GraphStore;
use umc::llm::create_llm_service;
use umc::mcp::{McpServer, ToolDispatcher};
use umc::memory_manager::MemoryManager;
use umc::rest::{self, AppState};
use umc::search::{HeuristicReranker, Reranker};
use umc::storage::{migrate, SqliteKvStore, SqliteLexicalIndex, SqliteVectorIndex};

const EMBEDDING_DIMENSIONS: usize = 256;
const EMBEDDING_MODEL_NAME: &str = "local-hash-v1";

fn build_state(args: &Args, config: CoreConfig) -> Result<AppState> {
    let db_path = config.resolved_db_path();
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let conn_probe = rusqlite::Connection::open(&db_path)?;
    migrate(&conn_probe)?;
    drop(conn_probe);

    let kv: Arc<dyn umc::storage::KvStore> = Arc::new(SqliteKvStore::open(&db_path)?);
    let vector: Arc<dyn umc::storage::VectorIndex> =
        Arc::new(SqliteVectorIndex::open(&db_path, EMBEDDING_MODEL_NAME, EMBEDDING_DIMENSIONS)?);
    let lexical: Arc<dyn umc::storage::LexicalIndex> = Arc::new(SqliteLexicalIndex::open(&db_path)?);
    let graph = Arc::new(GraphStore::open(&db_path)?);

    let embedder = create_embedder(&args.embedding_model, args.openai_api_key.clone(), EMBEDDING_DIMENSIONS)?;
    let llm = create_llm_service(args.openai_api_key.clone());
    let reranker: Option<Arc<dyn Reranker>> = Some(Arc::new(HeuristicReranker));
    let cache = CacheLayer::new(1000);

    let memory = Arc::new(MemoryManager::new(
        config.clone(),
        kv,
        vector,
        lexical,
        graph.clone(),
        embedder,
        llm.clone(),
        reranker,
        cache,
    ));
    let coding = Arc::new(CodingMemory::new(&db_path, graph, memory.clone(), llm, config.max_session_duration_hours)?);
    let auth = Arc::new(AuthGate::new(&config));

    Ok(AppState { memory, coding, auth })
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let bind_addr = args.bind_addr.clone();
    let config: CoreConfig = args.clone().into();

    let state = build_state(&args, config)?;

    // REST transport runs on its own Tokio runtime in a background thread
    // so the MCP stdio loop below can own the main thread synchronously,
    // mirroring the teacher's pattern of spawning a dedicated runtime for
    // a secondary transport rather than making the whole binary async.
    let rest_state = state.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().expect("failed to create REST runtime");
        rt.block_on(async move {
            let app = rest::router(rest_state);
            tracing::info!("REST transport listening on {bind_addr}");
            match tokio::net::TcpListener::bind(&bind_addr).await {
                Ok(listener) => {
                    if let Err(e) = axum::serve(listener, app).await {
                        tracing::error!("REST transport error: {e}");
                    }
                }
                Err(e) => tracing::error!("failed to bind {bind_addr}: {e}"),
            }
        });
    });

    let dispatcher = ToolDispatcher::new(state.memory, state.coding, state.auth);
    let server = McpServer::new(dispatcher);
    tracing::info!("umc MCP server starting on stdio...");
    server.run()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_state_opens_in_memory_style_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("memory.db");
        let config = CoreConfig { db_path: db_path.to_string_lossy().to_string(), ..CoreConfig::default() };
        let args = Args::parse_from(["umc-server"]);
        let state = build_state(&args, config).unwrap();
        assert!(state.memory.memory_stats("u1").is_ok());
    }
}
