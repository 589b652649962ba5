//! TransportAdapter, REST half (C13, §4.11, §6.2) — axum CRUD endpoints for
//! memory, recall, search, graph, health and metrics. Shares request
//! validation and error mapping with the tool-protocol transport
//! (`crate::mcp`) via `CoreError::rpc_code`/`code` (§7).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthContext, AuthGate, Origin};
use crate::coding_memory::CodingMemory;
use crate::error::CoreError;
use crate::memory_manager::MemoryManager;
use crate::types::{MemoryScope, MemorySpec, MemoryValue, RecallOptions, ScopeFilter};

#[derive(Clone)]
pub struct AppState {
    pub memory: Arc<MemoryManager>,
    pub coding: Arc<CodingMemory>,
    pub auth: Arc<AuthGate>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/memory", post(create_memory))
        .route("/api/v1/memory/:key", get(get_memory).delete(delete_memory))
        .route("/api/v1/recall", post(recall))
        .route("/api/v1/search", get(search))
        .route("/api/v1/graph/interaction", post(record_interaction))
        .route("/api/v1/graph/pattern/:user_id", get(user_pattern))
        .route("/api/v1/health", get(health))
        .route("/api/v1/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// §6.2 headers: `Authorization: Bearer <token>` optional, `X-User-ID`
/// always wins when present.
fn auth_context(state: &AppState, headers: &HeaderMap) -> AuthContext {
    let credential = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let user_override = headers.get("x-user-id").and_then(|v| v.to_str().ok());
    state.auth.authenticate(credential, user_override, Origin::Remote)
}

struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::BadRequest(_) | CoreError::ModelMismatch { .. } => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::Deadline(_) => StatusCode::GATEWAY_TIMEOUT,
            CoreError::StoreUnavailable(_) | CoreError::UpstreamFailure { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "code": self.0.code(),
            "message": self.0.to_string(),
            "component": self.0.component().map(|c| c.as_str()),
        });
        (status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
struct CreateMemoryBody {
    key: Option<String>,
    value: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    agent_name: Option<String>,
    importance: Option<f32>,
}

async fn create_memory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateMemoryBody>,
) -> Result<Response, ApiError> {
    let ctx = auth_context(&state, &headers);
    let spec = MemorySpec {
        user_id: ctx.user_id,
        agent_name: body.agent_name.unwrap_or_else(|| "global".to_string()),
        key: body.key,
        value: MemoryValue::Text(body.value),
        scope: if body.scope.as_deref() == Some("working") {
            MemoryScope::Working
        } else {
            MemoryScope::Persistent
        },
        tags: body.tags,
        importance: body.importance.unwrap_or(0.5),
    };
    let memory = state.memory.remember(spec)?;
    Ok((StatusCode::CREATED, Json(json!(memory))).into_response())
}

#[derive(Deserialize)]
struct KeyQuery {
    #[serde(default)]
    agent_name: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

fn parse_scope(scope: Option<&str>) -> ScopeFilter {
    match scope {
        Some("working") => ScopeFilter::Working,
        Some("persistent") => ScopeFilter::Persistent,
        _ => ScopeFilter::All,
    }
}

async fn get_memory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Query(q): Query<KeyQuery>,
) -> Result<Response, ApiError> {
    let ctx = auth_context(&state, &headers);
    let agent_name = q.agent_name.unwrap_or_else(|| "global".to_string());
    let memory = state
        .memory
        .recall_by_key(&ctx.user_id, &agent_name, parse_scope(q.scope.as_deref()), &key)?;
    match memory {
        Some(m) => Ok(Json(json!(m)).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

async fn delete_memory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Query(q): Query<KeyQuery>,
) -> Result<Response, ApiError> {
    let ctx = auth_context(&state, &headers);
    let agent_name = q.agent_name.unwrap_or_else(|| "global".to_string());
    state
        .memory
        .forget(&ctx.user_id, &agent_name, parse_scope(q.scope.as_deref()), &key)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Deserialize)]
struct RecallBody {
    query: String,
    #[serde(default)]
    agent_name: Option<String>,
    k: Option<usize>,
}

async fn recall(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RecallBody>,
) -> Result<Response, ApiError> {
    let ctx = auth_context(&state, &headers);
    let agent_name = body.agent_name.unwrap_or_else(|| "global".to_string());
    let opts = RecallOptions { top_k: body.k.unwrap_or(10), ..RecallOptions::default() };
    let results = state.memory.recall_hybrid(&ctx.user_id, &agent_name, &body.query, &opts)?;
    Ok(Json(json!(results)).into_response())
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
    limit: Option<usize>,
    #[serde(default)]
    agent_name: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<SearchQuery>,
) -> Result<Response, ApiError> {
    let ctx = auth_context(&state, &headers);
    let agent_name = q.agent_name.unwrap_or_else(|| "global".to_string());
    let results = state.memory.search_text(&ctx.user_id, &agent_name, &q.q, q.limit.unwrap_or(20))?;
    Ok(Json(json!(results)).into_response())
}

#[derive(Deserialize)]
struct InteractionBody {
    query: String,
    response: String,
    #[serde(default)]
    metadata: Value,
}

async fn record_interaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<InteractionBody>,
) -> Result<Response, ApiError> {
    let ctx = auth_context(&state, &headers);
    let node_id = state
        .memory
        .record_interaction(&ctx.user_id, &body.query, &body.response, body.metadata)?;
    Ok((StatusCode::CREATED, Json(json!({ "node_id": node_id }))).into_response())
}

async fn user_pattern(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let pattern = state.memory.get_user_pattern(&user_id)?;
    Ok(Json(json!(pattern)).into_response())
}

async fn health(State(state): State<AppState>) -> Response {
    match state.memory.health_check() {
        Ok(status) if status.healthy => {
            Json(json!({ "status": "healthy", "components": { "kv_store": status } })).into_response()
        }
        Ok(status) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "components": { "kv_store": status } })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let ctx = auth_context(&state, &headers);
    let stats = state.memory.memory_stats(&ctx.user_id)?;
    let cache_stats = state.memory.cache().stats();
    Ok(Json(json!({ "memory": stats, "cache": cache_stats })).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::embedder::LocalHashEmbedder;
    use crate::graph::GraphStore;
    use crate::llm::NullLlmService;
    use crate::storage::{SqliteKvStore, SqliteLexicalIndex, SqliteVectorIndex};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = CoreConfig { db_path: ":memory:".to_string(), ..CoreConfig::default() };
        let kv: Arc<dyn crate::storage::KvStore> = Arc::new(SqliteKvStore::open_in_memory().unwrap());
        let vector: Arc<dyn crate::storage::VectorIndex> =
            Arc::new(SqliteVectorIndex::open(":memory:", "local-hash-v1", 64).unwrap());
        let lexical: Arc<dyn crate::storage::LexicalIndex> = Arc::new(SqliteLexicalIndex::open(":memory:").unwrap());
        let graph = Arc::new(GraphStore::open(":memory:").unwrap());
        let embedder: Arc<dyn crate::embedder::Embedder> = Arc::new(LocalHashEmbedder::new(64));
        let llm: Arc<dyn crate::llm::LlmService> = Arc::new(NullLlmService);
        let cache = crate::cache::CacheLayer::new(100);
        let memory = Arc::new(MemoryManager::new(config, kv, vector, lexical, graph.clone(), embedder, llm.clone(), None, cache));
        let coding = Arc::new(CodingMemory::new(":memory:", graph, memory.clone(), llm, 24).unwrap());
        let auth = Arc::new(AuthGate::new(&CoreConfig::default()));
        AppState { memory, coding, auth }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let app = router(test_state());
        let create_req = Request::builder()
            .method("POST")
            .uri("/api/v1/memory")
            .header("content-type", "application/json")
            .header("x-user-id", "u1")
            .body(Body::from(r#"{"value":"prefers dark roast coffee"}"#))
            .unwrap();
        let resp = app.clone().oneshot(create_req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let health_req = Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(health_req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_missing_memory_returns_404() {
        let app = router(test_state());
        let req = Request::builder()
            .uri("/api/v1/memory/nope?agent_name=global")
            .header("x-user-id", "u1")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
