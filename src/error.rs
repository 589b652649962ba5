//! Error taxonomy for the Universal Memory Core (§7)

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// The subsystem (component, §2) that raised an error. Surfaced alongside
/// `code()`/`message` so clients can route/aggregate failures per-component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    KvStore,
    VectorIndex,
    LexicalIndex,
    Reranker,
    MemoryManager,
    GraphStore,
    RecallScorer,
    CodingMemory,
    CacheLayer,
    AuthGate,
    Transport,
    Embedder,
    LlmService,
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::KvStore => "kv_store",
            Component::VectorIndex => "vector_index",
            Component::LexicalIndex => "lexical_index",
            Component::Reranker => "reranker",
            Component::MemoryManager => "memory_manager",
            Component::GraphStore => "graph_store",
            Component::RecallScorer => "recall_scorer",
            Component::CodingMemory => "coding_memory",
            Component::CacheLayer => "cache_layer",
            Component::AuthGate => "auth_gate",
            Component::Transport => "transport",
            Component::Embedder => "embedder",
            Component::LlmService => "llm_service",
        }
    }
}

/// Main error type for the core. Every public operation returns `Result<T>`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("deadline exceeded: {0}")]
    Deadline(String),

    #[error("upstream failure ({component}): {message}")]
    UpstreamFailure { component: Component, message: String },

    #[error("embedding model mismatch: index built with {indexed}, queried with {queried}")]
    ModelMismatch { indexed: String, queried: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "openai")]
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable identifier suitable for client-side i18n (§7).
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::BadRequest(_) => "bad_request",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::Unauthorized(_) => "unauthorized",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::StoreUnavailable(_) => "store_unavailable",
            CoreError::Deadline(_) => "deadline",
            CoreError::UpstreamFailure { .. } => "upstream_failure",
            CoreError::ModelMismatch { .. } => "model_mismatch",
            CoreError::Database(_) => "database_error",
            CoreError::Serialization(_) => "serialization_error",
            CoreError::Io(_) => "io_error",
            #[cfg(feature = "openai")]
            CoreError::Http(_) => "http_error",
            CoreError::Internal(_) => "internal_error",
        }
    }

    /// Component that raised the error, when known precisely.
    pub fn component(&self) -> Option<Component> {
        match self {
            CoreError::UpstreamFailure { component, .. } => Some(*component),
            CoreError::ModelMismatch { .. } => Some(Component::VectorIndex),
            CoreError::Database(_) => Some(Component::KvStore),
            _ => None,
        }
    }

    /// Transient backend failures worth retrying (§4.1 retry policy).
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::StoreUnavailable(_) | CoreError::Database(_))
    }

    /// JSON-RPC numeric error code for the MCP transport.
    pub fn rpc_code(&self) -> i64 {
        match self {
            CoreError::BadRequest(_) => -32602,
            CoreError::NotFound(_) => -32001,
            CoreError::Conflict(_) => -32005,
            CoreError::Unauthorized(_) => -32003,
            CoreError::Forbidden(_) => -32004,
            CoreError::StoreUnavailable(_) => -32010,
            CoreError::Deadline(_) => -32011,
            CoreError::UpstreamFailure { .. } => -32012,
            CoreError::ModelMismatch { .. } => -32013,
            _ => -32000,
        }
    }
}
