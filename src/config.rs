//! Crate-wide configuration (SPEC_FULL.md §A.3)
//!
//! Centralizes the numeric constants the spec calls out so they are never
//! hard-coded at the call site: RRF's `k_rrf`, the recall scorer's decay
//! constants, resource limits (§5), retry/backoff schedule (§4.1, §7), and
//! session-resume window (§4.6.1).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::ScorerWeights;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Path to the SQLite database file backing KVStore/VectorIndex/LexicalIndex.
    pub db_path: String,
    /// RRF's `k_rrf` constant (§4.5.2). Default 60.
    pub rrf_k: f32,
    /// Recall scorer recency half-life-ish time constant, in days (§4.7).
    pub recall_tau_days: f32,
    /// Recall scorer frequency saturation constant (§4.7).
    pub recall_freq_saturation: f64,
    /// Default simplex of scorer weights (§4.7); callers may override per-request.
    pub default_scorer_weights: ScorerWeights,
    /// `resume()` only succeeds within this many hours of abortion (§4.6.1).
    pub max_session_duration_hours: i64,
    /// Backoff schedule for transient `KVStore` failures (§4.1): 50/200/800ms.
    pub retry_backoff_ms: [u64; 3],
    /// Per-external-call retry cap and total time budget (§7).
    pub external_retry_cap: u32,
    pub external_retry_budget: Duration,
    /// Resource limits (§5).
    pub max_value_size_bytes: usize,
    pub max_tags: usize,
    pub max_top_k: usize,
    pub max_candidates_k: usize,
    pub max_graph_hops: u32,
    /// User-id fallback when a request carries no credential (§4.10).
    pub allow_unauthenticated: bool,
    pub default_user_id: String,
    /// Request deadline applied when a transport doesn't specify one (§5).
    pub default_deadline: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: "~/.local/share/umc/memory.db".to_string(),
            rrf_k: 60.0,
            recall_tau_days: 30.0,
            recall_freq_saturation: 100.0,
            default_scorer_weights: ScorerWeights::default(),
            max_session_duration_hours: 24,
            retry_backoff_ms: [50, 200, 800],
            external_retry_cap: 3,
            external_retry_budget: Duration::from_secs(2),
            max_value_size_bytes: crate::types::MAX_VALUE_SIZE_BYTES,
            max_tags: crate::types::MAX_TAGS,
            max_top_k: 100,
            max_candidates_k: 500,
            max_graph_hops: 6,
            allow_unauthenticated: true,
            default_user_id: "default_user".to_string(),
            default_deadline: Duration::from_secs(30),
        }
    }
}

impl CoreConfig {
    /// Resolve `~` and environment variables in `db_path`.
    pub fn resolved_db_path(&self) -> String {
        shellexpand::full(&self.db_path)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| self.db_path.clone())
    }
}

/// Command-line/env-var surface shared by the server and CLI binaries.
#[derive(clap::Parser, Debug, Clone)]
#[command(name = "umc")]
pub struct Args {
    #[arg(long, env = "UMC_DB_PATH", default_value = "~/.local/share/umc/memory.db")]
    pub db_path: String,

    #[arg(long, env = "UMC_RRF_K", default_value_t = 60.0)]
    pub rrf_k: f32,

    #[arg(long, env = "UMC_RECALL_TAU_DAYS", default_value_t = 30.0)]
    pub recall_tau_days: f32,

    #[arg(long, env = "UMC_MAX_SESSION_HOURS", default_value_t = 24)]
    pub max_session_duration_hours: i64,

    #[arg(long, env = "UMC_ALLOW_UNAUTHENTICATED", default_value_t = true)]
    pub allow_unauthenticated: bool,

    #[arg(long, env = "UMC_DEFAULT_USER", default_value = "default_user")]
    pub default_user_id: String,

    #[arg(long, env = "UMC_BIND_ADDR", default_value = "127.0.0.1:7801")]
    pub bind_addr: String,

    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "UMC_EMBEDDING_MODEL", default_value = "tfidf")]
    pub embedding_model: String,
}

impl From<Args> for CoreConfig {
    fn from(args: Args) -> Self {
        Self {
            db_path: args.db_path,
            rrf_k: args.rrf_k,
            recall_tau_days: args.recall_tau_days,
            max_session_duration_hours: args.max_session_duration_hours,
            allow_unauthenticated: args.allow_unauthenticated,
            default_user_id: args.default_user_id,
            ..CoreConfig::default()
        }
    }
}
