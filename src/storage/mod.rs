//! KVStore (C3) — durable mapping `(user_id, agent_name, key) -> Memory` (§4.1).

mod lexical;
mod migrations;
mod sqlite;
mod vector;

pub use lexical::{tokenize, LexicalFilter, LexicalIndex, SqliteLexicalIndex};
pub use migrations::{migrate, SCHEMA_VERSION};
pub use sqlite::SqliteKvStore;
pub use vector::{SqliteVectorIndex, VectorFilter, VectorIndex, VectorMetadata};

use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::types::{ListFilter, Memory, MemoryScope};

/// Statistics about the KV store backend, surfaced on `/api/v1/metrics`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    pub memory_count: i64,
    pub partition_count: i64,
    pub db_size_bytes: Option<i64>,
}

/// Health status of the KV store, surfaced on `/api/v1/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency_ms: f64,
    pub error: Option<String>,
}

/// Durable mapping `(user_id, agent_name, key) -> Memory` (C3, §4.1).
///
/// Implementations must retry transient failures up to 3x with exponential
/// backoff (50/200/800ms) before surfacing `CoreError::StoreUnavailable`
/// (§4.1's failure mode); see `crate::memory_manager::with_retry`.
pub trait KvStore: Send + Sync {
    /// Idempotent upsert. Updates `updated_at`; never decreases `access_count`.
    fn put(&self, memory: &Memory) -> Result<Memory>;

    fn get(&self, user_id: &str, agent_name: &str, key: &str) -> Result<Option<Memory>>;

    fn get_by_id(&self, id: i64) -> Result<Option<Memory>>;

    /// Find an existing persistent memory with the same `(user_id,
    /// agent_name, content_hash)`, used by the dedup path (§4.5.3).
    fn find_by_content_hash(
        &self,
        user_id: &str,
        agent_name: &str,
        content_hash: &str,
    ) -> Result<Option<Memory>>;

    /// Removes the KV row (and any legacy embedding row). `MemoryManager`
    /// is responsible for cascading the delete to the vector/lexical
    /// indexes (I2) since those live behind separate trait objects with no
    /// shared transaction. Returns `true` if a row existed and was removed.
    fn delete(&self, user_id: &str, agent_name: &str, key: &str) -> Result<bool>;

    fn delete_by_id(&self, id: i64) -> Result<bool>;

    /// Returned ordered by `updated_at desc` (§4.1).
    fn scan(&self, user_id: &str, agent_name: Option<&str>, filter: &ListFilter) -> Result<Vec<Memory>>;

    /// Atomic increment of `access_count` + `last_accessed_at` (§4.1).
    fn bump_access(&self, id: i64) -> Result<()>;

    /// Update cumulative importance in place (feedback loop, §4.7).
    fn set_importance(&self, id: i64, importance: f32) -> Result<()>;

    fn count(&self) -> Result<i64>;

    fn health_check(&self) -> Result<HealthStatus>;

    fn stats(&self) -> Result<StorageStats>;

    /// All persistent memories, for export (§6.3) and index rebuilds.
    fn all(&self) -> Result<Vec<Memory>>;
}

/// Working-memory (in-process, non-durable) store keyed the same way as
/// persistent memory (§3.1, §4.5.4). Not an external trait since there is
/// exactly one implementation and it never touches disk.
#[derive(Default)]
pub struct WorkingMemoryStore {
    inner: parking_lot::RwLock<HashMap<(String, String, String), Memory>>,
}

impl WorkingMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, memory: Memory) {
        let key = (memory.user_id.clone(), memory.agent_name.clone(), memory.key.clone());
        self.inner.write().insert(key, memory);
    }

    pub fn get(&self, user_id: &str, agent_name: &str, key: &str) -> Option<Memory> {
        self.inner
            .read()
            .get(&(user_id.to_string(), agent_name.to_string(), key.to_string()))
            .cloned()
    }

    pub fn delete(&self, user_id: &str, agent_name: &str, key: &str) -> bool {
        self.inner
            .write()
            .remove(&(user_id.to_string(), agent_name.to_string(), key.to_string()))
            .is_some()
    }

    pub fn scan(&self, user_id: &str, agent_name: Option<&str>, filter: &ListFilter) -> Vec<Memory> {
        let mut out: Vec<Memory> = self
            .inner
            .read()
            .values()
            .filter(|m| m.user_id == user_id && m.scope == MemoryScope::Working)
            .filter(|m| agent_name.map(|a| m.agent_name == a).unwrap_or(true))
            .filter(|m| {
                filter
                    .tags
                    .as_ref()
                    .map(|tags| tags.iter().all(|t| m.tags.contains(t)))
                    .unwrap_or(true)
            })
            .filter(|m| filter.since.map(|s| m.updated_at >= s).unwrap_or(true))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let limit = if filter.limit == 0 { out.len() } else { filter.limit };
        out.truncate(limit);
        out
    }

    /// Snapshot for `save_session` (§3.3, §4.5.4).
    pub fn snapshot(&self, user_id: &str, agent_name: &str) -> HashMap<String, Memory> {
        self.inner
            .read()
            .iter()
            .filter(|((u, a, _), _)| u == user_id && a == agent_name)
            .map(|((_, _, k), m)| (k.clone(), m.clone()))
            .collect()
    }

    pub fn restore(&self, snapshot: HashMap<String, Memory>) {
        let mut guard = self.inner.write();
        for (_, memory) in snapshot {
            let key = (memory.user_id.clone(), memory.agent_name.clone(), memory.key.clone());
            guard.insert(key, memory);
        }
    }
}
