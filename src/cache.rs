//! CacheLayer (C11) — content-addressed cache for LLM prompts and
//! embeddings (§4.9).
//!
//! §9 calls out the source's process-wide `LLMCache` singleton as an
//! anti-pattern to design away: this models it as an explicit-lifecycle
//! object (`new`/`close`) that `MemoryManager` holds and dependency-injects
//! into, never a module-level global.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// `H(prompt, model, params)` truncated to 128 bits, hex-encoded (§4.9).
pub fn cache_key(prompt: &str, model: &str, params: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(b"\0");
    hasher.update(model.as_bytes());
    hasher.update(b"\0");
    hasher.update(params.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

struct Entry {
    value: String,
    created_at: Instant,
    ttl: Duration,
    last_touched: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) > self.ttl
    }
}

/// In-memory LRU-on-count, TTL-on-read cache (§4.9's default backend). An
/// external key-value backend would implement the same surface; this is
/// the only implementation carried since the spec treats the choice as an
/// interchangeable detail (§4.9 "interface is identical").
pub struct CacheLayer {
    entries: DashMap<String, Entry>,
    max_size: usize,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl CacheLayer {
    pub fn new(max_size: usize) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            max_size,
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        })
    }

    /// Lock-free read (§5); an expired entry is treated as a miss and
    /// removed lazily rather than via a background sweep.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.is_expired(now) {
                drop(entry);
                self.entries.remove(key);
                self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return None;
            }
            entry.last_touched = now;
            self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return Some(entry.value.clone());
        }
        self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        None
    }

    pub fn put(&self, key: String, value: String, ttl: Duration) {
        let now = Instant::now();
        self.entries.insert(
            key,
            Entry {
                value,
                created_at: now,
                ttl,
                last_touched: now,
            },
        );
        self.evict_if_over_capacity();
    }

    fn evict_if_over_capacity(&self) {
        if self.entries.len() <= self.max_size {
            return;
        }
        // Snapshot-and-sort LRU eviction: bounded contention on write per
        // §5, no correctness requirement beyond "a cache miss is always
        // safe" so a brief overshoot under concurrent writers is fine.
        let mut by_recency: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().last_touched))
            .collect();
        by_recency.sort_by_key(|(_, t)| *t);
        let overflow = self.entries.len().saturating_sub(self.max_size);
        for (key, _) in by_recency.into_iter().take(overflow) {
            self.entries.remove(&key);
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            hits: self.hits.load(std::sync::atomic::Ordering::Relaxed),
            misses: self.misses.load(std::sync::atomic::Ordering::Relaxed),
        }
    }

    /// Explicit lifecycle close (§9): drops all entries. A future external
    /// backend's `close()` would flush/disconnect here.
    pub fn close(&self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Stable hash of arbitrary serializable params, for callers building a
/// `cache_key` from a struct rather than a pre-formatted string.
pub fn hash_params<T: Hash>(params: &T) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    params.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// Convenience so call sites can build params from a `HashMap` without
/// pulling in a separate serialization step.
pub fn params_to_string(params: &HashMap<&str, String>) -> String {
    let mut keys: Vec<&&str> = params.keys().collect();
    keys.sort();
    keys.iter()
        .map(|k| format!("{k}={}", params[*k]))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let cache = CacheLayer::new(10);
        cache.put("k1".to_string(), "v1".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("k1"), Some("v1".to_string()));
    }

    #[test]
    fn miss_is_always_safe() {
        let cache = CacheLayer::new(10);
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let cache = CacheLayer::new(10);
        cache.put("k1".to_string(), "v1".to_string(), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("k1"), None);
    }

    #[test]
    fn evicts_lru_when_over_capacity() {
        let cache = CacheLayer::new(2);
        cache.put("a".to_string(), "1".to_string(), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(2));
        cache.put("b".to_string(), "2".to_string(), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(2));
        cache.put("c".to_string(), "3".to_string(), Duration::from_secs(60));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn cache_key_is_deterministic_and_sensitive_to_inputs() {
        let a = cache_key("prompt", "model", "{}");
        let b = cache_key("prompt", "model", "{}");
        let c = cache_key("prompt2", "model", "{}");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
