//! MemoryManager (C7) — the core orchestrator (§4.5). Unifies the working
//! and persistent tiers, drives the hybrid-recall pipeline over
//! `VectorIndex`/`LexicalIndex`/`Reranker`/`RecallScorer`, and owns the
//! dedup + atomic-publish write path (§4.5.3).

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::warn;

use crate::cache::CacheLayer;
use crate::config::CoreConfig;
use crate::embedder::Embedder;
use crate::error::{CoreError, Result};
use crate::graph::GraphStore;
use crate::llm::LlmService;
use crate::recall_scorer::{RecallScorer, ScorerConfig};
use crate::search::{rrf_fusion, Reranker};
use crate::storage::{
    KvStore, LexicalFilter, LexicalIndex, StorageStats, VectorFilter, VectorIndex, VectorMetadata,
    WorkingMemoryStore,
};
use crate::topic;
use crate::types::{
    FeedbackLabel, ListFilter, ListedMemory, Memory, MemorySpec, MemoryValue, NodeType, RecallOptions,
    RelType, ScopeFilter, ScoredMemory, Session,
};

/// Retries a fallible `KvStore` call per §4.1's schedule (50/200/800ms, 3
/// attempts) while the error is transient; surfaces `StoreUnavailable`
/// once attempts are exhausted. Pure-Rust home for the retry policy the
/// trait doc comment on `storage::KvStore` refers callers to.
pub fn with_retry<T>(config: &CoreConfig, mut f: impl FnMut() -> Result<T>) -> Result<T> {
    let mut last_err = None;
    for (attempt, delay_ms) in std::iter::once(0).chain(config.retry_backoff_ms).enumerate() {
        if attempt > 0 {
            std::thread::sleep(std::time::Duration::from_millis(delay_ms));
        }
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < config.external_retry_cap as usize => {
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(CoreError::StoreUnavailable(
        last_err.map(|e| e.to_string()).unwrap_or_else(|| "retries exhausted".into()),
    ))
}

fn graph_node_id(memory_id: i64) -> String {
    format!("memory:{memory_id}")
}

fn user_node_id(user_id: &str) -> String {
    format!("user:{user_id}")
}

pub struct MemoryManager {
    config: CoreConfig,
    kv: Arc<dyn KvStore>,
    working: WorkingMemoryStore,
    working_id_seq: AtomicI64,
    vector: Arc<dyn VectorIndex>,
    lexical: Arc<dyn LexicalIndex>,
    graph: Arc<GraphStore>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LlmService>,
    reranker: Option<Arc<dyn Reranker>>,
    scorer: RecallScorer,
    cache: Arc<CacheLayer>,
    sessions: DashMap<(String, String, String), Vec<crate::types::Message>>,
}

impl MemoryManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: CoreConfig,
        kv: Arc<dyn KvStore>,
        vector: Arc<dyn VectorIndex>,
        lexical: Arc<dyn LexicalIndex>,
        graph: Arc<GraphStore>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LlmService>,
        reranker: Option<Arc<dyn Reranker>>,
        cache: Arc<CacheLayer>,
    ) -> Self {
        let scorer = RecallScorer::new(ScorerConfig {
            tau_days: config.recall_tau_days,
            freq_saturation: config.recall_freq_saturation,
        });
        Self {
            config,
            kv,
            working: WorkingMemoryStore::new(),
            working_id_seq: AtomicI64::new(-1),
            vector,
            lexical,
            graph,
            embedder,
            llm,
            reranker,
            scorer,
            cache,
            sessions: DashMap::new(),
        }
    }

    /// All-in-memory wiring for tests outside this module (e.g.
    /// `coding_memory`'s own test suite) that need a working `MemoryManager`
    /// without a real database file.
    #[cfg(test)]
    pub fn for_testing() -> Self {
        let config = CoreConfig {
            db_path: ":memory:".to_string(),
            ..CoreConfig::default()
        };
        let kv: Arc<dyn KvStore> = Arc::new(crate::storage::SqliteKvStore::open_in_memory().unwrap());
        let vector: Arc<dyn VectorIndex> =
            Arc::new(crate::storage::SqliteVectorIndex::open(":memory:", "local-hash-v1", 64).unwrap());
        let lexical: Arc<dyn LexicalIndex> = Arc::new(crate::storage::SqliteLexicalIndex::open(":memory:").unwrap());
        let graph = Arc::new(GraphStore::open(":memory:").unwrap());
        let embedder: Arc<dyn Embedder> = Arc::new(crate::embedder::LocalHashEmbedder::new(64));
        let llm: Arc<dyn LlmService> = Arc::new(crate::llm::NullLlmService);
        let reranker: Option<Arc<dyn Reranker>> = Some(Arc::new(crate::search::HeuristicReranker));
        let cache = CacheLayer::new(100);
        Self::new(config, kv, vector, lexical, graph, embedder, llm, reranker, cache)
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    pub fn llm(&self) -> &Arc<dyn LlmService> {
        &self.llm
    }

    fn ensure_user_node(&self, user_id: &str) -> Result<()> {
        self.graph
            .add_node(&user_node_id(user_id), NodeType::User, serde_json::json!({ "user_id": user_id }))
    }

    fn validate_spec(&self, spec: &MemorySpec) -> Result<()> {
        if spec.value.serialized_len() > self.config.max_value_size_bytes {
            return Err(CoreError::BadRequest(format!(
                "value exceeds max size of {} bytes",
                self.config.max_value_size_bytes
            )));
        }
        if spec.tags.len() > self.config.max_tags {
            return Err(CoreError::BadRequest(format!(
                "tag cardinality exceeds max of {}",
                self.config.max_tags
            )));
        }
        if !(0.0..=1.0).contains(&spec.importance) {
            return Err(CoreError::BadRequest("importance must be in [0, 1]".into()));
        }
        Ok(())
    }

    /// `remember` (§4.5.1, §4.5.3): dedup by content hash, then publish to
    /// KVStore/VectorIndex/LexicalIndex. A memory is visible to readers
    /// only once all three upserts succeed; a failure in the vector or
    /// lexical step rolls back the staged KV row (the "staging+publish
    /// discipline" §4.5.3 calls for).
    pub fn remember(&self, spec: MemorySpec) -> Result<Memory> {
        self.validate_spec(&spec)?;
        let now = Utc::now();
        let content_hash = Memory::compute_content_hash(&spec.value, &spec.tags, spec.scope);

        if spec.scope == crate::types::MemoryScope::Working {
            let id = self.working_id_seq.fetch_sub(1, AtomicOrdering::SeqCst);
            let key = spec.key.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let memory = Memory {
                id,
                user_id: spec.user_id,
                agent_name: spec.agent_name,
                key,
                value: spec.value,
                scope: spec.scope,
                tags: spec.tags,
                importance: spec.importance,
                created_at: now,
                updated_at: now,
                access_count: 0,
                last_accessed_at: now,
                embedding_ref: None,
                content_hash,
            };
            self.working.put(memory.clone());
            return Ok(memory);
        }

        // Dedup (§4.5.3): a same-partition, same-content-hash row is
        // treated as an update — tags merge (union), importance takes the
        // max, and the existing key/id are kept so callers that
        // auto-generated a key on the first call don't fork a duplicate
        // row on the second.
        let existing = with_retry(&self.config, || {
            self.kv.find_by_content_hash(&spec.user_id, &spec.agent_name, &content_hash)
        })?;

        let (key, mut merged_tags, importance, prior) = if let Some(existing) = &existing {
            let mut tags = existing.tags.clone();
            for t in &spec.tags {
                if !tags.contains(t) {
                    tags.push(t.clone());
                }
            }
            (
                existing.key.clone(),
                tags,
                spec.importance.max(existing.importance),
                Some(existing.clone()),
            )
        } else {
            (
                spec.key.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                spec.tags.clone(),
                spec.importance,
                None,
            )
        };
        merged_tags.truncate(self.config.max_tags);

        let staged = Memory {
            id: prior.as_ref().map(|m| m.id).unwrap_or(0),
            user_id: spec.user_id.clone(),
            agent_name: spec.agent_name.clone(),
            key,
            value: spec.value,
            scope: spec.scope,
            tags: merged_tags,
            importance,
            created_at: prior.as_ref().map(|m| m.created_at).unwrap_or(now),
            updated_at: now,
            access_count: prior.as_ref().map(|m| m.access_count).unwrap_or(0),
            last_accessed_at: prior.as_ref().map(|m| m.last_accessed_at).unwrap_or(now),
            embedding_ref: None,
            content_hash,
        };

        let stored = with_retry(&self.config, || self.kv.put(&staged))?;

        if let Err(e) = self.publish_indexes(&stored) {
            // Roll back the staged row so a failed publish never leaves a
            // memory visible without its indexes (I2).
            let _ = self.kv.delete_by_id(stored.id);
            return Err(e);
        }

        let mut published = stored.clone();
        published.embedding_ref = Some(stored.id);
        let published = with_retry(&self.config, || self.kv.put(&published))?;

        self.ensure_user_node(&published.user_id)?;
        self.graph.add_node(
            &graph_node_id(published.id),
            NodeType::Memory,
            serde_json::json!({ "key": published.key }),
        )?;
        if let Some(topic_id) = topic::topic_node_id(&published.value.as_text()) {
            self.graph.add_node(&topic_id, NodeType::Topic, serde_json::json!({}))?;
            self.graph
                .add_edge(
                    &graph_node_id(published.id),
                    &topic_id,
                    RelType::RelatedTo,
                    None,
                    None,
                    None,
                    Some("topic_derivation".into()),
                    None,
                )
                .ok();
        }

        Ok(published)
    }

    fn publish_indexes(&self, memory: &Memory) -> Result<()> {
        let text = memory.value.as_text();
        let vector = self.embedder.embed_passage(&text)?;
        self.vector.upsert(
            memory.id,
            &vector,
            &VectorMetadata {
                user_id: memory.user_id.clone(),
                agent_name: memory.agent_name.clone(),
                scope: memory.scope,
                tags: memory.tags.clone(),
            },
        )?;
        self.lexical.upsert(memory.id, &text, &memory.user_id, &memory.agent_name)?;
        Ok(())
    }

    pub fn recall_by_key(
        &self,
        user_id: &str,
        agent_name: &str,
        scope: ScopeFilter,
        key: &str,
    ) -> Result<Option<Memory>> {
        match scope {
            ScopeFilter::Working => Ok(self.working.get(user_id, agent_name, key)),
            ScopeFilter::Persistent => with_retry(&self.config, || self.kv.get(user_id, agent_name, key)),
            ScopeFilter::All => {
                if let Some(m) = with_retry(&self.config, || self.kv.get(user_id, agent_name, key))? {
                    return Ok(Some(m));
                }
                Ok(self.working.get(user_id, agent_name, key))
            }
        }
    }

    /// `recall_semantic` (§4.5.1): vector-only recall, scored by
    /// `RecallScorer` but without the lexical/RRF leg of hybrid recall.
    pub fn recall_semantic(
        &self,
        user_id: &str,
        agent_name: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredMemory>> {
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let candidates_k = RecallOptions::derive_candidates_k(top_k).min(self.config.max_candidates_k);
        let filter = VectorFilter {
            user_id: Some(user_id.to_string()),
            agent_name: Some(agent_name.to_string()),
            tags: None,
        };
        let query_vec = match self.embedder.embed_query(query) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "embedder failed during recall_semantic; returning empty result");
                return Ok(Vec::new());
            }
        };
        let hits = self.vector.search(&query_vec, candidates_k, &filter)?;
        let sims: HashMap<i64, f32> = hits.iter().cloned().collect();
        self.score_and_rank(user_id, query, hits.into_iter().map(|(id, _)| id).collect(), &sims, top_k, None)
    }

    /// `recall_hybrid` (§4.5.2): vector + lexical candidate retrieval,
    /// RRF fusion, optional reranking, then `RecallScorer` for the final
    /// ordering. Degrades gracefully per §7: an embedder failure falls
    /// back to lexical-only; a reranker failure keeps the fused ordering.
    pub fn recall_hybrid(&self, user_id: &str, agent_name: &str, query: &str, opts: &RecallOptions) -> Result<Vec<ScoredMemory>> {
        if query.is_empty() || opts.top_k == 0 {
            return Ok(Vec::new());
        }
        let candidates_k = opts.candidates_k.min(self.config.max_candidates_k);
        let top_k = opts.top_k.min(self.config.max_top_k);

        let vector_filter = VectorFilter {
            user_id: Some(user_id.to_string()),
            agent_name: Some(agent_name.to_string()),
            tags: None,
        };
        let lexical_filter = LexicalFilter {
            user_id: Some(user_id.to_string()),
            agent_name: Some(agent_name.to_string()),
            tags: None,
        };

        let vector_hits = match self.embedder.embed_query(query) {
            Ok(v) => self.vector.search(&v, candidates_k, &vector_filter).unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "embedder failed during recall_hybrid; degrading to lexical-only");
                Vec::new()
            }
        };
        let lexical_hits = self.lexical.search(query, candidates_k, &lexical_filter)?;

        if vector_hits.is_empty() && lexical_hits.is_empty() {
            return Ok(Vec::new());
        }

        let sims: HashMap<i64, f32> = vector_hits.iter().cloned().collect();
        let mut fused = rrf_fusion(&vector_hits, &lexical_hits, opts.rrf_k);
        fused.truncate(candidates_k);

        let ordered_ids: Vec<i64> = if opts.rerank_enabled {
            if let Some(reranker) = &self.reranker {
                let mut texts = Vec::with_capacity(fused.len());
                for (id, _) in &fused {
                    if let Some(m) = self.kv.get_by_id(*id)? {
                        texts.push((*id, m.value.as_text()));
                    }
                }
                match reranker.rerank(query, &texts) {
                    Ok(reranked) => reranked.into_iter().map(|(id, _)| id).collect(),
                    Err(e) => {
                        warn!(error = %e, "reranker failed; keeping fused ordering");
                        fused.into_iter().map(|(id, _)| id).collect()
                    }
                }
            } else {
                fused.into_iter().map(|(id, _)| id).collect()
            }
        } else {
            fused.into_iter().map(|(id, _)| id).collect()
        };

        self.score_and_rank(user_id, query, ordered_ids, &sims, top_k, Some(opts.scorer_weights))
    }

    fn score_and_rank(
        &self,
        user_id: &str,
        query: &str,
        ids: Vec<i64>,
        sims: &HashMap<i64, f32>,
        top_k: usize,
        weights: Option<crate::types::ScorerWeights>,
    ) -> Result<Vec<ScoredMemory>> {
        let weights = weights.unwrap_or(self.config.default_scorer_weights);
        let now = Utc::now();
        let user_seed = user_node_id(user_id);
        let topic_seed = topic::topic_node_id(query);

        let mut scored = Vec::with_capacity(ids.len());
        for id in &ids {
            let memory = match self.kv.get_by_id(*id)? {
                Some(m) => m,
                None => continue,
            };
            let sim = sims.get(id).copied().unwrap_or(0.0);
            let node = graph_node_id(*id);
            let dist_user = self.graph.shortest_path_len(&user_seed, &node, self.config.max_graph_hops).unwrap_or(None);
            let dist_topic = topic_seed
                .as_ref()
                .and_then(|t| self.graph.shortest_path_len(t, &node, self.config.max_graph_hops).unwrap_or(None));
            let graph_distance = match (dist_user, dist_topic) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            };
            let score = self.scorer.score(&memory, sim, graph_distance, now, &weights);
            scored.push(ScoredMemory {
                memory,
                score,
                semantic_score: sims.get(id).copied(),
                lexical_score: None,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| RecallScorer::tie_break(&a.memory, &b.memory))
        });
        scored.truncate(top_k);

        // Side effect (§4.5.2 step 7): bump access for every returned id.
        for s in &scored {
            with_retry(&self.config, || self.kv.bump_access(s.memory.id)).ok();
        }

        Ok(scored)
    }

    /// `search_text` (§4.5.1, §9 open question): "contains substring,
    /// case-insensitive" per the source ambiguity note, with a
    /// Levenshtein near-miss fallback (SPEC_FULL.md §B) when the
    /// substring search returns nothing.
    pub fn search_text(&self, user_id: &str, agent_name: &str, pattern: &str, limit: usize) -> Result<Vec<Memory>> {
        if pattern.is_empty() {
            return Ok(Vec::new());
        }
        let all = with_retry(&self.config, || {
            self.kv.scan(user_id, Some(agent_name), &ListFilter::default())
        })?;
        let needle = pattern.to_lowercase();
        let mut exact: Vec<Memory> = all
            .iter()
            .filter(|m| m.value.as_text().to_lowercase().contains(&needle))
            .cloned()
            .collect();

        if exact.is_empty() {
            // Near-miss fallback: smallest Levenshtein distance between the
            // pattern and any whitespace-delimited word in the memory's
            // text, kept only when "close enough" (<= 2 edits or 30% of
            // the pattern's length, whichever is larger).
            let threshold = (pattern.len() as f64 * 0.3).ceil().max(2.0) as usize;
            let mut scored: Vec<(usize, Memory)> = all
                .into_iter()
                .filter_map(|m| {
                    let best = m
                        .value
                        .as_text()
                        .split_whitespace()
                        .map(|w| levenshtein::levenshtein(&w.to_lowercase(), &needle))
                        .min()
                        .unwrap_or(usize::MAX);
                    (best <= threshold).then_some((best, m))
                })
                .collect();
            scored.sort_by_key(|(d, _)| *d);
            exact = scored.into_iter().map(|(_, m)| m).collect();
        }

        if limit > 0 {
            exact.truncate(limit);
        }
        Ok(exact)
    }

    pub fn list(&self, user_id: &str, scope: ScopeFilter, filter: &ListFilter) -> Result<Vec<ListedMemory>> {
        let mut out = Vec::new();
        if matches!(scope, ScopeFilter::Persistent | ScopeFilter::All) {
            let rows = with_retry(&self.config, || self.kv.scan(user_id, filter.agent_name.as_deref(), filter))?;
            out.extend(rows.into_iter().map(|memory| ListedMemory {
                memory,
                origin: crate::types::MemoryScope::Persistent,
            }));
        }
        if matches!(scope, ScopeFilter::Working | ScopeFilter::All) {
            let rows = self.working.scan(user_id, filter.agent_name.as_deref(), filter);
            out.extend(rows.into_iter().map(|memory| ListedMemory {
                memory,
                origin: crate::types::MemoryScope::Working,
            }));
        }
        out.sort_by(|a, b| b.memory.updated_at.cmp(&a.memory.updated_at));
        if filter.limit > 0 {
            out.truncate(filter.limit);
        }
        Ok(out)
    }

    /// `forget` (§4.5.1, I2): cascades to `VectorIndex`/`LexicalIndex` so
    /// no dangling index entry survives a deleted memory.
    pub fn forget(&self, user_id: &str, agent_name: &str, scope: ScopeFilter, key: &str) -> Result<bool> {
        match scope {
            ScopeFilter::Working => Ok(self.working.delete(user_id, agent_name, key)),
            ScopeFilter::Persistent => self.forget_persistent(user_id, agent_name, key),
            ScopeFilter::All => {
                let persistent = self.forget_persistent(user_id, agent_name, key)?;
                let working = self.working.delete(user_id, agent_name, key);
                Ok(persistent || working)
            }
        }
    }

    fn forget_persistent(&self, user_id: &str, agent_name: &str, key: &str) -> Result<bool> {
        let existing = with_retry(&self.config, || self.kv.get(user_id, agent_name, key))?;
        let id = match &existing {
            Some(m) => m.id,
            None => return Ok(false),
        };
        let deleted = with_retry(&self.config, || self.kv.delete(user_id, agent_name, key))?;
        if deleted {
            self.vector.delete(id)?;
            self.lexical.delete(id)?;
        }
        Ok(deleted)
    }

    /// `feedback` (§4.5.1, §4.7): cumulative importance adjustment,
    /// clamped to `[0, 1]`.
    pub fn feedback(&self, id: i64, label: FeedbackLabel, weight: f32) -> Result<()> {
        let memory = self
            .kv
            .get_by_id(id)?
            .ok_or_else(|| CoreError::NotFound(format!("memory {id}")))?;
        let new_importance = (memory.importance + label.importance_delta(weight)).clamp(0.0, 1.0);
        with_retry(&self.config, || self.kv.set_importance(id, new_importance))
    }

    /// `save_session` (§4.5.1, §3.3): materializes the working-memory
    /// snapshot and message log as a persistent memory, keyed so
    /// `load_session` can find it again.
    pub fn save_session(&self, user_id: &str, agent_name: &str, session_name: &str) -> Result<()> {
        let messages = self
            .sessions
            .get(&(user_id.to_string(), agent_name.to_string(), session_name.to_string()))
            .map(|v| v.clone())
            .unwrap_or_default();
        let session = Session {
            session_name: session_name.to_string(),
            messages,
            working_snapshot: self.working.snapshot(user_id, agent_name),
        };
        let value = MemoryValue::Json(serde_json::to_value(&session)?);
        self.remember(MemorySpec {
            user_id: user_id.to_string(),
            agent_name: agent_name.to_string(),
            key: Some(session_key(session_name)),
            value,
            scope: crate::types::MemoryScope::Persistent,
            tags: vec!["__session__".to_string()],
            importance: 0.0,
        })?;
        Ok(())
    }

    /// `load_session` (§4.5.1): restores the working-memory snapshot and
    /// message log. Returns `false` if no session with that name exists.
    pub fn load_session(&self, user_id: &str, agent_name: &str, session_name: &str) -> Result<bool> {
        let memory = with_retry(&self.config, || {
            self.kv.get(user_id, agent_name, &session_key(session_name))
        })?;
        let memory = match memory {
            Some(m) => m,
            None => return Ok(false),
        };
        let session: Session = match &memory.value {
            MemoryValue::Json(v) => serde_json::from_value(v.clone())?,
            _ => return Err(CoreError::Internal("session memory has non-json payload".into())),
        };
        self.working.restore(session.working_snapshot);
        self.sessions.insert(
            (user_id.to_string(), agent_name.to_string(), session_name.to_string()),
            session.messages,
        );
        Ok(true)
    }

    pub fn add_message(&self, user_id: &str, agent_name: &str, session_name: &str, message: crate::types::Message) {
        self.sessions
            .entry((user_id.to_string(), agent_name.to_string(), session_name.to_string()))
            .or_default()
            .push(message);
    }

    /// `prune` (§4.5.1): deletes persistent memories for `user_id` whose
    /// `updated_at` is older than `older_than_days`. §9's open question
    /// about a `prune`/`feedback` race is left unresolved in the source;
    /// this implementation applies no extra locking beyond each delete's
    /// own atomicity, so a `feedback` racing a `prune` on the same memory
    /// either lands before the delete (lost) or after (errors `NotFound`
    /// on the next read) — both are acceptable per the open question.
    pub fn prune(&self, user_id: &str, older_than_days: i64) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(older_than_days);
        let all = with_retry(&self.config, || self.kv.scan(user_id, None, &ListFilter::default()))?;
        let mut deleted = 0usize;
        for memory in all.into_iter().filter(|m| m.updated_at < cutoff) {
            if self.forget_persistent(&memory.user_id, &memory.agent_name, &memory.key)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// `memory_record_interaction` (§6.1): derives a topic node from
    /// `query`, creates an `interaction` node, and links
    /// `user --related_to--> interaction --related_to--> topic`.
    pub fn record_interaction(&self, user_id: &str, query: &str, response: &str, metadata: serde_json::Value) -> Result<String> {
        self.ensure_user_node(user_id)?;
        let interaction_id = format!("interaction:{}", uuid::Uuid::new_v4());
        self.graph.add_node(
            &interaction_id,
            NodeType::Interaction,
            serde_json::json!({ "query": query, "response": response, "metadata": metadata }),
        )?;
        self.graph
            .add_edge(&user_node_id(user_id), &interaction_id, RelType::RelatedTo, None, None, None, None, None)?;
        if let Some(topic_id) = topic::topic_node_id(query) {
            self.graph.add_node(&topic_id, NodeType::Topic, serde_json::json!({}))?;
            self.graph
                .add_edge(&interaction_id, &topic_id, RelType::RelatedTo, None, None, None, None, None)?;
        }
        Ok(interaction_id)
    }

    /// `memory_get_related` (§6.1): thin pass-through to `GraphStore::query_graph`.
    pub fn get_related(
        &self,
        seed_ids: &[String],
        hops: u32,
        rel_filter: Option<&[RelType]>,
    ) -> Result<crate::graph::Subgraph> {
        let hops = hops.min(self.config.max_graph_hops);
        self.graph.query_graph(seed_ids, hops, rel_filter, Utc::now())
    }

    /// `memory_get_user_pattern` (§6.1): a small aggregation over the
    /// user's 2-hop neighborhood — interaction count and the topics they
    /// most frequently touch, ranked by edge count.
    pub fn get_user_pattern(&self, user_id: &str) -> Result<UserPattern> {
        let subgraph = self.get_related(&[user_node_id(user_id)], 2, None)?;
        let interaction_count = subgraph.nodes.iter().filter(|n| n.node_type == NodeType::Interaction).count();
        let mut topic_counts: HashMap<String, u32> = HashMap::new();
        for edge in &subgraph.edges {
            if let Some(node) = subgraph.nodes.iter().find(|n| n.id == edge.dst && n.node_type == NodeType::Topic) {
                *topic_counts.entry(node.id.clone()).or_insert(0) += 1;
            }
        }
        let mut top_topics: Vec<(String, u32)> = topic_counts.into_iter().collect();
        top_topics.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(UserPattern {
            interaction_count,
            top_topics,
        })
    }

    pub fn memory_stats(&self, user_id: &str) -> Result<MemoryStats> {
        let storage_stats = with_retry(&self.config, || self.kv.stats())?;
        let cache_stats = self.cache.stats();
        let working_count = self.working.scan(user_id, None, &ListFilter::default()).len();
        Ok(MemoryStats {
            storage: storage_stats,
            working_count,
            cache_hits: cache_stats.hits,
            cache_misses: cache_stats.misses,
        })
    }

    /// Surfaced on `/api/v1/health` (§6.2) — delegates to the `KvStore`
    /// backend, the one component whose unavailability the whole core
    /// depends on.
    pub fn health_check(&self) -> Result<crate::storage::HealthStatus> {
        self.kv.health_check()
    }
}

fn session_key(session_name: &str) -> String {
    format!("__session__:{session_name}")
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UserPattern {
    pub interaction_count: usize,
    pub top_topics: Vec<(String, u32)>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MemoryStats {
    pub storage: StorageStats,
    pub working_count: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}
