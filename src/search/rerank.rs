//! Reranker (C6) — cross-encoder-shaped rescoring of a small candidate set
//! (§4.5.2 step 5, §9 "cross-encoder reranking coupling": presented as a
//! capability implementations may omit entirely).

use crate::error::Result;
use crate::llm::LlmService;
use std::sync::Arc;

/// Rescores `candidates` (≤ 100, §4.5) against `query`, returning `(id,
/// score)` preserving input IDs; scores are monotonically comparable but
/// not on any fixed scale (§4.4).
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, candidates: &[(i64, String)]) -> Result<Vec<(i64, f32)>>;
}

/// Uses `LlmService::score_relevance` as a cross-encoder substitute — the
/// closest the core gets to an actual cross-encoder without depending on a
/// dedicated reranking model (§9).
pub struct LlmReranker {
    llm: Arc<dyn LlmService>,
}

impl LlmReranker {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self { llm }
    }
}

impl Reranker for LlmReranker {
    fn rerank(&self, query: &str, candidates: &[(i64, String)]) -> Result<Vec<(i64, f32)>> {
        let mut scored = Vec::with_capacity(candidates.len());
        for (id, text) in candidates {
            let score = self.llm.score_relevance(query, text)?;
            scored.push((*id, score));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored)
    }
}

/// Dependency-free fallback: term-overlap (Jaccard-ish) scoring. Used in
/// tests and when no `LlmService` is configured, so reranking can still be
/// exercised without a network call.
pub struct HeuristicReranker;

impl Reranker for HeuristicReranker {
    fn rerank(&self, query: &str, candidates: &[(i64, String)]) -> Result<Vec<(i64, f32)>> {
        let query_terms: std::collections::HashSet<String> = crate::storage::tokenize(query).into_iter().collect();
        let mut scored: Vec<(i64, f32)> = candidates
            .iter()
            .map(|(id, text)| {
                let doc_terms: std::collections::HashSet<String> = crate::storage::tokenize(text).into_iter().collect();
                let overlap = query_terms.intersection(&doc_terms).count() as f32;
                let union = query_terms.union(&doc_terms).count().max(1) as f32;
                (*id, overlap / union)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_reranker_prefers_overlapping_terms() {
        let reranker = HeuristicReranker;
        let candidates = vec![
            (1, "SnapDish is a photo app".to_string()),
            (2, "the weather today is sunny".to_string()),
        ];
        let ranked = reranker.rerank("SnapDish photo", &candidates).unwrap();
        assert_eq!(ranked[0].0, 1);
    }

    #[test]
    fn llm_reranker_uses_relevance_scores() {
        let reranker = LlmReranker::new(Arc::new(crate::llm::NullLlmService));
        let candidates = vec![(1, "a".to_string()), (2, "b".to_string())];
        let ranked = reranker.rerank("q", &candidates).unwrap();
        assert_eq!(ranked.len(), 2);
    }
}
