//! Pure retrieval-combination helpers shared by `MemoryManager::recall_hybrid`
//! (§4.5.2): Reciprocal Rank Fusion and the `Reranker` capability (C6).

mod rerank;

pub use rerank::{HeuristicReranker, LlmReranker, Reranker};

use std::collections::HashMap;

/// Reciprocal Rank Fusion (§4.5.2, P5): for every candidate appearing in
/// one or both of `vector` and `lexical` (each already rank-ordered,
/// best-first, 1-based), `RRF(d) = Σ 1/(k_rrf + rank_s(d))`.
///
/// Output is sorted by RRF score descending; ties broken by the order IDs
/// first appear in `vector` then `lexical`, which is stable and
/// deterministic (P5).
pub fn rrf_fusion(vector: &[(i64, f32)], lexical: &[(i64, f32)], k_rrf: f32) -> Vec<(i64, f32)> {
    let mut scores: HashMap<i64, f32> = HashMap::new();
    let mut first_seen: HashMap<i64, usize> = HashMap::new();
    let mut order = 0usize;

    for (rank, (id, _)) in vector.iter().enumerate() {
        *scores.entry(*id).or_insert(0.0) += 1.0 / (k_rrf + (rank + 1) as f32);
        first_seen.entry(*id).or_insert_with(|| {
            order += 1;
            order
        });
    }
    for (rank, (id, _)) in lexical.iter().enumerate() {
        *scores.entry(*id).or_insert(0.0) += 1.0 / (k_rrf + (rank + 1) as f32);
        first_seen.entry(*id).or_insert_with(|| {
            order += 1;
            order
        });
    }

    let mut ranked: Vec<(i64, f32)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| first_seen[&a.0].cmp(&first_seen[&b.0]))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rrf_scores_match_closed_form() {
        let vector = vec![(1, 0.9), (2, 0.8)];
        let lexical = vec![(2, 10.0), (1, 5.0)];
        let fused = rrf_fusion(&vector, &lexical, 60.0);
        let scores: HashMap<i64, f32> = fused.into_iter().collect();
        assert!((scores[&1] - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-6);
        assert!((scores[&2] - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-6);
    }

    #[test]
    fn candidate_in_only_one_list_still_scores() {
        let vector = vec![(1, 0.9)];
        let lexical: Vec<(i64, f32)> = vec![];
        let fused = rrf_fusion(&vector, &lexical, 60.0);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].0, 1);
    }

    #[test]
    fn empty_inputs_yield_empty_output() {
        assert!(rrf_fusion(&[], &[], 60.0).is_empty());
    }
}
