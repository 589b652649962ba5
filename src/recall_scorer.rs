//! RecallScorer (C9) — multi-signal blend over semantic similarity,
//! recency, access-frequency, graph distance, and importance (§4.7).
//!
//! Pure and non-suspending (§5): every input is already resolved by the
//! time `score` is called, so this module does no I/O of its own.

use chrono::{DateTime, Utc};

use crate::types::{Memory, ScorerWeights};

#[derive(Debug, Clone, Copy)]
pub struct ScorerConfig {
    pub tau_days: f32,
    pub freq_saturation: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            tau_days: 30.0,
            freq_saturation: 100.0,
        }
    }
}

pub struct RecallScorer {
    pub config: ScorerConfig,
}

impl RecallScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    /// `score(m, q) = w.sem*sim + w.rec*exp(-Δdays/τ) + w.freq*log(1+count)/log(1+sat)
    ///   + w.graph*1/(1+graph_distance) + w.imp*importance` (§4.7).
    ///
    /// `graph_distance` is `None` when the seed is disconnected or absent,
    /// contributing 0 to the graph term per the spec.
    pub fn score(
        &self,
        memory: &Memory,
        semantic_similarity: f32,
        graph_distance: Option<u32>,
        now: DateTime<Utc>,
        weights: &ScorerWeights,
    ) -> f32 {
        let delta_days = (now - memory.updated_at).num_seconds() as f32 / 86_400.0;
        let recency = (-delta_days.max(0.0) / self.config.tau_days).exp();

        let freq = ((1.0 + memory.access_count as f64).ln() / (1.0 + self.config.freq_saturation).ln()) as f32;

        let graph_term = match graph_distance {
            Some(d) => 1.0 / (1.0 + d as f32),
            None => 0.0,
        };

        weights.semantic * semantic_similarity.clamp(0.0, 1.0)
            + weights.recency * recency
            + weights.frequency * freq
            + weights.graph * graph_term
            + weights.importance * memory.importance
    }

    /// Tie-break per §4.5.2: higher importance > higher updated_at > lower
    /// key, lexicographically.
    pub fn tie_break(a: &Memory, b: &Memory) -> std::cmp::Ordering {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.key.cmp(&b.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemoryScope, MemoryValue};

    fn sample(importance: f32, access_count: i64, updated_at: DateTime<Utc>) -> Memory {
        let value = MemoryValue::Text("x".to_string());
        Memory {
            id: 1,
            user_id: "u1".to_string(),
            agent_name: "a".to_string(),
            key: "k".to_string(),
            value: value.clone(),
            scope: MemoryScope::Persistent,
            tags: vec![],
            importance,
            created_at: updated_at,
            updated_at,
            access_count,
            last_accessed_at: updated_at,
            embedding_ref: None,
            content_hash: Memory::compute_content_hash(&value, &[], MemoryScope::Persistent),
        }
    }

    #[test]
    fn higher_importance_yields_higher_score_all_else_equal() {
        let scorer = RecallScorer::new(ScorerConfig::default());
        let now = Utc::now();
        let weights = ScorerWeights::default();
        let low = sample(0.1, 5, now);
        let high = sample(0.9, 5, now);
        let s_low = scorer.score(&low, 0.5, None, now, &weights);
        let s_high = scorer.score(&high, 0.5, None, now, &weights);
        assert!(s_high > s_low);
    }

    #[test]
    fn recency_decays_with_age() {
        let scorer = RecallScorer::new(ScorerConfig::default());
        let now = Utc::now();
        let weights = ScorerWeights::default();
        let fresh = sample(0.5, 0, now);
        let stale = sample(0.5, 0, now - chrono::Duration::days(90));
        let s_fresh = scorer.score(&fresh, 0.0, None, now, &weights);
        let s_stale = scorer.score(&stale, 0.0, None, now, &weights);
        assert!(s_fresh > s_stale);
    }

    #[test]
    fn disconnected_graph_term_contributes_zero() {
        let scorer = RecallScorer::new(ScorerConfig::default());
        let now = Utc::now();
        let mut weights = ScorerWeights::default();
        weights.graph = 1.0;
        weights.semantic = 0.0;
        weights.recency = 0.0;
        weights.frequency = 0.0;
        weights.importance = 0.0;
        let m = sample(0.0, 0, now);
        assert_eq!(scorer.score(&m, 0.0, None, now, &weights), 0.0);
    }

    #[test]
    fn tie_break_prefers_importance_then_recency_then_key() {
        let now = Utc::now();
        let a = sample(0.8, 0, now);
        let mut b = sample(0.2, 0, now);
        b.key = "a".to_string();
        assert_eq!(RecallScorer::tie_break(&a, &b), std::cmp::Ordering::Less);
    }
}
