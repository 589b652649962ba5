//! Topic-node derivation (SPEC_FULL.md §B) — a lightweight stand-in for a
//! full entity-extraction subsystem, simplified from the teacher's
//! `intelligence/entity_extraction.rs` term-weighting heuristic. Gives
//! `RecallScorer`'s `graph_distance` term and `memory_get_user_pattern`
//! (§6.1) a concrete `topic` graph node (§3.1) to walk without building a
//! real NLP pipeline — reuses the BM25 tokenizer so there is exactly one
//! notion of "term" in the crate.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::storage::tokenize;

/// Common English function words excluded from topic weighting. Small and
/// deliberately not exhaustive — this is a heuristic, not a stopword
/// corpus.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "of", "to", "in", "on", "for", "and", "or",
    "but", "with", "that", "this", "it", "i", "you", "he", "she", "they", "we", "do", "does",
    "did", "what", "how", "why", "be", "have", "has", "had", "my", "your", "about",
];

/// The single highest-weighted non-stopword term in `text`, or `None` if
/// every token is a stopword (e.g. an all-function-word query).
pub fn top_term(text: &str) -> Option<String> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for token in tokenize(text) {
        if token.len() > 2 && !STOPWORDS.contains(&token.as_str()) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(term, _)| term)
}

/// Stable graph-node id for the topic derived from `text`'s top term.
/// `None` propagates `top_term`'s "nothing to derive" case.
pub fn topic_node_id(text: &str) -> Option<String> {
    top_term(text).map(|term| {
        let mut hasher = Sha256::new();
        hasher.update(term.as_bytes());
        format!("topic:{}", hex::encode(&hasher.finalize()[..8]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_most_frequent_non_stopword() {
        let term = top_term("what backend framework do I like, FastAPI or FastAPI again?");
        assert_eq!(term.as_deref(), Some("fastapi"));
    }

    #[test]
    fn all_stopwords_yields_none() {
        assert_eq!(top_term("what is the"), None);
    }

    #[test]
    fn topic_id_is_stable() {
        let a = topic_node_id("I prefer dark roast coffee");
        let b = topic_node_id("dark roast coffee is what I prefer");
        assert_eq!(a, b);
    }
}
