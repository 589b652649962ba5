//! Property-based tests for the Universal Memory Core's pure functions.
//!
//! These target invariants that must hold over arbitrary inputs rather
//! than fixed examples:
//! - Tokenization never panics, on any Unicode input.
//! - RRF fusion scores are bounded and deterministic under rank re-shuffling.
//! - Feedback adjustments always clamp importance into `[0, 1]`.
//! - `cache_key` is a deterministic, fixed-width digest.
//!
//! Run with: cargo test --test property_tests

use proptest::prelude::*;

mod common;

mod tokenizer_props {
    use super::*;
    use umc::storage::tokenize;

    proptest! {
        /// Invariant: the tokenizer never panics on arbitrary text, including
        /// empty strings, control characters, and surrogate-adjacent
        /// Unicode edge cases.
        #[test]
        fn never_panics(s in ".*") {
            let _ = tokenize(&s);
        }

        /// Invariant: every emitted token is lowercase (case-folding, §4.3).
        #[test]
        fn all_tokens_are_lowercase(s in "[A-Za-z ]{0,40}") {
            for tok in tokenize(&s) {
                prop_assert_eq!(tok.clone(), tok.to_lowercase());
            }
        }

        /// Invariant: tokenizing is deterministic — same input, same output.
        #[test]
        fn deterministic(s in ".{0,60}") {
            prop_assert_eq!(tokenize(&s), tokenize(&s));
        }
    }
}

mod content_hash_props {
    use super::*;
    use umc::types::{Memory, MemoryScope, MemoryValue};

    fn scope_strategy() -> impl Strategy<Value = MemoryScope> {
        prop_oneof![Just(MemoryScope::Working), Just(MemoryScope::Persistent)]
    }

    proptest! {
        /// Invariant (§3.1): the content hash depends only on value, tag
        /// *set*, and scope — permuting tags never changes it.
        #[test]
        fn hash_invariant_under_tag_permutation(
            text in ".{0,80}",
            mut tags in prop::collection::vec("[a-z]{1,8}", 0..6),
            scope in scope_strategy(),
        ) {
            let value = MemoryValue::Text(text);
            let original = Memory::compute_content_hash(&value, &tags, scope);
            tags.reverse();
            let reversed = Memory::compute_content_hash(&value, &tags, scope);
            prop_assert_eq!(original, reversed);
        }

        /// Invariant: changing the value text changes the hash (no
        /// degenerate collisions for short ASCII inputs in practice).
        #[test]
        fn distinct_values_hash_differently(a in "[a-z]{1,20}", b in "[a-z]{1,20}") {
            prop_assume!(a != b);
            let va = MemoryValue::Text(a);
            let vb = MemoryValue::Text(b);
            let ha = Memory::compute_content_hash(&va, &[], MemoryScope::Persistent);
            let hb = Memory::compute_content_hash(&vb, &[], MemoryScope::Persistent);
            prop_assert_ne!(ha, hb);
        }
    }
}

mod feedback_props {
    use super::*;
    use umc::types::FeedbackLabel;

    fn label_strategy() -> impl Strategy<Value = FeedbackLabel> {
        prop_oneof![
            Just(FeedbackLabel::Useful),
            Just(FeedbackLabel::Irrelevant),
            Just(FeedbackLabel::Outdated),
        ]
    }

    proptest! {
        /// Invariant (§4.7): applying a feedback delta and clamping always
        /// lands `importance` back in `[0, 1]`, for any starting importance
        /// and any weight in `[-1, 1]`.
        #[test]
        fn clamped_importance_always_in_unit_range(
            importance in 0.0f32..=1.0,
            weight in -1.0f32..=1.0,
            label in label_strategy(),
        ) {
            let updated = (importance + label.importance_delta(weight)).clamp(0.0, 1.0);
            prop_assert!((0.0..=1.0).contains(&updated));
        }
    }
}

mod rrf_props {
    use super::*;
    use umc::search::rrf_fusion;

    proptest! {
        /// Invariant (P5): every fused score is strictly positive and at
        /// most `2/(k_rrf+1)` (the maximum attainable when a candidate is
        /// rank 1 in both lists).
        #[test]
        fn scores_are_bounded(
            ids in prop::collection::vec(1i64..50, 1..10),
        ) {
            let vector: Vec<(i64, f32)> = ids.iter().enumerate().map(|(i, id)| (*id, 1.0 - i as f32 * 0.01)).collect();
            let lexical: Vec<(i64, f32)> = ids.iter().rev().enumerate().map(|(i, id)| (*id, 1.0 - i as f32 * 0.01)).collect();
            let fused = rrf_fusion(&vector, &lexical, 60.0);
            let max_score = 2.0 / 61.0;
            for (_, score) in &fused {
                prop_assert!(*score > 0.0);
                prop_assert!(*score <= max_score + 1e-6);
            }
        }

        /// Invariant: fusion never drops or invents candidates — the
        /// output id set is exactly the union of the two input id sets.
        #[test]
        fn output_ids_are_exactly_the_union(
            a in prop::collection::vec(1i64..20, 0..8),
            b in prop::collection::vec(1i64..20, 0..8),
        ) {
            let vector: Vec<(i64, f32)> = a.iter().map(|id| (*id, 1.0)).collect();
            let lexical: Vec<(i64, f32)> = b.iter().map(|id| (*id, 1.0)).collect();
            let fused = rrf_fusion(&vector, &lexical, 60.0);

            let mut expected: std::collections::HashSet<i64> = a.into_iter().collect();
            expected.extend(b);
            let actual: std::collections::HashSet<i64> = fused.into_iter().map(|(id, _)| id).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}

mod cache_key_props {
    use super::*;
    use umc::cache::cache_key;

    proptest! {
        /// Invariant (§4.9): `cache_key` is a deterministic 128-bit digest
        /// — 32 hex characters — for any prompt/model/params triple.
        #[test]
        fn key_is_deterministic_and_fixed_width(
            prompt in ".{0,50}",
            model in "[a-z0-9-]{1,20}",
            params in ".{0,30}",
        ) {
            let k1 = cache_key(&prompt, &model, &params);
            let k2 = cache_key(&prompt, &model, &params);
            prop_assert_eq!(&k1, &k2);
            prop_assert_eq!(k1.len(), 32);
            prop_assert!(k1.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}

mod refactor_order_props {
    use super::*;
    use crate::common::manager;
    use std::sync::Arc;
    use umc::coding_memory::CodingMemory;
    use umc::graph::GraphStore;
    use umc::llm::NullLlmService;

    fn coding_memory() -> CodingMemory {
        let graph = Arc::new(GraphStore::open(":memory:").unwrap());
        let mm = Arc::new(manager());
        CodingMemory::new(":memory:", graph, mm, Arc::new(NullLlmService), 24).unwrap()
    }

    proptest! {
        /// Invariant (§4.6.3): `suggest_refactor_order` always returns a
        /// permutation of its input file list, whether or not the induced
        /// subgraph has cycles.
        #[test]
        fn always_returns_a_permutation_of_input(
            n in 1usize..6,
        ) {
            let cm = coding_memory();
            let files: Vec<String> = (0..n).map(|i| format!("f{i}.rs")).collect();
            let order = cm.suggest_refactor_order(&files).unwrap();

            let mut sorted_input = files.clone();
            sorted_input.sort();
            let mut sorted_output = order.clone();
            sorted_output.sort();
            prop_assert_eq!(sorted_input, sorted_output);
        }
    }
}
