//! Golden tests — lock down exact, spec-mandated output values so a
//! regression in a scoring formula or threshold is caught immediately
//! rather than drifting silently.
//!
//! Run with: cargo test --test golden_tests

mod common;

mod rrf_golden {
    use umc::search::rrf_fusion;

    /// §4.5.2: `RRF(d) = sum 1/(k_rrf + rank)`, 1-based ranks, `k_rrf = 60`.
    #[test]
    fn exact_rrf_scores_for_known_rankings() {
        let vector = vec![(10, 0.95), (20, 0.80), (30, 0.40)];
        let lexical = vec![(20, 9.0), (30, 7.0), (10, 1.0)];
        let fused = rrf_fusion(&vector, &lexical, 60.0);
        let scores: std::collections::HashMap<i64, f32> = fused.into_iter().collect();

        // id 10: vector rank 1, lexical rank 3 -> 1/61 + 1/63
        assert!((scores[&10] - (1.0 / 61.0 + 1.0 / 63.0)).abs() < 1e-6);
        // id 20: vector rank 2, lexical rank 1 -> 1/62 + 1/61
        assert!((scores[&20] - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-6);
        // id 30: vector rank 3, lexical rank 2 -> 1/63 + 1/62
        assert!((scores[&30] - (1.0 / 63.0 + 1.0 / 62.0)).abs() < 1e-6);
    }

    #[test]
    fn ordering_breaks_ties_by_first_seen() {
        let fused = rrf_fusion(&[], &[(1, 5.0), (2, 5.0)], 60.0);
        assert_eq!(fused[0].0, 1);
        assert_eq!(fused[1].0, 2);
    }
}

mod feedback_golden {
    use umc::types::FeedbackLabel;

    /// §4.7: `useful: +0.1*|weight|`, `irrelevant: -0.1*|weight|`, `outdated: -0.2*|weight|`.
    #[test]
    fn importance_deltas_match_spec_coefficients() {
        assert!((FeedbackLabel::Useful.importance_delta(1.0) - 0.1).abs() < 1e-6);
        assert!((FeedbackLabel::Irrelevant.importance_delta(1.0) - (-0.1)).abs() < 1e-6);
        assert!((FeedbackLabel::Outdated.importance_delta(1.0) - (-0.2)).abs() < 1e-6);
        // weight's absolute value is what matters, not its sign
        assert!((FeedbackLabel::Useful.importance_delta(-1.0) - 0.1).abs() < 1e-6);
        assert!((FeedbackLabel::Useful.importance_delta(0.5) - 0.05).abs() < 1e-6);
    }
}

mod content_hash_golden {
    use umc::types::{Memory, MemoryScope, MemoryValue};

    /// The content hash is a stable digest over `value + sorted(tags) +
    /// scope` (§3.1); tag order must not perturb it, since `remember`'s
    /// dedup path (§4.5.3) relies on two calls with the same logical tag
    /// set landing on the same hash regardless of client-supplied order.
    #[test]
    fn hash_is_stable_and_tag_order_independent() {
        let value = MemoryValue::Text("prefers FastAPI over Django".to_string());
        let a = Memory::compute_content_hash(
            &value,
            &["backend".to_string(), "preference".to_string()],
            MemoryScope::Persistent,
        );
        let b = Memory::compute_content_hash(
            &value,
            &["preference".to_string(), "backend".to_string()],
            MemoryScope::Persistent,
        );
        assert_eq!(a, b);

        let different_scope = Memory::compute_content_hash(
            &value,
            &["backend".to_string(), "preference".to_string()],
            MemoryScope::Working,
        );
        assert_ne!(a, different_scope);
    }
}

mod tokenizer_golden {
    use umc::storage::tokenize;

    /// B3: the lexical tokenizer must emit at least one token per CJK
    /// character cluster even with no whitespace between them.
    #[test]
    fn cjk_text_without_spaces_yields_multiple_tokens() {
        let tokens = tokenize("我喜欢用筷子吃饭");
        assert!(tokens.len() > 1, "expected multiple tokens from CJK text, got {tokens:?}");
    }

    #[test]
    fn latin_text_is_case_folded() {
        let tokens = tokenize("SnapDish Photo App");
        assert_eq!(tokens, vec!["snapdish", "photo", "app"]);
    }

    #[test]
    fn mixed_cyrillic_and_latin_round_trips() {
        let tokens = tokenize("Привет world");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0], "привет");
    }
}

mod end_to_end_scenarios {
    use crate::common::manager;
    use umc::types::{FeedbackLabel, MemoryScope, MemorySpec, MemoryValue, RecallOptions, ScopeFilter};

    /// Scenario 1 (§8): store-then-recall.
    #[test]
    fn store_then_recall_returns_stored_memory_with_positive_score() {
        let mgr = manager();
        mgr.remember(MemorySpec {
            user_id: "u1".to_string(),
            agent_name: "global".to_string(),
            key: Some("pref".to_string()),
            value: MemoryValue::Text("prefers FastAPI over Django".to_string()),
            scope: MemoryScope::Persistent,
            tags: vec![],
            importance: 0.8,
        })
        .unwrap();

        let results = mgr
            .recall_semantic("u1", "global", "what backend framework do I like?", 1)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].memory.key, "pref");
        assert!(results[0].score > 0.0);
    }

    /// Scenario 2 (§8): hybrid recall must rank an exact lexical token hit
    /// first even when a distractor is topically similar.
    #[test]
    fn hybrid_recall_ranks_exact_token_match_first() {
        let mgr = manager();
        mgr.remember(MemorySpec {
            user_id: "u1".to_string(),
            agent_name: "global".to_string(),
            key: Some("app".to_string()),
            value: MemoryValue::Text("SnapDish is a photo app".to_string()),
            scope: MemoryScope::Persistent,
            tags: vec![],
            importance: 0.5,
        })
        .unwrap();
        mgr.remember(MemorySpec {
            user_id: "u1".to_string(),
            agent_name: "global".to_string(),
            key: Some("weather".to_string()),
            value: MemoryValue::Text("the weather today is sunny and warm outside".to_string()),
            scope: MemoryScope::Persistent,
            tags: vec![],
            importance: 0.5,
        })
        .unwrap();

        let results = mgr.recall_hybrid("u1", "global", "SnapDish", &RecallOptions::default()).unwrap();
        assert_eq!(results[0].memory.key, "app");
    }

    /// Scenario 6 (§8): feedback strictly raises a memory's importance
    /// after a `useful` signal, all else equal.
    #[test]
    fn feedback_raises_importance_on_repeat_query() {
        let mgr = manager();
        mgr.remember(MemorySpec {
            user_id: "u1".to_string(),
            agent_name: "global".to_string(),
            key: Some("target".to_string()),
            value: MemoryValue::Text("the quick brown fox jumps".to_string()),
            scope: MemoryScope::Persistent,
            tags: vec![],
            importance: 0.5,
        })
        .unwrap();

        let before = mgr
            .recall_by_key("u1", "global", ScopeFilter::Persistent, "target")
            .unwrap()
            .unwrap();
        mgr.feedback(before.id, FeedbackLabel::Useful, 1.0).unwrap();
        let after = mgr
            .recall_by_key("u1", "global", ScopeFilter::Persistent, "target")
            .unwrap()
            .unwrap();
        assert!(after.importance > before.importance);
    }
}

mod export_import_golden {
    use crate::common::manager;
    use umc::types::{ListFilter, MemoryScope, MemorySpec, MemoryValue, ScopeFilter};

    /// P8: `import(export(S))` reproduces `list(S)` modulo bookkeeping
    /// fields the store regenerates on upsert (`exported_at`, etc).
    #[test]
    fn export_then_import_round_trips_memories() {
        let mgr = manager();
        mgr.remember(MemorySpec {
            user_id: "u1".to_string(),
            agent_name: "global".to_string(),
            key: Some("a".to_string()),
            value: MemoryValue::Text("first memory".to_string()),
            scope: MemoryScope::Persistent,
            tags: vec!["x".to_string()],
            importance: 0.7,
        })
        .unwrap();
        mgr.remember(MemorySpec {
            user_id: "u1".to_string(),
            agent_name: "global".to_string(),
            key: Some("b".to_string()),
            value: MemoryValue::Text("second memory".to_string()),
            scope: MemoryScope::Persistent,
            tags: vec![],
            importance: 0.3,
        })
        .unwrap();

        let src_kv = umc::storage::SqliteKvStore::open_in_memory().unwrap();
        for listed in mgr.list("u1", ScopeFilter::Persistent, &ListFilter::default()).unwrap() {
            umc::storage::KvStore::put(&src_kv, &listed.memory).unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let metadata = umc::export::export(&src_kv, mgr.graph(), dir.path()).unwrap();
        assert_eq!(metadata.memory_count, 2);

        let dst_kv = umc::storage::SqliteKvStore::open_in_memory().unwrap();
        let dst_graph = umc::graph::GraphStore::open(":memory:").unwrap();
        let stats = umc::export::import(&dst_kv, &dst_graph, dir.path()).unwrap();
        assert_eq!(stats.memories, 2);

        let mut restored = umc::storage::KvStore::all(&dst_kv).unwrap();
        restored.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].key, "a");
        assert_eq!(restored[0].value.as_text(), "first memory");
        assert_eq!(restored[1].key, "b");
    }
}
