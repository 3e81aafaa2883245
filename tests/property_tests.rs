//! Property-based tests for the hybrid retrieval core.
//!
//! Uses proptest to generate random inputs and verify invariants hold.

use hybrid_retrieval::search::{merge_candidates, min_max_normalize, rerank};
use hybrid_retrieval::sparse::{is_stopword, tokenize, MIN_TERM_LEN};
use hybrid_retrieval::*;
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Strategies for generating test data
// ============================================================================

/// Free text with punctuation, mixed case, and the odd non-ASCII character
fn text() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ,.;:'!?éü-]{0,80}"
}

/// Scored hits with distinct IDs drawn from a small pool
fn hits() -> impl Strategy<Value = Vec<Hit>> {
    prop::collection::hash_map("[a-h]", (0.0f32..100.0, text()), 0..8).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(id, (score, text))| Hit::new(id, score, text))
            .collect()
    })
}

// ============================================================================
// Tokenizer
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn tokenize_is_deterministic(s in text()) {
        let a: Vec<String> = tokenize(&s).collect();
        let b: Vec<String> = tokenize(&s).collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn tokenized_output_is_a_fixed_point(s in text()) {
        let once: Vec<String> = tokenize(&s).collect();
        let joined = once.join(" ");
        let twice: Vec<String> = tokenize(&joined).collect();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn terms_are_normalized(s in text()) {
        for term in tokenize(&s) {
            prop_assert!(term.len() >= MIN_TERM_LEN);
            prop_assert!(term.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
            prop_assert!(!is_stopword(&term));
        }
    }
}

// ============================================================================
// Vocabulary
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn vocabulary_ids_are_stable(words in prop::collection::vec("[a-z]{2,6}", 1..30)) {
        let vocab = Vocabulary::new();
        let first: Vec<u32> = words.iter().map(|w| vocab.get_or_create_id(w)).collect();
        let second: Vec<u32> = words.iter().map(|w| vocab.get_or_create_id(w)).collect();
        prop_assert_eq!(&first, &second);

        let restored = Vocabulary::from_map(vocab.to_map()).unwrap();
        let third: Vec<u32> = words.iter().map(|w| restored.get_or_create_id(w)).collect();
        prop_assert_eq!(&first, &third);

        let distinct: HashSet<&String> = words.iter().collect();
        let ids: HashSet<u32> = first.iter().copied().collect();
        prop_assert_eq!(distinct.len(), ids.len());

        // A new term after restore never reuses an ID
        let fresh = restored.get_or_create_id("zzzzzzzzzz");
        prop_assert!(!ids.contains(&fresh));
    }
}

// ============================================================================
// Normalization and fusion
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn normalized_scores_are_bounded(scores in prop::collection::vec(-1000.0f32..1000.0, 1..20)) {
        let normalized = min_max_normalize(&scores);
        prop_assert!(normalized.iter().all(|n| (0.0..=1.0).contains(n)));
        prop_assert!(normalized.iter().any(|&n| n == 1.0));

        let max = scores.iter().copied().fold(f32::MIN, f32::max);
        for (s, n) in scores.iter().zip(&normalized) {
            if *s == max {
                prop_assert_eq!(*n, 1.0);
            }
        }
    }

    #[test]
    fn equal_scores_normalize_to_one(score in -50.0f32..50.0, len in 1usize..10) {
        let normalized = min_max_normalize(&vec![score; len]);
        prop_assert!(normalized.iter().all(|&n| n == 1.0));
    }

    #[test]
    fn rerank_is_reproducible_and_sorted(sparse in hits(), dense in hits(), query in text()) {
        let mode = FusionMode::default();
        let first = rerank(&query, merge_candidates(&sparse, &dense), &mode);
        let second = rerank(&query, merge_candidates(&sparse, &dense), &mode);
        prop_assert_eq!(&first, &second);

        let ids: HashSet<&str> = first.iter().map(|r| r.id.as_str()).collect();
        prop_assert_eq!(ids.len(), first.len());

        for pair in first.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.score() > b.score() || (a.score() == b.score() && a.id < b.id));
        }
        for r in &first {
            let s = &r.score_breakdown;
            prop_assert!((0.0..=1.0).contains(&s.normalized_dense));
            prop_assert!((0.0..=1.0).contains(&s.normalized_sparse));
            prop_assert!((0.0..=1.0).contains(&s.overlap_score));
            if s.dense_score.is_none() {
                prop_assert_eq!(s.normalized_dense, 0.0);
            }
        }
    }
}
