//! Optional second-stage reranking.
//!
//! A [`Reranker`] rescores the fused result list against the query, usually
//! with a cross-encoder that reads query and passage together. The searcher
//! orders results by the rerank score when a reranker is attached and keeps
//! the fused order if reranking fails.

#[cfg(feature = "semantic")]
mod cross_encoder;

#[cfg(feature = "semantic")]
pub use cross_encoder::CrossEncoderReranker;

use crate::error::{Error, Result};
use crate::types::MergedResult;
use async_trait::async_trait;

/// Scores `(query, passage)` pairs. Higher is more relevant.
#[async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;

    /// One score per entry of `passages`, in the same order.
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;
}

/// Attach rerank scores to `results` and reorder them.
///
/// Ordering is rerank score descending, ties by chunk ID ascending. Non-finite
/// scores become `f32::MIN`. On error `results` is left untouched.
pub async fn apply(
    reranker: &dyn Reranker,
    query: &str,
    results: &mut [MergedResult],
) -> Result<()> {
    if results.is_empty() {
        return Ok(());
    }
    let passages: Vec<String> = results.iter().map(|r| r.text.clone()).collect();
    let scores = reranker.score(query, &passages).await?;
    if scores.len() != results.len() {
        return Err(Error::backend(
            reranker.name(),
            format!("returned {} scores for {} passages", scores.len(), results.len()),
        ));
    }

    for (result, score) in results.iter_mut().zip(scores) {
        result.score_breakdown.rerank_score =
            Some(if score.is_finite() { score } else { f32::MIN });
    }
    results.sort_by(|a, b| b.score().total_cmp(&a.score()).then_with(|| a.id.cmp(&b.id)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{merge_candidates, rerank};
    use crate::types::Hit;
    use crate::FusionMode;

    /// Prefers shorter passages.
    struct ShortestFirst;

    #[async_trait]
    impl Reranker for ShortestFirst {
        fn name(&self) -> &str {
            "shortest"
        }

        async fn score(&self, _query: &str, passages: &[String]) -> Result<Vec<f32>> {
            Ok(passages.iter().map(|p| -(p.len() as f32)).collect())
        }
    }

    struct Truncating;

    #[async_trait]
    impl Reranker for Truncating {
        fn name(&self) -> &str {
            "truncating"
        }

        async fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }
    }

    fn fused() -> Vec<MergedResult> {
        let sparse = vec![
            Hit::new("a", 3.0, "a long passage about stoic virtue"),
            Hit::new("b", 2.0, "stoic"),
            Hit::new("c", 1.0, "virtue ethics"),
        ];
        rerank("stoic virtue", merge_candidates(&sparse, &[]), &FusionMode::default())
    }

    #[tokio::test]
    async fn test_apply_reorders_by_rerank_score() {
        let mut results = fused();
        assert_eq!(results[0].id.as_str(), "a");

        apply(&ShortestFirst, "stoic virtue", &mut results).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(results[0].score_breakdown.rerank_score, Some(-5.0));
        assert_eq!(results[0].score(), -5.0);
        // Fusion scores are kept for the audit trail
        assert!(results[2].score_breakdown.fused_score > results[0].score_breakdown.fused_score);
    }

    #[tokio::test]
    async fn test_apply_rejects_short_score_list() {
        let mut results = fused();
        let before = results.clone();
        assert!(apply(&Truncating, "q", &mut results).await.is_err());
        assert_eq!(results, before);
    }
}
