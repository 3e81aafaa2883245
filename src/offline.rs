//! Deterministic stand-in backends.
//!
//! Used by the offline evaluation mode and by tests that need a backend with
//! fixed answers, a backend that always fails, or one that answers slowly.

use crate::error::{Error, Result};
use crate::retriever::Retriever;
use crate::types::{Hit, Side};
use async_trait::async_trait;
use std::time::Duration;

/// Number of leading synthetic hits that mention the whole query.
const SYNTHETIC_ON_TOPIC: usize = 2;

/// Reproducible generator standing in for a real backend.
///
/// For position `i` the hit text is:
/// - `i < 2`: mentions the full query
/// - `i == 2`: mentions only the first query word
/// - otherwise: unrelated filler
///
/// Scores fall by 0.15 per position starting at 1.0. The two on-topic hits
/// share IDs across sides so hybrid runs see overlap; the rest are
/// side-specific.
#[derive(Debug, Clone)]
pub struct SyntheticRetriever {
    side: Side,
}

impl SyntheticRetriever {
    pub fn new(side: Side) -> Self {
        Self { side }
    }

    /// Generate `top_k` hits for `query`.
    pub fn generate(&self, query: &str, top_k: usize) -> Vec<Hit> {
        let first_word = query
            .split_whitespace()
            .next()
            .map(str::to_lowercase)
            .unwrap_or_else(|| "philosophy".to_string());

        (0..top_k)
            .map(|i| {
                let (id, text) = if i < SYNTHETIC_ON_TOPIC {
                    (
                        format!("synthetic_{i}"),
                        format!("This document discusses {query} and related concepts."),
                    )
                } else if i == SYNTHETIC_ON_TOPIC {
                    (
                        format!("synthetic_{}_{i}", self.side),
                        format!("Here we explore various topics including {first_word}."),
                    )
                } else {
                    (
                        format!("synthetic_{}_{i}", self.side),
                        format!("This is a document about completely different topic {i}."),
                    )
                };
                let mut hit = Hit::new(id, 1.0 - 0.15 * i as f32, text);
                hit.metadata.insert("synthetic".into(), "true".into());
                hit
            })
            .collect()
    }
}

#[async_trait]
impl Retriever for SyntheticRetriever {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn side(&self) -> Side {
        self.side
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Hit>> {
        Ok(self.generate(query, top_k))
    }
}

/// Backend that answers every query with the same hits.
#[derive(Debug, Clone)]
pub struct StaticRetriever {
    side: Side,
    hits: Vec<Hit>,
    delay: Option<Duration>,
}

impl StaticRetriever {
    pub fn new(side: Side, hits: Vec<Hit>) -> Self {
        Self {
            side,
            hits,
            delay: None,
        }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        "static"
    }

    fn side(&self) -> Side {
        self.side
    }

    async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<Hit>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }
}

/// Backend that fails every query.
#[derive(Debug, Clone)]
pub struct FailingRetriever {
    side: Side,
    reason: String,
}

impl FailingRetriever {
    pub fn new(side: Side, reason: impl Into<String>) -> Self {
        Self {
            side,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Retriever for FailingRetriever {
    fn name(&self) -> &str {
        "failing"
    }

    fn side(&self) -> Side {
        self.side
    }

    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<Hit>> {
        Err(Error::backend(self.side.as_str(), &self.reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_shape() {
        let hits = SyntheticRetriever::new(Side::Dense).generate("stoic virtue", 5);
        assert_eq!(hits.len(), 5);
        assert!(hits[0].text.contains("stoic virtue"));
        assert!(hits[2].text.contains("including stoic."));
        assert!(hits[4].text.contains("different topic 4"));
        assert!((hits[4].score - 0.4).abs() < 1e-6);
        assert_eq!(hits[3].id.as_str(), "synthetic_dense_3");
    }

    #[test]
    fn test_synthetic_shares_on_topic_ids() {
        let sparse = SyntheticRetriever::new(Side::Sparse).generate("q", 4);
        let dense = SyntheticRetriever::new(Side::Dense).generate("q", 4);
        assert_eq!(sparse[0].id, dense[0].id);
        assert_eq!(sparse[1].id, dense[1].id);
        assert_ne!(sparse[2].id, dense[2].id);
    }

    #[test]
    fn test_synthetic_empty_query() {
        let hits = SyntheticRetriever::new(Side::Sparse).generate("", 3);
        assert!(hits[2].text.contains("philosophy"));
    }

    #[tokio::test]
    async fn test_static_truncates() {
        let backend = StaticRetriever::new(
            Side::Sparse,
            vec![Hit::new("a", 1.0, "x"), Hit::new("b", 0.5, "y")],
        );
        assert_eq!(backend.search("q", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_errors() {
        let backend = FailingRetriever::new(Side::Dense, "down");
        let err = backend.search("q", 3).await.unwrap_err();
        assert!(err.to_string().contains("down"));
    }
}
