//! Hybrid search combining sparse TF-IDF and dense semantic retrieval.
//!
//! Pipeline:
//! 1. Fan out: sparse and dense queries run as independent tasks, each with
//!    its own deadline
//! 2. Degrade: a failed or timed-out side is dropped with a warning
//! 3. Union candidates by chunk ID
//! 4. Min-max normalize each signal, compute lexical overlap, fuse
//! 5. Sort by fused score (ties by chunk ID)
//! 6. Optionally rescore with a [`Reranker`], then truncate
//!
//! Every request is counted in the searcher's [`SearchInstruments`].

mod fusion;

pub use fusion::{
    Candidate, W_DENSE, W_OVERLAP, W_SPARSE, merge_candidates, min_max_normalize, rerank,
};

use crate::config::HybridConfig;
use crate::error::{Error, Result};
use crate::instruments::SearchInstruments;
use crate::rerank::{Reranker, apply as apply_reranker};
use crate::retriever::Retriever;
use crate::types::{ChunkId, Hit, MergedResult, RetrievalMethod, Side};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Whether every requested side answered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrievalStatus {
    Complete,
    /// One side failed and results come from the other side only.
    Partial { failed: Side, reason: String },
}

/// Ranked results plus how they were obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub method: RetrievalMethod,
    #[serde(flatten)]
    pub status: RetrievalStatus,
    pub results: Vec<MergedResult>,
}

impl SearchResponse {
    pub fn is_partial(&self) -> bool {
        matches!(self.status, RetrievalStatus::Partial { .. })
    }
}

/// Hybrid search engine over one sparse and one dense backend.
///
/// Clones share one set of instruments.
#[derive(Clone)]
pub struct HybridSearcher {
    sparse: Arc<dyn Retriever>,
    dense: Arc<dyn Retriever>,
    reranker: Option<Arc<dyn Reranker>>,
    config: HybridConfig,
    instruments: Arc<SearchInstruments>,
}

impl HybridSearcher {
    /// Fails if the configuration is invalid or a backend serves the wrong
    /// side.
    pub fn new(
        sparse: Arc<dyn Retriever>,
        dense: Arc<dyn Retriever>,
        config: HybridConfig,
    ) -> Result<Self> {
        config.validate()?;
        for (expected, backend) in [(Side::Sparse, &sparse), (Side::Dense, &dense)] {
            if backend.side() != expected {
                return Err(Error::InvalidConfig(format!(
                    "backend {} serves the {} side, expected {}",
                    backend.name(),
                    backend.side(),
                    expected
                )));
            }
        }
        Ok(Self {
            sparse,
            dense,
            reranker: None,
            config,
            instruments: Arc::new(SearchInstruments::new()),
        })
    }

    /// Rescore every result list with `reranker` before truncation.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    pub fn instruments(&self) -> &SearchInstruments {
        &self.instruments
    }

    fn backend(&self, side: Side) -> &Arc<dyn Retriever> {
        match side {
            Side::Sparse => &self.sparse,
            Side::Dense => &self.dense,
        }
    }

    /// Hybrid search returning the configured `top_k`.
    pub async fn search(&self, query: &str) -> Result<SearchResponse> {
        self.search_with(RetrievalMethod::Hybrid, query, self.config.top_k)
            .await
    }

    /// Run `method` for `query` and return at most `top_k` results.
    ///
    /// Single-method runs go through the same merge and scoring pipeline with
    /// the other side not requested. In every method a side's candidate depth
    /// is raised to `top_k` when the configured depth is smaller.
    ///
    /// Errors when every requested side fails. A hybrid run with one failed
    /// side succeeds with [`RetrievalStatus::Partial`].
    pub async fn search_with(
        &self,
        method: RetrievalMethod,
        query: &str,
        top_k: usize,
    ) -> Result<SearchResponse> {
        let start = Instant::now();
        let outcome = self.execute(method, query, top_k).await;
        match &outcome {
            Ok(response) => self.instruments.record_success(
                start.elapsed(),
                response.results.len(),
                response.is_partial(),
            ),
            Err(_) => self.instruments.record_error(start.elapsed()),
        }
        outcome
    }

    async fn execute(
        &self,
        method: RetrievalMethod,
        query: &str,
        top_k: usize,
    ) -> Result<SearchResponse> {
        let mut outcomes = self.fan_out(method, query, top_k).await;

        let mut hits: HashMap<Side, Vec<Hit>> = HashMap::new();
        let mut failures: Vec<(Side, Error)> = Vec::new();
        for side in [Side::Sparse, Side::Dense] {
            match outcomes.remove(&side) {
                Some(Ok(found)) => {
                    hits.insert(side, sanitize(side, found));
                }
                Some(Err(e)) => {
                    tracing::warn!(%side, error = %e, "retrieval side failed, degrading");
                    failures.push((side, e));
                }
                None => {}
            }
        }

        let status = match (method, failures.len()) {
            (_, 0) => RetrievalStatus::Complete,
            (RetrievalMethod::Hybrid, 1) => {
                let (failed, e) = &failures[0];
                RetrievalStatus::Partial {
                    failed: *failed,
                    reason: e.to_string(),
                }
            }
            (RetrievalMethod::Hybrid, _) => {
                let reason = |side: Side| {
                    failures
                        .iter()
                        .find(|(s, _)| *s == side)
                        .map(|(_, e)| e.to_string())
                        .unwrap_or_default()
                };
                return Err(Error::AllBackendsFailed {
                    sparse: reason(Side::Sparse),
                    dense: reason(Side::Dense),
                });
            }
            (_, _) => {
                let (_, e) = failures.remove(0);
                return Err(e);
            }
        };

        let sparse = hits.remove(&Side::Sparse).unwrap_or_default();
        let dense = hits.remove(&Side::Dense).unwrap_or_default();
        let candidates = merge_candidates(&sparse, &dense);
        let mut results = rerank(query, candidates, &self.config.fusion);
        if let Some(reranker) = &self.reranker {
            if let Err(e) = apply_reranker(reranker.as_ref(), query, &mut results).await {
                tracing::warn!(
                    reranker = reranker.name(),
                    error = %e,
                    "rerank failed, keeping fused order"
                );
            }
        }
        results.truncate(top_k);

        tracing::debug!(
            %method,
            sparse = sparse.len(),
            dense = dense.len(),
            returned = results.len(),
            "search complete"
        );

        Ok(SearchResponse {
            method,
            status,
            results,
        })
    }

    /// Query every side `method` uses concurrently and collect per-side
    /// outcomes. Tasks still running when this future is dropped are aborted.
    async fn fan_out(
        &self,
        method: RetrievalMethod,
        query: &str,
        top_k: usize,
    ) -> HashMap<Side, Result<Vec<Hit>>> {
        let mut tasks = JoinSet::new();
        let mut task_sides = HashMap::new();

        for side in [Side::Sparse, Side::Dense] {
            if !method.uses(side) {
                continue;
            }
            let backend = Arc::clone(self.backend(side));
            let query = query.to_string();
            let depth = self.config.depth(side, top_k);
            let deadline = self.config.timeout(side);

            let handle = tasks.spawn(async move {
                match tokio::time::timeout(deadline, backend.search(&query, depth)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout {
                        backend: backend.name().to_string(),
                        after: deadline,
                    }),
                }
            });
            task_sides.insert(handle.id(), side);
        }

        let mut outcomes = HashMap::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    outcomes.insert(task_sides[&id], result);
                }
                Err(e) => {
                    let side = task_sides[&e.id()];
                    let name = self.backend(side).name().to_string();
                    outcomes.insert(side, Err(Error::backend(name, format!("task failed: {e}"))));
                }
            }
        }
        outcomes
    }
}

/// Drop non-finite scores and repeated chunk IDs from a backend's list.
fn sanitize(side: Side, hits: Vec<Hit>) -> Vec<Hit> {
    let mut seen: HashSet<ChunkId> = HashSet::with_capacity(hits.len());
    hits.into_iter()
        .filter(|hit| {
            if !hit.score.is_finite() {
                tracing::warn!(%side, chunk = %hit.id, "dropping hit with non-finite score");
                return false;
            }
            seen.insert(hit.id.clone())
        })
        .collect()
}
