//! Replays a labeled query set through each retrieval method.

use super::dataset::EvalQuery;
use super::metrics::{QueryMetrics, is_relevant};
use super::report::{EvalReport, JudgedResult, MethodRun, QueryReport, RunStatus};
use crate::config::EvalConfig;
use crate::error::Result;
use crate::offline::SyntheticRetriever;
use crate::rerank::Reranker;
use crate::retriever::Retriever;
use crate::search::{HybridSearcher, RetrievalStatus, SearchResponse};
use crate::types::{RetrievalMethod, Side};
use std::sync::Arc;
use std::time::Instant;

/// Evaluation driver over one sparse and one dense backend.
pub struct EvalHarness {
    searcher: HybridSearcher,
    config: EvalConfig,
    offline: bool,
}

impl EvalHarness {
    pub fn new(
        sparse: Arc<dyn Retriever>,
        dense: Arc<dyn Retriever>,
        config: EvalConfig,
    ) -> Result<Self> {
        config.validate()?;
        let searcher = HybridSearcher::new(sparse, dense, config.hybrid.clone())?;
        Ok(Self {
            searcher,
            config,
            offline: false,
        })
    }

    /// Harness over deterministic synthetic backends.
    pub fn offline(config: EvalConfig) -> Result<Self> {
        let mut harness = Self::new(
            Arc::new(SyntheticRetriever::new(Side::Sparse)),
            Arc::new(SyntheticRetriever::new(Side::Dense)),
            config,
        )?;
        harness.offline = true;
        Ok(harness)
    }

    /// Rerank every method's results with `reranker`.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.searcher = self.searcher.with_reranker(reranker);
        self
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate every query and aggregate.
    ///
    /// Searcher instruments are reset first, so the report's counters cover
    /// this run only.
    pub async fn run(&self, queries: &[EvalQuery]) -> EvalReport {
        self.searcher.instruments().reset();
        tracing::info!(
            "Evaluating {} queries with methods {:?} at k={}",
            queries.len(),
            self.config.methods,
            self.config.k
        );

        let mut reports = Vec::with_capacity(queries.len());
        for (i, query) in queries.iter().enumerate() {
            tracing::debug!("Query {}/{}: {}", i + 1, queries.len(), query.query);
            reports.push(self.run_query(query).await);
        }

        EvalReport::new(self.config.clone(), self.offline, reports)
            .with_instruments(self.searcher.instruments().snapshot())
    }

    /// Run every configured method on one query.
    pub async fn run_query(&self, query: &EvalQuery) -> QueryReport {
        let mut runs = Vec::with_capacity(self.config.methods.len());
        for &method in &self.config.methods {
            runs.push(self.run_method(method, query).await);
        }
        QueryReport {
            query: query.query.clone(),
            relevant_substrings: query.relevant_substrings.clone(),
            notes: query.notes.clone(),
            answer_quality: query.answer_quality,
            runs,
        }
    }

    async fn run_method(&self, method: RetrievalMethod, query: &EvalQuery) -> MethodRun {
        let k = self.config.k;
        let deadline = self.config.query_timeout();

        let start = Instant::now();
        let outcome = tokio::time::timeout(
            deadline,
            self.searcher.search_with(method, &query.query, k),
        )
        .await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!("{} unavailable for {:?}: {}", method, query.query, e);
                return unavailable(method, e.to_string(), latency_ms);
            }
            Err(_) => {
                tracing::warn!(
                    "{} timed out after {}ms for {:?}",
                    method,
                    deadline.as_millis(),
                    query.query
                );
                return unavailable(
                    method,
                    format!("timed out after {}ms", deadline.as_millis()),
                    latency_ms,
                );
            }
        };

        judge(method, response, &query.relevant_substrings, k, latency_ms)
    }
}

fn unavailable(method: RetrievalMethod, reason: String, latency_ms: f64) -> MethodRun {
    MethodRun {
        method,
        status: RunStatus::Unavailable { reason },
        metrics: None,
        latency_ms,
        results: Vec::new(),
    }
}

fn judge(
    method: RetrievalMethod,
    response: SearchResponse,
    relevant_substrings: &[String],
    k: usize,
    latency_ms: f64,
) -> MethodRun {
    let status = match response.status {
        RetrievalStatus::Complete => RunStatus::Ok,
        RetrievalStatus::Partial { failed, reason } => RunStatus::Degraded { failed, reason },
    };

    let results: Vec<JudgedResult> = response
        .results
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(i, r)| JudgedResult {
            rank: i + 1,
            relevant: is_relevant(&r.text, relevant_substrings),
            id: r.id,
            text: r.text,
            source: r.source,
            score_breakdown: r.score_breakdown,
        })
        .collect();

    let flags: Vec<bool> = results.iter().map(|r| r.relevant).collect();
    MethodRun {
        method,
        status,
        metrics: Some(QueryMetrics::calculate(&flags, k)),
        latency_ms,
        results,
    }
}
