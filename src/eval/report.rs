//! Evaluation report: per-query outcomes, per-method aggregates, rendering,
//! and persistence.

use super::metrics::{QueryMetrics, mean, p95, pearson};
use crate::config::EvalConfig;
use crate::error::{Error, Result};
use crate::instruments::InstrumentsSnapshot;
use crate::types::{ChunkId, RetrievalMethod, ScoreBreakdown, Side, Source};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const RESULTS_FILE: &str = "latest_results.json";

/// Outcome of one method on one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    /// Hybrid answered from one side only.
    Degraded { failed: Side, reason: String },
    /// No results could be produced at all.
    Unavailable { reason: String },
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::Degraded { .. } => "degraded",
            RunStatus::Unavailable { .. } => "unavailable",
        }
    }
}

/// One ranked result as judged by the harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgedResult {
    pub rank: usize,
    pub id: ChunkId,
    pub text: String,
    pub source: Source,
    pub score_breakdown: ScoreBreakdown,
    pub relevant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRun {
    pub method: RetrievalMethod,
    #[serde(flatten)]
    pub status: RunStatus,
    /// Absent when the method was unavailable.
    pub metrics: Option<QueryMetrics>,
    pub latency_ms: f64,
    pub results: Vec<JudgedResult>,
}

impl MethodRun {
    pub fn is_available(&self) -> bool {
        !matches!(self.status, RunStatus::Unavailable { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryReport {
    pub query: String,
    pub relevant_substrings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_quality: Option<f64>,
    pub runs: Vec<MethodRun>,
}

impl QueryReport {
    pub fn run(&self, method: RetrievalMethod) -> Option<&MethodRun> {
        self.runs.iter().find(|r| r.method == method)
    }
}

/// Aggregates for one method over the whole query set.
///
/// Quality and latency figures cover available runs only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSummary {
    pub method: RetrievalMethod,
    pub queries_scored: usize,
    pub degraded: usize,
    pub unavailable: usize,
    pub avg_coverage: f64,
    pub avg_precision: f64,
    pub avg_mrr: f64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
}

impl MethodSummary {
    pub fn aggregate(method: RetrievalMethod, queries: &[QueryReport]) -> Self {
        let runs: Vec<&MethodRun> = queries.iter().filter_map(|q| q.run(method)).collect();
        let scored: Vec<(&MethodRun, QueryMetrics)> = runs
            .iter()
            .filter_map(|r| r.metrics.map(|m| (*r, m)))
            .collect();

        let pick = |f: fn(&QueryMetrics) -> f64| -> Vec<f64> {
            scored.iter().map(|(_, m)| f(m)).collect()
        };
        let latencies: Vec<f64> = scored.iter().map(|(r, _)| r.latency_ms).collect();

        Self {
            method,
            queries_scored: scored.len(),
            degraded: runs
                .iter()
                .filter(|r| matches!(r.status, RunStatus::Degraded { .. }))
                .count(),
            unavailable: runs.iter().filter(|r| !r.is_available()).count(),
            avg_coverage: mean(&pick(|m| m.coverage_at_k)),
            avg_precision: mean(&pick(|m| m.precision_at_k)),
            avg_mrr: mean(&pick(|m| m.mrr_at_k)),
            avg_latency_ms: mean(&latencies),
            p95_latency_ms: p95(&latencies),
        }
    }

    /// Quality aggregates only; latency varies between identical runs.
    pub fn quality(&self) -> (usize, usize, usize, f64, f64, f64) {
        (
            self.queries_scored,
            self.degraded,
            self.unavailable,
            self.avg_coverage,
            self.avg_precision,
            self.avg_mrr,
        )
    }
}

/// Full result of an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub tool_version: String,
    pub offline: bool,
    pub config: EvalConfig,
    pub summary: Vec<MethodSummary>,
    /// Pearson correlation of hybrid Coverage@k with answer quality.
    pub coverage_quality_correlation: Option<f64>,
    /// Searcher counters for the run that produced this report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruments: Option<InstrumentsSnapshot>,
    pub queries: Vec<QueryReport>,
}

impl EvalReport {
    pub fn new(config: EvalConfig, offline: bool, queries: Vec<QueryReport>) -> Self {
        let summary = config
            .methods
            .iter()
            .map(|&method| MethodSummary::aggregate(method, &queries))
            .collect();
        let coverage_quality_correlation = coverage_quality_correlation(&queries);
        Self {
            tool_version: crate::TOOL_VERSION.to_string(),
            offline,
            config,
            summary,
            coverage_quality_correlation,
            instruments: None,
            queries,
        }
    }

    pub fn with_instruments(mut self, instruments: InstrumentsSnapshot) -> Self {
        self.instruments = Some(instruments);
        self
    }

    pub fn method(&self, method: RetrievalMethod) -> Option<&MethodSummary> {
        self.summary.iter().find(|s| s.method == method)
    }

    /// Side-by-side method summary.
    pub fn render_summary(&self) -> String {
        let k = self.config.k;
        let mut out = String::new();
        let rule = "=".repeat(88);

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(
            out,
            "RETRIEVAL EVALUATION SUMMARY (k={k}, fusion={}{})",
            self.config.hybrid.fusion.name(),
            if self.offline { ", offline" } else { "" }
        );
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(
            out,
            "{:<8} {:>11} {:>12} {:>8} {:>13} {:>13} {:>6} {:>6}",
            "Method", "Coverage@k", "Precision@k", "MRR@k", "Avg lat (ms)", "P95 lat (ms)", "Degr", "Unav"
        );
        let _ = writeln!(out, "{}", "-".repeat(88));
        for s in &self.summary {
            let _ = writeln!(
                out,
                "{:<8} {:>11.3} {:>12.3} {:>8.3} {:>13.1} {:>13.1} {:>6} {:>6}",
                s.method.as_str(),
                s.avg_coverage,
                s.avg_precision,
                s.avg_mrr,
                s.avg_latency_ms,
                s.p95_latency_ms,
                s.degraded,
                s.unavailable
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Total queries evaluated: {}", self.queries.len());
        for s in &self.summary {
            if s.unavailable > 0 {
                let _ = writeln!(
                    out,
                    "  {} unavailable for {} of {} queries (excluded from averages)",
                    s.method,
                    s.unavailable,
                    self.queries.len()
                );
            }
        }

        if let (Some(dense), Some(hybrid)) = (
            self.method(RetrievalMethod::Dense),
            self.method(RetrievalMethod::Hybrid),
        ) {
            if dense.queries_scored > 0 && hybrid.queries_scored > 0 {
                let _ = writeln!(
                    out,
                    "Hybrid vs dense: coverage {:.0}% -> {:.0}%, P95 latency {:+.0}ms",
                    dense.avg_coverage * 100.0,
                    hybrid.avg_coverage * 100.0,
                    hybrid.p95_latency_ms - dense.p95_latency_ms
                );
            }
        }
        if let Some(r) = self.coverage_quality_correlation {
            let _ = writeln!(out, "Correlation between coverage and answer quality: {r:.2}");
        }
        if let Some(i) = &self.instruments {
            let _ = writeln!(
                out,
                "Search requests: {} ({} failed, {} partial), end-to-end P95 {:.1}ms",
                i.queries_total,
                i.query_errors_total,
                i.query_partial_total,
                i.query_end_to_end_seconds.p95 * 1000.0
            );
        }
        out
    }

    /// One row per query and method.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<40} {:<8} {:<12} {:>5} {:>6} {:>6} {:>10}",
            "Query", "Method", "Status", "Cov", "Prec", "MRR", "Lat (ms)"
        );
        let _ = writeln!(out, "{}", "-".repeat(93));
        for q in &self.queries {
            let query = truncate(&q.query, 40);
            for run in &q.runs {
                match run.metrics {
                    Some(m) => {
                        let _ = writeln!(
                            out,
                            "{:<40} {:<8} {:<12} {:>5.2} {:>6.2} {:>6.2} {:>10.1}",
                            query,
                            run.method.as_str(),
                            run.status.label(),
                            m.coverage_at_k,
                            m.precision_at_k,
                            m.mrr_at_k,
                            run.latency_ms
                        );
                    }
                    None => {
                        let _ = writeln!(
                            out,
                            "{:<40} {:<8} {:<12} {:>5} {:>6} {:>6} {:>10.1}",
                            query,
                            run.method.as_str(),
                            run.status.label(),
                            "-",
                            "-",
                            "-",
                            run.latency_ms
                        );
                    }
                }
            }
        }
        out
    }

    /// Write the report to `<dir>/latest_results.json`, replacing atomically.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(RESULTS_FILE);
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, self)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        tracing::info!("Saved evaluation results to {}", path.display());
        Ok(path)
    }
}

fn coverage_quality_correlation(queries: &[QueryReport]) -> Option<f64> {
    let (coverage, quality): (Vec<f64>, Vec<f64>) = queries
        .iter()
        .filter_map(|q| {
            let quality = q.answer_quality?;
            let metrics = q.run(RetrievalMethod::Hybrid)?.metrics?;
            Some((metrics.coverage_at_k, quality))
        })
        .unzip();
    pearson(&coverage, &quality)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars - 3).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run(method: RetrievalMethod, status: RunStatus, coverage: f64, latency_ms: f64) -> MethodRun {
        let metrics = match status {
            RunStatus::Unavailable { .. } => None,
            _ => Some(QueryMetrics {
                coverage_at_k: coverage,
                precision_at_k: coverage / 2.0,
                mrr_at_k: coverage,
                relevant_retrieved: 0,
                total_retrieved: 0,
            }),
        };
        MethodRun {
            method,
            status,
            metrics,
            latency_ms,
            results: Vec::new(),
        }
    }

    fn query(runs: Vec<MethodRun>, answer_quality: Option<f64>) -> QueryReport {
        QueryReport {
            query: "q".into(),
            relevant_substrings: vec!["x".into()],
            notes: None,
            answer_quality,
            runs,
        }
    }

    #[test]
    fn test_unavailable_excluded_from_averages() {
        let queries = vec![
            query(vec![run(RetrievalMethod::Dense, RunStatus::Ok, 1.0, 10.0)], None),
            query(
                vec![run(
                    RetrievalMethod::Dense,
                    RunStatus::Unavailable {
                        reason: "down".into(),
                    },
                    0.0,
                    5000.0,
                )],
                None,
            ),
            query(vec![run(RetrievalMethod::Dense, RunStatus::Ok, 0.0, 20.0)], None),
        ];
        let s = MethodSummary::aggregate(RetrievalMethod::Dense, &queries);
        assert_eq!(s.queries_scored, 2);
        assert_eq!(s.unavailable, 1);
        assert_eq!(s.avg_coverage, 0.5);
        assert_eq!(s.p95_latency_ms, 20.0);
    }

    #[test]
    fn test_degraded_counted_and_included() {
        let degraded = RunStatus::Degraded {
            failed: Side::Dense,
            reason: "timeout".into(),
        };
        let queries = vec![
            query(vec![run(RetrievalMethod::Hybrid, degraded, 1.0, 3.0)], None),
            query(vec![run(RetrievalMethod::Hybrid, RunStatus::Ok, 0.0, 4.0)], None),
        ];
        let s = MethodSummary::aggregate(RetrievalMethod::Hybrid, &queries);
        assert_eq!(s.degraded, 1);
        assert_eq!(s.queries_scored, 2);
        assert_eq!(s.avg_coverage, 0.5);
    }

    #[test]
    fn test_correlation_needs_three_points() {
        let make = |coverage, quality| {
            query(
                vec![run(RetrievalMethod::Hybrid, RunStatus::Ok, coverage, 1.0)],
                Some(quality),
            )
        };
        let two = vec![make(1.0, 0.9), make(0.0, 0.1)];
        assert_eq!(coverage_quality_correlation(&two), None);

        let three = vec![make(1.0, 0.9), make(0.0, 0.1), make(1.0, 0.7)];
        let r = coverage_quality_correlation(&three).unwrap();
        assert!(r > 0.9);
    }

    #[test]
    fn test_save_writes_latest_results() {
        let dir = TempDir::new().unwrap();
        let report = EvalReport::new(
            EvalConfig::default(),
            true,
            vec![query(
                vec![run(RetrievalMethod::Sparse, RunStatus::Ok, 1.0, 2.0)],
                None,
            )],
        );
        let path = report.save(&dir.path().join("out")).unwrap();
        assert!(path.ends_with(RESULTS_FILE));

        let back: EvalReport = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_render_marks_unavailable() {
        let report = EvalReport::new(
            EvalConfig::default(),
            false,
            vec![query(
                vec![
                    run(RetrievalMethod::Sparse, RunStatus::Ok, 1.0, 2.0),
                    run(
                        RetrievalMethod::Dense,
                        RunStatus::Unavailable {
                            reason: "no backend".into(),
                        },
                        0.0,
                        0.1,
                    ),
                ],
                None,
            )],
        );
        assert!(report.render_summary().contains("dense unavailable for 1 of 1 queries"));
        assert!(report.render_table().contains("unavailable"));
        assert_eq!(truncate("abcdef", 5), "ab...");
    }
}
