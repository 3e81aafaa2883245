//! Offline retrieval evaluation.
//!
//! Replays a labeled query set through sparse-only, dense-only, and hybrid
//! retrieval, judges each ranked list by substring relevance, and aggregates
//! Coverage@k, Precision@k, MRR@k and latency per method.

mod dataset;
mod harness;
mod metrics;
mod report;

pub use dataset::{EvalQuery, load_dataset};
pub use harness::EvalHarness;
pub use metrics::{QueryMetrics, is_relevant, mean, p95, pearson};
pub use report::{
    EvalReport, JudgedResult, MethodRun, MethodSummary, QueryReport, RESULTS_FILE, RunStatus,
};
