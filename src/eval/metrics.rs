//! Retrieval quality and latency metrics.

use serde::{Deserialize, Serialize};

/// Whether `text` contains any of `relevant_substrings`, ignoring case.
///
/// Empty substrings never match, and an empty list marks nothing relevant.
pub fn is_relevant(text: &str, relevant_substrings: &[String]) -> bool {
    let text = text.to_lowercase();
    relevant_substrings
        .iter()
        .filter(|s| !s.is_empty())
        .any(|s| text.contains(&s.to_lowercase()))
}

/// Quality metrics for one ranked list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryMetrics {
    /// 1.0 if any of the top `k` is relevant.
    pub coverage_at_k: f64,
    /// Relevant results in the top `k`, divided by `k`.
    pub precision_at_k: f64,
    /// Reciprocal 1-based rank of the first relevant result in the top `k`.
    pub mrr_at_k: f64,
    pub relevant_retrieved: usize,
    pub total_retrieved: usize,
}

impl QueryMetrics {
    /// Metrics from per-rank relevance flags, best result first.
    ///
    /// Fewer than `k` results still divide precision by `k`.
    pub fn calculate(relevance: &[bool], k: usize) -> Self {
        if k == 0 {
            return Self::default();
        }
        let top = &relevance[..relevance.len().min(k)];
        let relevant_retrieved = top.iter().filter(|&&r| r).count();
        let mrr_at_k = top
            .iter()
            .position(|&r| r)
            .map_or(0.0, |i| 1.0 / (i + 1) as f64);

        Self {
            coverage_at_k: if relevant_retrieved > 0 { 1.0 } else { 0.0 },
            precision_at_k: relevant_retrieved as f64 / k as f64,
            mrr_at_k,
            relevant_retrieved,
            total_retrieved: top.len(),
        }
    }
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Nearest-rank 95th percentile; 0.0 for an empty slice.
pub fn p95(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (0.95 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Pearson correlation of paired samples.
///
/// `None` with fewer than 3 pairs, mismatched lengths, or zero variance in
/// either sample.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 3 {
        return None;
    }
    let mean_x = mean(xs);
    let mean_y = mean(ys);

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }
    Some(cov / denominator)
}
