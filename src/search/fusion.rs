//! Candidate merging, score normalization, and fusion.
//!
//! Everything here is synchronous and deterministic: given the same sparse
//! and dense hit lists, the merged ranking is bit-for-bit identical no matter
//! which backend answered first.

use crate::config::FusionMode;
use crate::sparse::lexical_overlap;
use crate::types::{ChunkId, Hit, MergedResult, Metadata, ScoreBreakdown, Side, Source};
use std::collections::BTreeMap;

/// Weights of the default three-signal relevance score.
pub const W_DENSE: f32 = 0.5;
pub const W_SPARSE: f32 = 0.3;
pub const W_OVERLAP: f32 = 0.2;

/// A unioned candidate before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: ChunkId,
    pub text: String,
    pub metadata: Metadata,
    pub dense_score: Option<f32>,
    pub sparse_score: Option<f32>,
    /// 1-based position in the dense list.
    pub dense_rank: Option<usize>,
    /// 1-based position in the sparse list.
    pub sparse_rank: Option<usize>,
    pub source: Source,
}

impl Candidate {
    fn from_hit(hit: &Hit, side: Side, rank: usize) -> Self {
        let mut candidate = Self {
            id: hit.id.clone(),
            text: hit.text.clone(),
            metadata: hit.metadata.clone(),
            dense_score: None,
            sparse_score: None,
            dense_rank: None,
            sparse_rank: None,
            source: side.into(),
        };
        candidate.set(side, hit.score, rank);
        candidate
    }

    fn set(&mut self, side: Side, score: f32, rank: usize) {
        match side {
            Side::Dense => {
                self.dense_score = Some(score);
                self.dense_rank = Some(rank);
            }
            Side::Sparse => {
                self.sparse_score = Some(score);
                self.sparse_rank = Some(rank);
            }
        }
    }

    fn score(&self, side: Side) -> Option<f32> {
        match side {
            Side::Dense => self.dense_score,
            Side::Sparse => self.sparse_score,
        }
    }
}

/// Union sparse and dense hits by chunk ID.
///
/// Dense hits are merged first, so a chunk found by both sides keeps the
/// dense text and the sparse side only fills in missing metadata keys. A
/// chunk repeated within one list keeps its best-ranked occurrence. The
/// returned candidates are ordered by chunk ID.
pub fn merge_candidates(sparse: &[Hit], dense: &[Hit]) -> Vec<Candidate> {
    let mut merged: BTreeMap<ChunkId, Candidate> = BTreeMap::new();

    for (side, hits) in [(Side::Dense, dense), (Side::Sparse, sparse)] {
        for (i, hit) in hits.iter().enumerate() {
            let rank = i + 1;
            match merged.get_mut(&hit.id) {
                Some(existing) if existing.score(side).is_some() => {}
                Some(existing) => {
                    existing.set(side, hit.score, rank);
                    existing.source = existing.source.with(side);
                    for (key, value) in &hit.metadata {
                        existing
                            .metadata
                            .entry(key.clone())
                            .or_insert_with(|| value.clone());
                    }
                }
                None => {
                    merged.insert(hit.id.clone(), Candidate::from_hit(hit, side, rank));
                }
            }
        }
    }

    merged.into_values().collect()
}

/// Min-max normalize `scores` to `[0, 1]`.
///
/// When every score is equal the result is all 1.0.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let range = ScoreRange::of(scores.iter().copied());
    scores
        .iter()
        .map(|&s| ScoreRange::normalize(range, Some(s)))
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct ScoreRange {
    min: f32,
    max: f32,
}

impl ScoreRange {
    fn of(scores: impl Iterator<Item = f32>) -> Option<Self> {
        scores.fold(None, |range, s| match range {
            None => Some(Self { min: s, max: s }),
            Some(r) => Some(Self {
                min: r.min.min(s),
                max: r.max.max(s),
            }),
        })
    }

    /// Absent values and empty groups map to 0.0. The group maximum is
    /// exactly 1.0.
    fn normalize(range: Option<Self>, value: Option<f32>) -> f32 {
        match (range, value) {
            (Some(r), Some(v)) if v >= r.max => 1.0,
            (Some(r), Some(v)) => {
                // f32 subtraction overflows for scores near the type's limits
                let (v, min, max) = (f64::from(v), f64::from(r.min), f64::from(r.max));
                ((v - min) / (max - min)).clamp(0.0, 1.0) as f32
            }
            _ => 0.0,
        }
    }
}

/// Score and sort candidates under `mode`.
///
/// Results are ordered by fused score descending, ties by chunk ID
/// ascending. Nothing is truncated.
pub fn rerank(query: &str, candidates: Vec<Candidate>, mode: &FusionMode) -> Vec<MergedResult> {
    let dense_range = ScoreRange::of(candidates.iter().filter_map(|c| c.dense_score));
    let sparse_range = ScoreRange::of(candidates.iter().filter_map(|c| c.sparse_score));

    let (w_dense, w_sparse, w_overlap) = match *mode {
        FusionMode::Weighted {
            dense,
            sparse,
            overlap,
        } => (dense, sparse, overlap),
        _ => (W_DENSE, W_SPARSE, W_OVERLAP),
    };

    let mut results: Vec<MergedResult> = candidates
        .into_iter()
        .map(|c| {
            let normalized_dense = ScoreRange::normalize(dense_range, c.dense_score);
            let normalized_sparse = ScoreRange::normalize(sparse_range, c.sparse_score);
            let overlap_score = lexical_overlap(query, &c.text);
            let relevance_score = w_dense * normalized_dense
                + w_sparse * normalized_sparse
                + w_overlap * overlap_score;

            let fused_score = match *mode {
                FusionMode::Weighted { .. } => relevance_score,
                FusionMode::Alpha { alpha } => {
                    alpha * normalized_dense + (1.0 - alpha) * normalized_sparse
                }
                FusionMode::Rrf { k } => [c.dense_rank, c.sparse_rank]
                    .into_iter()
                    .flatten()
                    .map(|rank| 1.0 / (k + rank as f32))
                    .sum(),
            };

            MergedResult {
                id: c.id,
                text: c.text,
                metadata: c.metadata,
                source: c.source,
                score_breakdown: ScoreBreakdown {
                    dense_score: c.dense_score,
                    sparse_score: c.sparse_score,
                    normalized_dense,
                    normalized_sparse,
                    overlap_score,
                    relevance_score,
                    fused_score,
                    rerank_score: None,
                },
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.score_breakdown
            .fused_score
            .total_cmp(&a.score_breakdown.fused_score)
            .then_with(|| a.id.cmp(&b.id))
    });
    results
}
