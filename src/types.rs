//! Core types shared by the sparse index, dense adapters, merger, and harness.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Flat chunk metadata. Values are stringified scalars.
pub type Metadata = BTreeMap<String, String>;

/// Stable chunk identifier shared between the sparse and dense indexes.
///
/// Used as the deduplication key when merging candidate sets and as the
/// tie-breaker when two results score the same.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub String);

impl ChunkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChunkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChunkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A chunk of document text as handed to the indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    #[serde(rename = "chunk_text")]
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(id: impl Into<ChunkId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One ranked hit from a single retrieval backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: ChunkId,
    /// Backend-defined similarity; higher is more similar.
    pub score: f32,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Hit {
    pub fn new(id: impl Into<ChunkId>, score: f32, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            score,
            text: text.into(),
            metadata: Metadata::new(),
        }
    }
}

/// One side of the hybrid fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Sparse,
    Dense,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Sparse => "sparse",
            Side::Dense => "dense",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which retrieval methods found a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Found by dense search only.
    Dense,
    /// Found by sparse search only.
    Sparse,
    /// Found by both methods (strongest signal).
    Both,
}

impl Source {
    /// Record that `side` also found this result.
    pub fn with(self, side: Side) -> Self {
        match (self, side) {
            (Source::Dense, Side::Dense) => Source::Dense,
            (Source::Sparse, Side::Sparse) => Source::Sparse,
            _ => Source::Both,
        }
    }
}

impl From<Side> for Source {
    fn from(side: Side) -> Self {
        match side {
            Side::Sparse => Source::Sparse,
            Side::Dense => Source::Dense,
        }
    }
}

/// A retrieval method selectable by callers and the evaluation harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    Sparse,
    Dense,
    Hybrid,
}

impl RetrievalMethod {
    pub const ALL: [RetrievalMethod; 3] = [
        RetrievalMethod::Sparse,
        RetrievalMethod::Dense,
        RetrievalMethod::Hybrid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RetrievalMethod::Sparse => "sparse",
            RetrievalMethod::Dense => "dense",
            RetrievalMethod::Hybrid => "hybrid",
        }
    }

    /// Whether this method queries the given side.
    pub fn uses(self, side: Side) -> bool {
        match self {
            RetrievalMethod::Hybrid => true,
            RetrievalMethod::Sparse => side == Side::Sparse,
            RetrievalMethod::Dense => side == Side::Dense,
        }
    }
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-result audit record of how the fused score was produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Raw dense score, absent if dense search did not return this chunk.
    pub dense_score: Option<f32>,
    /// Raw sparse score, absent if sparse search did not return this chunk.
    pub sparse_score: Option<f32>,
    pub normalized_dense: f32,
    pub normalized_sparse: f32,
    pub overlap_score: f32,
    /// Three-signal weighted relevance.
    pub relevance_score: f32,
    /// Score used for ranking under the configured fusion mode.
    pub fused_score: f32,
    /// Second-stage score, present when a reranker ordered the results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

/// A merged, reranked result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedResult {
    pub id: ChunkId,
    pub text: String,
    pub metadata: Metadata,
    pub source: Source,
    pub score_breakdown: ScoreBreakdown,
}

impl MergedResult {
    /// The ranking score: the rerank score if present, else the fused score.
    pub fn score(&self) -> f32 {
        self.score_breakdown
            .rerank_score
            .unwrap_or(self.score_breakdown.fused_score)
    }
}
