//! Dense (semantic) retrieval adapters.
//!
//! The dense side is an opaque ranked-list service: any [`Retriever`] whose
//! [`side`](Retriever::side) is [`Side::Dense`] can be plugged into the
//! hybrid searcher. Scores are backend-defined and only assumed to grow with
//! similarity; the merger rescales them before fusion.
//!
//! With the `semantic` feature, [`EmbeddingRetriever`] provides an
//! in-process backend built from the indexed chunks.
//!
//! [`Retriever`]: crate::retriever::Retriever
//! [`Side::Dense`]: crate::types::Side::Dense

#[cfg(feature = "semantic")]
mod semantic;

#[cfg(feature = "semantic")]
pub use semantic::EmbeddingRetriever;

use crate::error::{Error, Result};
use crate::retriever::Retriever;
use crate::types::{Hit, Side};
use async_trait::async_trait;

/// Placeholder dense backend for deployments without a semantic service.
///
/// Every query fails, so hybrid retrieval degrades to sparse-only and the
/// evaluation report flags dense retrieval as unavailable.
#[derive(Debug, Clone)]
pub struct UnconfiguredDense {
    reason: String,
}

impl UnconfiguredDense {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Retriever for UnconfiguredDense {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn side(&self) -> Side {
        Side::Dense
    }

    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<Hit>> {
        Err(Error::backend("dense", &self.reason))
    }
}
