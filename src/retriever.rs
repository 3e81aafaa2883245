//! The ranked-list interface shared by every retrieval backend.

use crate::error::Result;
use crate::types::{Hit, Side};
use async_trait::async_trait;

/// A backend that answers a text query with a ranked list of hits.
///
/// Implemented by the local sparse index, dense adapters, and the synthetic
/// generators used for offline evaluation. Implementations must fail with an
/// error when they cannot answer; an empty list means "no matches".
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Short backend name used in logs and error messages.
    fn name(&self) -> &str;

    /// Which side of the hybrid fan-out this backend serves.
    fn side(&self) -> Side;

    /// Top `top_k` hits, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Hit>>;
}
