//! In-process dense backend.
//!
//! Embeds chunk texts with a local sentence-embedding model and answers
//! queries through an HNSW approximate nearest neighbor map.

use crate::error::{Error, Result};
use crate::retriever::Retriever;
use crate::types::{Chunk, Hit, Side};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use instant_distance::{Builder, HnswMap, Point, Search};
use std::sync::Arc;

/// Wrapper for f32 vector to implement Point trait
#[derive(Debug, Clone)]
struct Embedding(Vec<f32>);

impl Point for Embedding {
    fn distance(&self, other: &Self) -> f32 {
        // Cosine distance = 1 - cosine similarity
        let dot: f32 = self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum();
        let norm_a: f32 = self.0.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = other.0.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }

        1.0 - (dot / (norm_a * norm_b))
    }
}

/// Dense retriever over a fixed set of chunks.
pub struct EmbeddingRetriever {
    model: Arc<TextEmbedding>,
    /// HNSW map from embedding to position in `chunks`.
    hnsw: Option<HnswMap<Embedding, usize>>,
    chunks: Vec<Chunk>,
}

impl EmbeddingRetriever {
    /// Embed `chunks` with all-MiniLM-L6-v2 and build the HNSW map.
    pub fn build(chunks: Vec<Chunk>) -> Result<Self> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .map_err(|e| Error::backend("embedding", e))?;

        let hnsw = if chunks.is_empty() {
            None
        } else {
            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            let vectors = model
                .embed(texts, None)
                .map_err(|e| Error::backend("embedding", e))?;
            let points: Vec<Embedding> = vectors.into_iter().map(Embedding).collect();
            let positions: Vec<usize> = (0..points.len()).collect();
            Some(Builder::default().build(points, positions))
        };

        tracing::info!("Embedded {} chunks for dense retrieval", chunks.len());

        Ok(Self {
            model: Arc::new(model),
            hnsw,
            chunks,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embed `query` on the blocking pool. Dropping the returned future
    /// abandons the result, so a caller's timeout fires while the model is
    /// still running.
    async fn embed_query(&self, query: &str) -> Result<Embedding> {
        let model = Arc::clone(&self.model);
        let query = query.to_string();
        let mut vectors = tokio::task::spawn_blocking(move || model.embed(vec![query], None))
            .await
            .map_err(|e| Error::backend("embedding", format!("embedding task failed: {e}")))?
            .map_err(|e| Error::backend("embedding", e))?;
        vectors
            .pop()
            .map(Embedding)
            .ok_or_else(|| Error::backend("embedding", "no embedding generated"))
    }
}

#[async_trait]
impl Retriever for EmbeddingRetriever {
    fn name(&self) -> &str {
        "embedding"
    }

    fn side(&self) -> Side {
        Side::Dense
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Hit>> {
        let Some(hnsw) = &self.hnsw else {
            return Ok(Vec::new());
        };

        let query = self.embed_query(query).await?;
        let mut search = Search::default();

        Ok(hnsw
            .search(&query, &mut search)
            .take(top_k)
            .map(|item| {
                let chunk = &self.chunks[*item.value];
                Hit {
                    id: chunk.id.clone(),
                    // Convert distance to similarity (1 - distance for cosine)
                    score: 1.0 - item.distance,
                    text: chunk.text.clone(),
                    metadata: chunk.metadata.clone(),
                }
            })
            .collect())
    }
}
