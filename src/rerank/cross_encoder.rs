//! Cross-encoder reranker backed by a local ONNX model.

use super::Reranker;
use crate::error::{Error, Result};
use async_trait::async_trait;
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;

pub struct CrossEncoderReranker {
    model: Arc<TextRerank>,
}

impl CrossEncoderReranker {
    /// Load the BGE reranker base model.
    pub fn new() -> Result<Self> {
        let model = TextRerank::try_new(
            RerankInitOptions::new(RerankerModel::BGERerankerBase)
                .with_show_download_progress(false),
        )
        .map_err(|e| Error::backend("cross-encoder", e))?;
        Ok(Self {
            model: Arc::new(model),
        })
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    fn name(&self) -> &str {
        "cross-encoder"
    }

    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let query = query.to_string();
        let passages = passages.to_vec();
        let ranked = tokio::task::spawn_blocking(move || {
            model.rerank(query, passages, false, None)
        })
        .await
        .map_err(|e| Error::backend("cross-encoder", format!("rerank task failed: {e}")))?
        .map_err(|e| Error::backend("cross-encoder", e))?;

        // Results come back sorted by score; restore input order
        let mut scores = vec![f32::MIN; ranked.len()];
        for r in ranked {
            if let Some(slot) = scores.get_mut(r.index) {
                *slot = r.score;
            }
        }
        Ok(scores)
    }
}
