//! Retrieval and evaluation configuration.

use crate::error::{Error, Result};
use crate::types::{RetrievalMethod, Side};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default RRF constant.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// How normalized signals are fused into the ranking score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FusionMode {
    /// `dense·nd + sparse·ns + overlap·lexical_overlap`.
    Weighted { dense: f32, sparse: f32, overlap: f32 },
    /// `alpha·nd + (1 - alpha)·ns`; overlap is computed but not used.
    Alpha { alpha: f32 },
    /// Reciprocal rank fusion over each side's original ranking.
    Rrf { k: f32 },
}

impl Default for FusionMode {
    fn default() -> Self {
        FusionMode::Weighted {
            dense: 0.5,
            sparse: 0.3,
            overlap: 0.2,
        }
    }
}

impl FusionMode {
    pub fn alpha(alpha: f32) -> Self {
        FusionMode::Alpha { alpha }
    }

    pub fn rrf() -> Self {
        FusionMode::Rrf { k: DEFAULT_RRF_K }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FusionMode::Weighted { .. } => "weighted",
            FusionMode::Alpha { .. } => "alpha",
            FusionMode::Rrf { .. } => "rrf",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            FusionMode::Weighted {
                dense,
                sparse,
                overlap,
            } => {
                if [dense, sparse, overlap]
                    .iter()
                    .any(|w| !w.is_finite() || *w < 0.0)
                {
                    return Err(Error::InvalidConfig(format!(
                        "fusion weights must be finite and non-negative, got dense={dense} sparse={sparse} overlap={overlap}"
                    )));
                }
            }
            FusionMode::Alpha { alpha } => {
                if !(0.0..=1.0).contains(&alpha) {
                    return Err(Error::InvalidConfig(format!(
                        "alpha must be within [0, 1], got {alpha}"
                    )));
                }
            }
            FusionMode::Rrf { k } => {
                if !k.is_finite() || k <= 0.0 {
                    return Err(Error::InvalidConfig(format!(
                        "rrf k must be positive, got {k}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Configuration for hybrid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    /// Candidates requested from the sparse index.
    pub top_k_sparse: usize,
    /// Candidates requested from the dense backend.
    pub top_k_dense: usize,
    /// Final number of results to return.
    pub top_k: usize,
    pub fusion: FusionMode,
    pub sparse_timeout_ms: u64,
    pub dense_timeout_ms: u64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            top_k_sparse: 20,
            top_k_dense: 5,
            top_k: 10,
            fusion: FusionMode::default(),
            sparse_timeout_ms: 2_000,
            dense_timeout_ms: 5_000,
        }
    }
}

impl HybridConfig {
    pub fn with_fusion(mut self, fusion: FusionMode) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Candidate depth requested from `side`.
    pub fn candidates(&self, side: Side) -> usize {
        match side {
            Side::Sparse => self.top_k_sparse,
            Side::Dense => self.top_k_dense,
        }
    }

    /// Depth actually requested from `side` for a run returning `top_k`
    /// results. Every method uses this, so a side that answers alone yields
    /// the same candidates whether or not the other side was asked.
    pub fn depth(&self, side: Side, top_k: usize) -> usize {
        self.candidates(side).max(top_k)
    }

    pub fn timeout(&self, side: Side) -> Duration {
        Duration::from_millis(match side {
            Side::Sparse => self.sparse_timeout_ms,
            Side::Dense => self.dense_timeout_ms,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("top_k must be at least 1".into()));
        }
        if self.top_k_sparse == 0 || self.top_k_dense == 0 {
            return Err(Error::InvalidConfig(
                "candidate depths must be at least 1".into(),
            ));
        }
        if self.sparse_timeout_ms == 0 || self.dense_timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be non-zero".into()));
        }
        self.fusion.validate()
    }
}

/// Configuration for an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Cutoff for Coverage@k, Precision@k, and MRR@k.
    pub k: usize,
    /// Methods to evaluate, in report order.
    pub methods: Vec<RetrievalMethod>,
    /// Outer deadline for one method run on one query.
    pub query_timeout_ms: u64,
    pub hybrid: HybridConfig,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            k: 5,
            methods: RetrievalMethod::ALL.to_vec(),
            query_timeout_ms: 10_000,
            hybrid: HybridConfig::default(),
        }
    }
}

impl EvalConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::InvalidConfig("k must be at least 1".into()));
        }
        if self.methods.is_empty() {
            return Err(Error::InvalidConfig("no methods selected".into()));
        }
        if self.query_timeout_ms == 0 {
            return Err(Error::InvalidConfig("query timeout must be non-zero".into()));
        }
        self.hybrid.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(HybridConfig::default().validate().is_ok());
        assert!(EvalConfig::default().validate().is_ok());
        assert_eq!(HybridConfig::default().top_k_sparse, 20);
        assert_eq!(HybridConfig::default().top_k_dense, 5);
    }

    #[test]
    fn test_alpha_range() {
        assert!(FusionMode::alpha(0.0).validate().is_ok());
        assert!(FusionMode::alpha(1.0).validate().is_ok());
        assert!(FusionMode::alpha(1.5).validate().is_err());
        assert!(FusionMode::alpha(f32::NAN).validate().is_err());
    }

    #[test]
    fn test_fusion_mode_serde() {
        let json = serde_json::to_value(FusionMode::alpha(0.25)).unwrap();
        assert_eq!(json["mode"], "alpha");
        let back: FusionMode = serde_json::from_value(json).unwrap();
        assert_eq!(back, FusionMode::alpha(0.25));

        let config: HybridConfig = serde_json::from_str(r#"{"top_k": 3}"#).unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.fusion, FusionMode::default());
    }
}
