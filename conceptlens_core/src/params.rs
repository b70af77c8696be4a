//! Compute parameters and their configuration sources
//!
//! Parameters can be built in code, or loaded from YAML/JSON documents in
//! which any omitted field falls back to its default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, InputDataError, Result};
use crate::readiness::ReadinessWeights;
use crate::types::ValidationIssue;

/// Weights, weakness threshold and clustering settings for one run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeParams {
    /// Weight of direct readiness (default: 1.0)
    pub alpha: f64,
    /// Weight of prerequisite penalty (default: 0.3)
    pub beta: f64,
    /// Weight of downstream boost (default: 0.2)
    pub gamma: f64,
    /// Weakness threshold (default: 0.6)
    pub threshold: f64,
    /// Requested number of clusters (default: 4)
    pub k: usize,
    /// Clustering seed (default: 42)
    pub seed: u64,
}

impl Default for ComputeParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.3,
            gamma: 0.2,
            threshold: 0.6,
            k: 4,
            seed: 42,
        }
    }
}

const WEIGHT_RANGE: (f64, f64) = (0.0, 5.0);
const THRESHOLD_RANGE: (f64, f64) = (0.0, 1.0);
const K_RANGE: (usize, usize) = (2, 20);

impl ComputeParams {
    /// Check every parameter against its accepted range
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        let ranged = [
            ("alpha", self.alpha, WEIGHT_RANGE),
            ("beta", self.beta, WEIGHT_RANGE),
            ("gamma", self.gamma, WEIGHT_RANGE),
            ("threshold", self.threshold, THRESHOLD_RANGE),
        ];
        for (field, value, (lo, hi)) in ranged {
            if !value.is_finite() {
                issues.push(ValidationIssue::for_field(
                    field,
                    format!("{} must be a finite number, got {}", field, value),
                ));
            } else if value < lo || value > hi {
                issues.push(ValidationIssue::for_field(
                    field,
                    format!("{} must be in [{}, {}], got {}", field, lo, hi, value),
                ));
            }
        }

        if self.k < K_RANGE.0 || self.k > K_RANGE.1 {
            issues.push(ValidationIssue::for_field(
                "k",
                format!("k must be in [{}, {}], got {}", K_RANGE.0, K_RANGE.1, self.k),
            ));
        }

        issues
    }

    /// The stage-4 weights and threshold of these parameters
    pub fn readiness_weights(&self) -> ReadinessWeights {
        ReadinessWeights {
            alpha: self.alpha,
            beta: self.beta,
            gamma: self.gamma,
            threshold: self.threshold,
        }
    }

    /// Fail with the first range violation, if any
    pub fn ensure_valid(&self) -> Result<()> {
        match self.validate().into_iter().next() {
            Some(issue) => Err(InputDataError::InvalidParameter {
                field: issue.field.unwrap_or_default(),
                reason: issue.message,
            }
            .into()),
            None => Ok(()),
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let params: Self = serde_yaml::from_str(text).map_err(ConfigError::from)?;
        params.ensure_valid()?;
        Ok(params)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(text).map_err(ConfigError::from)?;
        params.ensure_valid()?;
        Ok(params)
    }

    /// Load parameters from a file
    ///
    /// `.yaml`/`.yml` files are parsed as YAML, anything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Self::from_yaml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
    }
}
