//! Boosted ensemble with deterministic scoring
//!
//! A model is a bias plus a list of shrunk trees. Scoring sums
//! `leaf * weight / scale` over the trees; all terms are integers.

use crate::errors::ModelError;
use crate::serde_canon::{hash_canonical_hex, to_canonical_json};
use crate::tree::Tree;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Fixed-point scale (1e6)
pub const SCALE: i64 = 1_000_000;

/// Current on-disk format version
pub const FORMAT_VERSION: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    /// Format version, see [`FORMAT_VERSION`]
    pub version: i32,

    /// Fixed-point scale of thresholds, leaves and weights
    pub scale: i64,

    /// Trees in the order they were boosted
    pub trees: Vec<Tree>,

    /// Base prediction, fixed-point
    pub bias: i64,

    /// Scale of the returned score
    pub post_scale: i64,

    /// Width of the feature vectors the model was trained on
    #[serde(default)]
    pub feature_count: usize,
}

impl Model {
    pub fn new(trees: Vec<Tree>, bias: i64, feature_count: usize) -> Self {
        Self {
            version: FORMAT_VERSION,
            scale: SCALE,
            trees,
            bias,
            post_scale: SCALE,
            feature_count,
        }
    }

    /// Validate format, scales and every tree
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != FORMAT_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }
        if self.scale <= 0 || self.post_scale <= 0 {
            return Err(ModelError::ValidationFailed(format!(
                "Invalid scale {} / post_scale {}",
                self.scale, self.post_scale
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| {
                ModelError::ValidationFailed(format!("Tree {i} validation failed: {e}"))
            })?;
            if let Some(max) = tree.max_feature_index() {
                if max >= self.feature_count {
                    return Err(ModelError::ValidationFailed(format!(
                        "Tree {i} splits on feature {max} but model has {} features",
                        self.feature_count
                    )));
                }
            }
        }

        Ok(())
    }

    /// Score one fixed-point feature vector
    ///
    /// Overflowing tree contributions are dropped and the running sum
    /// saturates, so scoring never panics.
    pub fn score(&self, features: &[i64]) -> i64 {
        self.trees.iter().fold(self.bias, |sum, tree| {
            let contribution = tree.evaluate(features) as i128 * tree.weight as i128
                / self.scale.max(1) as i128;
            sum.saturating_add(contribution.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
        })
    }

    /// Score a vector after checking it has the trained width
    pub fn score_checked(&self, features: &[i64]) -> Result<i64, ModelError> {
        if features.len() != self.feature_count {
            return Err(ModelError::FeatureWidth {
                expected: self.feature_count,
                found: features.len(),
            });
        }
        Ok(self.score(features))
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Compact JSON with sorted keys
    pub fn to_canonical_json(&self) -> Result<String, ModelError> {
        Ok(to_canonical_json(self)?)
    }

    /// BLAKE3 hex digest of [`Model::to_canonical_json`]
    pub fn hash_hex(&self) -> Result<String, ModelError> {
        Ok(hash_canonical_hex(self)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        fs::write(path, self.to_canonical_json()?)?;
        Ok(())
    }

    /// Load and validate a model written by [`Model::save_json`]
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let json = fs::read_to_string(path)?;
        let model: Model = serde_json::from_str(&json)?;
        model.validate()?;
        Ok(model)
    }
}
