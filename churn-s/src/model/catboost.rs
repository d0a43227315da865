//! Evaluator for CatBoost binary classifiers exported with
//! `model.save_model(path, format="json")`.
//!
//! Only float-feature oblivious trees are supported, which covers models
//! trained on numerically encoded inputs. Categorical/CTR splits and
//! multiclass leaves are rejected when the artifact is parsed so that an
//! unsupported model never reaches the request path.
//!
//! ```json
//! {
//!   "features_info": {
//!     "float_features": [
//!       {"feature_index": 0, "flat_feature_index": 0, "feature_id": "gender", "borders": [0.5]}
//!     ]
//!   },
//!   "oblivious_trees": [
//!     {"leaf_values": [-0.1, 0.2], "splits": [{"border": 0.5, "float_feature_index": 0, "split_type": "FloatFeature"}]}
//!   ],
//!   "scale_and_bias": [1, [0.0]]
//! }
//! ```

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::{ChurnModel, GatewayError};

const FLOAT_FEATURE_SPLIT: &str = "FloatFeature";
// depth above which 2^depth leaves stops being a sane artifact
const MAX_TREE_DEPTH: usize = 16;

#[derive(Debug, Deserialize)]
struct RawModel {
    #[serde(default)]
    features_info: RawFeaturesInfo,
    oblivious_trees: Vec<RawTree>,
    #[serde(default)]
    scale_and_bias: Option<RawScaleAndBias>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFeaturesInfo {
    #[serde(default)]
    float_features: Vec<RawFloatFeature>,
    #[serde(default)]
    categorical_features: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawFloatFeature {
    feature_index: usize,
    flat_feature_index: usize,
    #[serde(default)]
    feature_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTree {
    leaf_values: Vec<f64>,
    #[serde(default)]
    splits: Vec<RawSplit>,
}

#[derive(Debug, Deserialize)]
struct RawSplit {
    #[serde(default)]
    border: Option<f64>,
    #[serde(default)]
    float_feature_index: Option<usize>,
    split_type: String,
}

// Older exports write the bias as a scalar, newer ones as a per-dimension list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScaleAndBias {
    Scalar(f64, f64),
    PerDimension(f64, Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
struct Split {
    position: usize,
    border: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct ObliviousTree {
    splits: Vec<Split>,
    leaf_values: Vec<f64>,
}

impl ObliviousTree {
    fn leaf_index(&self, features: &[f64]) -> usize {
        self.splits
            .iter()
            .enumerate()
            .fold(0usize, |index, (depth, split)| {
                index | (usize::from(features[split.position] > split.border) << depth)
            })
    }

    fn value(&self, features: &[f64]) -> f64 {
        self.leaf_values[self.leaf_index(features)]
    }
}

/// Oblivious-tree ensemble producing the probability of the positive class.
#[derive(Debug, Clone, PartialEq)]
pub struct CatBoostModel {
    trees: Vec<ObliviousTree>,
    feature_names: Vec<String>,
    feature_count: usize,
    scale: f64,
    bias: f64,
}

impl CatBoostModel {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read model file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid model file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let raw: RawModel = serde_json::from_str(raw).context("malformed CatBoost JSON")?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawModel) -> Result<Self> {
        if !raw.features_info.categorical_features.is_empty() {
            bail!("categorical features are not supported");
        }
        if raw.oblivious_trees.is_empty() {
            bail!("model has no trees");
        }

        let float_features = raw.features_info.float_features;
        let feature_count = float_features
            .iter()
            .map(|f| f.flat_feature_index + 1)
            .max()
            .ok_or_else(|| anyhow!("model declares no float features"))?;

        // float_feature_index -> position in the input vector
        let mut positions = vec![None; float_features.len()];
        let mut feature_names = vec![String::new(); feature_count];
        for feature in &float_features {
            let slot = positions
                .get_mut(feature.feature_index)
                .ok_or_else(|| anyhow!("feature_index {} out of range", feature.feature_index))?;
            *slot = Some(feature.flat_feature_index);
            feature_names[feature.flat_feature_index] = feature
                .feature_id
                .clone()
                .unwrap_or_else(|| feature.flat_feature_index.to_string());
        }

        let mut trees = Vec::with_capacity(raw.oblivious_trees.len());
        for (i, tree) in raw.oblivious_trees.into_iter().enumerate() {
            let depth = tree.splits.len();
            if depth > MAX_TREE_DEPTH {
                bail!("tree {} is too deep ({})", i, depth);
            }
            if tree.leaf_values.len() != 1 << depth {
                bail!(
                    "tree {} has {} leaf values, expected {} (multiclass models are not supported)",
                    i,
                    tree.leaf_values.len(),
                    1usize << depth
                );
            }

            let mut splits = Vec::with_capacity(depth);
            for split in tree.splits {
                if split.split_type != FLOAT_FEATURE_SPLIT {
                    bail!("tree {} uses unsupported split type {}", i, split.split_type);
                }
                let index = split
                    .float_feature_index
                    .ok_or_else(|| anyhow!("tree {} split without float_feature_index", i))?;
                let position = positions
                    .get(index)
                    .copied()
                    .flatten()
                    .ok_or_else(|| anyhow!("tree {} references unknown float feature {}", i, index))?;
                let border = split
                    .border
                    .ok_or_else(|| anyhow!("tree {} split without border", i))?;
                splits.push(Split { position, border });
            }

            trees.push(ObliviousTree {
                splits,
                leaf_values: tree.leaf_values,
            });
        }

        let (scale, bias) = match raw.scale_and_bias {
            None => (1.0, 0.0),
            Some(RawScaleAndBias::Scalar(scale, bias)) => (scale, bias),
            Some(RawScaleAndBias::PerDimension(scale, bias)) => match bias.as_slice() {
                [] => (scale, 0.0),
                [bias] => (scale, *bias),
                _ => bail!("multiclass bias is not supported"),
            },
        };

        Ok(Self {
            trees,
            feature_names,
            feature_count,
            scale,
            bias,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Raw log-odds score before the sigmoid.
    pub fn raw_score(&self, features: &[f64]) -> std::result::Result<f64, GatewayError> {
        if features.len() != self.feature_count {
            return Err(GatewayError::Inference(format!(
                "expected {} features, got {}",
                self.feature_count,
                features.len()
            )));
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.value(features)).sum();
        let raw = self.scale * sum + self.bias;
        if !raw.is_finite() {
            return Err(GatewayError::Inference(format!(
                "non-finite model output {}",
                raw
            )));
        }
        Ok(raw)
    }
}

impl ChurnModel for CatBoostModel {
    fn predict_proba(&self, features: &[f64]) -> std::result::Result<f64, GatewayError> {
        self.raw_score(features).map(sigmoid)
    }

    fn feature_names(&self) -> Vec<String> {
        self.feature_names.clone()
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
