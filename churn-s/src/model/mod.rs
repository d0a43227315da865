pub mod catboost;

pub use catboost::CatBoostModel;

use common::FeatureSchema;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// predict called while no model is loaded
    ModelUnavailable,
    /// the model rejected the feature vector
    Inference(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::ModelUnavailable => write!(f, "model is not loaded"),
            GatewayError::Inference(msg) => write!(f, "inference failed: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Inference backend behind the gateway.
pub trait ChurnModel: Send + Sync {
    /// Probability of the positive (churn) class for a positional feature vector.
    fn predict_proba(&self, features: &[f64]) -> Result<f64, GatewayError>;

    /// Feature names as reported by the model artifact, in positional order.
    fn feature_names(&self) -> Vec<String>;
}

/// Owns the loaded churn model for the lifetime of the process.
///
/// The gateway is populated once at startup and then shared read-only
/// (behind an `Arc`) by every request. A failed load is recorded in
/// `load_errors` instead of aborting, leaving the service up in a degraded
/// state where predictions report the recorded errors.
#[derive(Default)]
pub struct ModelGateway {
    model: Option<Arc<dyn ChurnModel>>,
    /// For each model position, the index of that feature in schema order.
    /// `None` when both orders agree.
    feature_order: Option<Vec<usize>>,
    load_errors: Vec<String>,
}

impl ModelGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a gateway and immediately try to load the artifact at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P, schema: &FeatureSchema) -> Self {
        let mut gateway = Self::new();
        gateway.load(path, schema);
        gateway
    }

    pub fn with_model(model: Arc<dyn ChurnModel>) -> Self {
        Self {
            model: Some(model),
            feature_order: None,
            load_errors: Vec::new(),
        }
    }

    /// Load a CatBoost JSON artifact. Never fails: errors end up in `load_errors`.
    pub fn load<P: AsRef<Path>>(&mut self, path: P, schema: &FeatureSchema) {
        let path = path.as_ref();
        if self.model.is_some() {
            warn!("Model already loaded, ignoring load of {}", path.display());
            return;
        }

        match CatBoostModel::from_file(path) {
            Ok(model) => {
                info!(
                    "Model loaded from {} ({} trees)",
                    path.display(),
                    model.tree_count()
                );
                let names = model.feature_names();
                info!("Model features list: {:?}", names);
                if names.len() != schema.len() {
                    error!(
                        "Model expects {} features, request schema has {}",
                        names.len(),
                        schema.len()
                    );
                    self.load_errors.push(format!(
                        "Failed to load model: model expects {} features, request schema has {}",
                        names.len(),
                        schema.len()
                    ));
                    return;
                }
                self.feature_order = feature_order(&names, schema);
                if self.feature_order.is_some() {
                    info!("Reordering request features to the model's feature order");
                } else if names.as_slice() != schema.names() {
                    warn!(
                        "Model feature names differ from request schema, using positional order: model={:?} schema={:?}",
                        names,
                        schema.names()
                    );
                }
                self.model = Some(Arc::new(model));
            }
            Err(e) => {
                error!("Failed to load model from {}: {:#}", path.display(), e);
                self.load_errors.push(format!("Failed to load model: {:#}", e));
            }
        }
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64, GatewayError> {
        let model = self.model.as_ref().ok_or(GatewayError::ModelUnavailable)?;
        match &self.feature_order {
            None => model.predict_proba(features),
            Some(order) => {
                if features.len() != order.len() {
                    return Err(GatewayError::Inference(format!(
                        "expected {} features, got {}",
                        order.len(),
                        features.len()
                    )));
                }
                let reordered: Vec<f64> = order.iter().map(|&i| features[i]).collect();
                model.predict_proba(&reordered)
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn load_errors(&self) -> &[String] {
        &self.load_errors
    }

    pub fn feature_names(&self) -> Option<Vec<String>> {
        self.model.as_ref().map(|m| m.feature_names())
    }
}

/// Positions of the model's features within the schema, when the model names
/// the same features as the schema but in a different order.
fn feature_order(model_names: &[String], schema: &FeatureSchema) -> Option<Vec<usize>> {
    if model_names == schema.names() {
        return None;
    }
    model_names
        .iter()
        .map(|name| schema.names().iter().position(|n| n == name))
        .collect()
}
