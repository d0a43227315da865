//! Validation and dispatch of churn prediction requests.
//!
//! A request goes through two validation phases before reaching the model:
//! the envelope (`user_id`, `model_params` and their types) and then the
//! feature set of `model_params` against the [`FeatureSchema`]. The first
//! failing phase short-circuits into a `validate_params_errors` envelope.
//! Errors are collected in a list owned by the call, so concurrent requests
//! never see each other's diagnostics.

use common::{FeatureSchema, PredictionResponse};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::model::ModelGateway;

pub const USER_ID: &str = "user_id";
pub const MODEL_PARAMS: &str = "model_params";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Integer,
    Mapping,
}

impl ParamKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamKind::Integer => value.as_i64().is_some(),
            ParamKind::Mapping => value.is_object(),
        }
    }
}

/// Required top-level request keys and their expected types.
pub const QUERY_PARAM_SCHEMA: [(&str, ParamKind); 2] =
    [(USER_ID, ParamKind::Integer), (MODEL_PARAMS, ParamKind::Mapping)];

/// Envelope that passed the first validation phase.
#[derive(Debug)]
pub struct QueryParams<'a> {
    pub user_id: i64,
    pub model_params: &'a Map<String, Value>,
}

pub struct PredictionHandler {
    gateway: Arc<ModelGateway>,
    schema: FeatureSchema,
}

impl PredictionHandler {
    pub fn new(gateway: Arc<ModelGateway>, schema: FeatureSchema) -> Self {
        Self { gateway, schema }
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    /// Handle one request payload and build the response envelope.
    pub fn handle(&self, params: &Value) -> PredictionResponse {
        let mut errors = Vec::new();

        let Some(query) = check_required_query_params(params, &mut errors) else {
            debug!("Not all query params exist: {:?}", errors);
            return PredictionResponse::validation_error(errors);
        };

        let Some(features) = self.check_required_model_params(query.model_params, &mut errors)
        else {
            debug!("Not all model params exist: {:?}", errors);
            return PredictionResponse::validation_error(errors);
        };

        match self.gateway.predict(&features) {
            Ok(probability) => {
                debug!("user_id={} probability={}", query.user_id, probability);
                PredictionResponse::success(query.user_id, probability)
            }
            Err(e) => {
                error!("Prediction failed for user_id={}: {}", query.user_id, e);
                errors.extend(self.gateway.load_errors().iter().cloned());
                PredictionResponse::error(format!("Error while handling request: {}", e), errors)
            }
        }
    }

    /// Second phase: the feature set must equal the schema exactly.
    ///
    /// On success returns the feature vector in schema order, independent of
    /// the key order the caller used.
    pub fn check_required_model_params(
        &self,
        model_params: &Map<String, Value>,
        errors: &mut Vec<String>,
    ) -> Option<Vec<f64>> {
        let keys: Vec<&str> = model_params.keys().map(String::as_str).collect();
        if !self.schema.matches(keys.iter().copied()) {
            errors.push("incorrect model param set".to_string());
            let missing = self.schema.missing(keys.iter().copied());
            if !missing.is_empty() {
                errors.push(format!("missing model params: {}", missing.join(", ")));
            }
            let unexpected = self.schema.unexpected(keys.iter().copied());
            if !unexpected.is_empty() {
                errors.push(format!("unexpected model params: {}", unexpected.join(", ")));
            }
            return None;
        }

        let mut features = Vec::with_capacity(self.schema.len());
        for name in self.schema.names() {
            match model_params.get(name).and_then(Value::as_f64) {
                Some(value) => features.push(value),
                None => errors.push(format!("bad type of model param {}", name)),
            }
        }

        if features.len() == self.schema.len() {
            Some(features)
        } else {
            None
        }
    }
}

/// First phase: presence and type of the top-level keys.
pub fn check_required_query_params<'a>(
    params: &'a Value,
    errors: &mut Vec<String>,
) -> Option<QueryParams<'a>> {
    let Some(object) = params.as_object() else {
        errors.push("request payload must be a JSON object".to_string());
        return None;
    };

    if QUERY_PARAM_SCHEMA
        .iter()
        .any(|(name, _)| !object.contains_key(*name))
    {
        errors.push("unset user_id or model_params dict keys".to_string());
        return None;
    }

    for (name, kind) in QUERY_PARAM_SCHEMA {
        if !kind.accepts(&object[name]) {
            errors.push(format!("bad type of {}", name));
            return None;
        }
    }

    let extra: Vec<&str> = object
        .keys()
        .map(String::as_str)
        .filter(|k| !QUERY_PARAM_SCHEMA.iter().any(|(name, _)| name == k))
        .collect();
    if !extra.is_empty() {
        warn!("Ignoring unexpected request keys: {:?}", extra);
    }

    Some(QueryParams {
        user_id: object[USER_ID].as_i64()?,
        model_params: object[MODEL_PARAMS].as_object()?,
    })
}
