use serde::{Deserialize, Serialize};
use std::collections::HashSet;
pub mod config;

/// Error message carried by every request rejected during validation.
pub const VALIDATE_PARAMS_ERRORS: &str = "validate_params_errors";

/// Probability above which a user is reported as churning.
pub const CHURN_THRESHOLD: f64 = 0.5;

// Canonical positional order of the churn model inputs
pub const CHURN_FEATURES: [&str; 19] = [
    "gender",
    "SeniorCitizen",
    "Partner",
    "Dependents",
    "Type",
    "PaperlessBilling",
    "PaymentMethod",
    "MonthlyCharges",
    "TotalCharges",
    "MultipleLines",
    "InternetService",
    "OnlineSecurity",
    "OnlineBackup",
    "DeviceProtection",
    "TechSupport",
    "StreamingTV",
    "StreamingMovies",
    "days",
    "services",
];

/// Ordered set of feature names the model expects.
///
/// The order is the order of the feature vector passed to the model, so
/// values must always be extracted through [`FeatureSchema::names`] and never
/// through the iteration order of the caller's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Schema of the churn model.
    pub fn churn() -> Self {
        Self::new(CHURN_FEATURES)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Exact key set comparison, ignoring order.
    pub fn matches<'a, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keys: HashSet<&str> = keys.into_iter().collect();
        keys.len() == self.names.len() && self.names.iter().all(|n| keys.contains(n.as_str()))
    }

    /// Schema names absent from `keys`, in schema order.
    pub fn missing<'a, I>(&self, keys: I) -> Vec<&str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keys: HashSet<&str> = keys.into_iter().collect();
        self.names
            .iter()
            .map(String::as_str)
            .filter(|name| !keys.contains(*name))
            .collect()
    }

    /// Keys not part of the schema, sorted.
    pub fn unexpected<'a, I>(&self, keys: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut extra: Vec<&str> = keys.into_iter().filter(|k| !self.contains(k)).collect();
        extra.sort_unstable();
        extra.dedup();
        extra
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::churn()
    }
}

/// Response envelope returned for every prediction request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PredictionResponse {
    Success {
        user_id: i64,
        probability: f64,
        is_churn: u8,
    },
    Error {
        error: String,
        details: Vec<String>,
    },
}

impl PredictionResponse {
    pub fn success(user_id: i64, probability: f64) -> Self {
        PredictionResponse::Success {
            user_id,
            probability,
            is_churn: is_churn(probability),
        }
    }

    pub fn error(error: impl Into<String>, details: Vec<String>) -> Self {
        PredictionResponse::Error {
            error: error.into(),
            details,
        }
    }

    pub fn validation_error(details: Vec<String>) -> Self {
        Self::error(VALIDATE_PARAMS_ERRORS, details)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PredictionResponse::Error { .. })
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, PredictionResponse::Error { error, .. } if error == VALIDATE_PARAMS_ERRORS)
    }

    pub fn probability(&self) -> Option<f64> {
        match self {
            PredictionResponse::Success { probability, .. } => Some(*probability),
            PredictionResponse::Error { .. } => None,
        }
    }
}

#[inline]
pub fn is_churn(probability: f64) -> u8 {
    u8::from(probability > CHURN_THRESHOLD)
}
