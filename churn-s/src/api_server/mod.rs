pub mod handle_api;
pub mod churn;

use common::{config::ServiceConfig, FeatureSchema};
use std::sync::Arc;
use tracing::{info, warn};

use crate::handler::PredictionHandler;
use crate::model::ModelGateway;

pub struct ApiServer {
    pub handler: Arc<PredictionHandler>,
}

impl ApiServer {
    /// Load the model and build the shared request handler.
    ///
    /// A model that fails to load does not fail startup; the server comes up
    /// and answers prediction requests with the recorded load errors.
    pub fn new(config: &ServiceConfig) -> Self {
        let schema = FeatureSchema::churn();
        let gateway = ModelGateway::from_path(&config.model.path, &schema);
        if gateway.is_loaded() {
            info!("Churn model ready: {}", config.model.path);
        } else {
            warn!(
                "Serving without a model, load errors: {:?}",
                gateway.load_errors()
            );
        }
        Self::with_handler(PredictionHandler::new(Arc::new(gateway), schema))
    }

    pub fn with_handler(handler: PredictionHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}
