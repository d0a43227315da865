use anyhow::{bail, Result};
use churn_s::handler::PredictionHandler;
use churn_s::model::ModelGateway;
use churn_s::util;
use clap::Parser;
use common::{config::DEFAULT_MODEL_PATH, FeatureSchema};
use serde_json::json;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect a churn model artifact")]
struct Args {
    /// Path to the CatBoost model exported as JSON.
    #[arg(short, long, default_value = DEFAULT_MODEL_PATH, env = "CHURN_MODEL_PATH")]
    model_path: String,

    /// Run the built-in sample request through the handler.
    #[arg(long)]
    sample: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    util::init_logging();

    let schema = FeatureSchema::churn();
    let gateway = ModelGateway::from_path(&args.model_path, &schema);
    let Some(names) = gateway.feature_names() else {
        for e in gateway.load_errors() {
            eprintln!("{}", e);
        }
        bail!("model {} could not be loaded", args.model_path);
    };
    println!("Model parameter names: {:?}", names);

    if args.sample {
        let handler = PredictionHandler::new(Arc::new(gateway), schema);
        let request = json!({
            "user_id": 123,
            "model_params": {
                "gender": 1,
                "SeniorCitizen": 0,
                "Partner": 0,
                "Dependents": 0,
                "Type": 0.5501916796819537,
                "PaperlessBilling": 1,
                "PaymentMethod": 0.2192247621752094,
                "MonthlyCharges": 50.8,
                "TotalCharges": 288.05,
                "MultipleLines": 0,
                "InternetService": 0.3437455629703251,
                "OnlineSecurity": 0,
                "OnlineBackup": 0,
                "DeviceProtection": 0,
                "TechSupport": 1,
                "StreamingTV": 0,
                "StreamingMovies": 0,
                "days": 245,
                "services": 2
            }
        });
        let response = handler.handle(&request);
        println!("Response: {}", serde_json::to_string(&response)?);
    }

    Ok(())
}
