use anyhow::{Context, Result};
use clap::Parser;
use common::config::{ServiceConfig, DEFAULT_HOST, DEFAULT_MODEL_PATH, DEFAULT_PORT};
use tracing::info;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "churn prediction API server", long_about = None)]
pub struct Args {
    /// TOML config file; its values replace the command line ones.
    #[arg(short('f'), long)]
    pub config: Option<String>,

    /// Address to bind the HTTP server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "CHURN_HOST")]
    pub host: String,

    /// Port to bind the HTTP server to.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "CHURN_PORT")]
    pub port: u16,

    /// Path to the CatBoost model exported as JSON.
    #[arg(long, default_value = DEFAULT_MODEL_PATH, env = "CHURN_MODEL_PATH")]
    pub model_path: String,
}

impl Args {
    pub fn load_config(&self) -> Result<ServiceConfig> {
        if let Some(config_path) = &self.config {
            let config = ServiceConfig::from_file(config_path)
                .with_context(|| format!("Failed to load config from {}", config_path))?;
            info!("Loaded config from {}", config_path);
            Ok(config)
        } else {
            let mut config = ServiceConfig::default();
            config.server.host = self.host.clone();
            config.server.port = self.port;
            config.model.path = self.model_path.clone();
            Ok(config)
        }
    }
}
