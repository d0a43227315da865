use anyhow::Result;
use churn_s::api_server::ApiServer;
use churn_s::util::{self, cmd::Args};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    //parse args
    let args = Args::parse();
    util::init_logging();

    let config = args.load_config()?;
    info!(
        "Starting churn service: addr={} model={}",
        config.bind_addr(),
        config.model.path
    );

    let server = Arc::new(ApiServer::new(&config));
    server.run_api_server(&config.bind_addr()).await?;

    info!("Churn service stopped");
    Ok(())
}
