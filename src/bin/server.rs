use clap::Parser;
use std::sync::Arc;
use trader_graph::api::ApiServer;
use trader_graph::config::AppConfig;
use trader_graph::logging::init_logging;
use trader_graph::{AlchemyClient, SystemClock, TraderGraphService};

#[derive(Parser)]
#[command(name = "trader-graph-server")]
#[command(about = "HTTP API serving ranked trader graphs for token contracts")]
#[command(version)]
struct Args {
    /// Configuration file, overrides CONFIG_FILE
    #[arg(long)]
    config: Option<String>,

    /// Listen address
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load_with_file(path)?,
        None => AppConfig::load()?,
    };
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }

    init_logging(&config.logging)?;

    if config.provider.api_key.is_empty() {
        log::warn!("ALCHEMY_API_KEY is not set, upstream requests will be rejected");
    }

    let client = AlchemyClient::new(&config.provider)?;
    let service = Arc::new(TraderGraphService::new(Arc::new(client), &config, Arc::new(SystemClock)));

    let server = ApiServer::new(service, &config.api);
    log::info!("Starting HTTP API server on {}:{}", server.host, server.port);

    if let Err(e) = server.start().await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
