use clap::Parser;
use std::sync::Arc;
use trader_graph::api::{Cli, CliHandler};
use trader_graph::config::AppConfig;
use trader_graph::{AlchemyClient, SystemClock, TraderGraphService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Quieter than the server unless RUST_LOG says otherwise
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_with_file(path)?,
        None => AppConfig::load()?,
    };

    let client = AlchemyClient::new(&config.provider)?;
    let service = Arc::new(TraderGraphService::new(Arc::new(client), &config, Arc::new(SystemClock)));
    let handler = CliHandler::new(service);

    match handler.execute_command(&cli.command).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
