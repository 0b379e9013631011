use clap::{Parser, Subcommand};
use std::sync::Arc;
use thiserror::Error;

use crate::blockchain::{supported_chain_keys, Chain, DEFAULT_CHAIN};
use crate::config::AppConfig;
use crate::error::{ConfigError, GraphError};
use crate::models::{TimeWindow, TraderQueryOutcome};
use crate::pipeline::TraderGraphService;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "trader-graph")]
#[command(about = "Build ranked trader graphs from on-chain token transfers")]
#[command(version)]
pub struct Cli {
    /// Configuration file, overrides CONFIG_FILE
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Print the trader graph for a token contract as JSON
    Traders {
        /// Token contract address
        #[arg(long)]
        address: String,
        /// Time window: all, 2h, 6h, 24h, 3d, 7d or 30d
        #[arg(long, default_value = "all")]
        time: String,
        /// Chain key
        #[arg(long, default_value = "eth")]
        chain: String,
        /// Indent the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// List supported chains
    Chains,
    /// Print a configuration file with every default value
    SampleConfig,
}

pub struct CliHandler {
    service: Arc<TraderGraphService>,
}

impl CliHandler {
    pub fn new(service: Arc<TraderGraphService>) -> Self {
        Self { service }
    }

    /// Runs a command and returns what should be printed
    pub async fn execute_command(&self, command: &Commands) -> Result<String, CliError> {
        match command {
            Commands::Traders {
                address,
                time,
                chain,
                pretty,
            } => {
                let chain = Chain::parse(chain).map_err(GraphError::from)?;
                let window = TimeWindow::parse_lenient(time);
                let outcome = self.service.query(address, window, chain).await?;
                render(&outcome, *pretty)
            }
            Commands::Chains => Ok(format_chains()),
            Commands::SampleConfig => Ok(AppConfig::generate_sample_config()?),
        }
    }
}

fn render(outcome: &TraderQueryOutcome, pretty: bool) -> Result<String, CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(outcome)?
    } else {
        serde_json::to_string(outcome)?
    };
    Ok(json)
}

fn format_chains() -> String {
    supported_chain_keys()
        .into_iter()
        .map(|key| {
            if key == DEFAULT_CHAIN.key() {
                format!("{} (default)", key)
            } else {
                key
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
