//! Main entry point for the report-extractor CLI

use clap::Parser;
use report_extractor::cli::{Cli, Commands};
use report_extractor::metrics;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("report_extractor=info"));

    // Logs go to stderr; stdout carries the command result
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    // A .env file fills in variables the environment does not already set
    let dotenv = dotenvy::dotenv();

    init_tracing();

    if let Ok(path) = &dotenv {
        debug!(path = %path.display(), "Loaded .env file");
    }

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = metrics::init_metrics(addr).await {
            warn!("Metrics exporter disabled: {}", e);
        }
    }

    let result = match cli.command {
        Commands::Run(ref args) => args.execute(&cli).await,
        Commands::Invoke(ref invoke) => invoke.execute(&cli).await,
    };

    if let Err(e) = result {
        match e.class() {
            Some(class) => error!(error_class = %class, "Command failed: {}", e),
            None => error!("Command failed: {}", e),
        }
        std::process::exit(1);
    }
}
