use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod gateway;
mod server;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "chartlab")]
#[command(about = "Serve Helm charts straight out of GitLab repositories")]
struct Args {
    /// Optional YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Custom port to listen for HTTP requests
    #[arg(long)]
    http_port: Option<u16>,

    /// Custom port to listen for HTTPS requests
    #[arg(long)]
    https_port: Option<u16>,

    /// Verbose logs for debugging
    #[arg(short, long)]
    verbose: bool,

    /// Check the configuration and exit
    #[arg(long)]
    validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "chartlab=debug,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("ChartLab is starting");

    let mut config = match &args.config {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };

    // CLI flags win over the config file
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(port) = args.https_port {
        config.https_port = port;
    }
    if args.verbose {
        config.verbose = true;
    }

    config.validate()?;

    if args.validate_config {
        info!("Configuration is valid");
        return Ok(());
    }

    // Blocks until one of the listeners dies; that error takes the process down
    match server::run(Arc::new(config)).await {
        Ok(()) => Ok(()),
        Err(err) => {
            error!("{}", err);
            Err(err)
        }
    }
}
