//! Market Connector Service - Main Entry Point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use market_connector::{AppConfig, HANDLERS, app, logging};

#[derive(Debug, Parser)]
#[command(name = "market-connector", version, about = "Financial instrument ingest service")]
struct Cli {
    /// Configuration file, layered under environment variables
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Subscribe handlers, run the scheduler and the HTTP trigger until Ctrl+C
    Serve,
    /// Publish one UpdateFinancialInstruments event and exit
    Trigger {
        /// Exchange codes to update, comma separated; all exchanges when omitted
        #[arg(long, value_delimiter = ',')]
        filters: Vec<String>,
    },
    /// List registered event handlers and exit
    Handlers,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenv::dotenv();
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve);

    if let Command::Handlers = command {
        for entry in HANDLERS {
            println!("{:<28} {}", entry.event_type, entry.description);
        }
        return Ok(());
    }

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    logging::init_logging(&config.log_level, cli.json)?;

    match command {
        Command::Serve => {
            info!("Starting Market Connector Service v{}", env!("CARGO_PKG_VERSION"));
            let shutdown = CancellationToken::new();
            tokio::spawn(shutdown_signal(shutdown.clone()));
            app::serve(config, shutdown).await
        }
        Command::Trigger { filters } => {
            let event_id = app::trigger(&config, filters).await?;
            info!(event_id = %event_id, "Update requested");
            println!("{event_id}");
            Ok(())
        }
        Command::Handlers => Ok(()),
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
    info!("Received Ctrl+C, initiating graceful shutdown");
    shutdown.cancel();
}
