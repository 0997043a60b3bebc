use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use serial_line_logger::{config, logger};
use simple_logger::SimpleLogger;

#[tokio::main]
async fn main() -> Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()?;

    info!("Starting serial-line-logger");

    // Parse command-line arguments
    let cli = config::Cli::parse();

    // Load configuration
    let config = config::load_config(&cli)?;
    info!(
        "Configuration loaded: port={}, baud_rate={}, timestamp={}",
        config.port, config.baud_rate, config.timestamp
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let summary = logger::run(&config, shutdown)
        .await
        .with_context(|| format!("Logging from {} failed", config.port))?;

    info!(
        "Stopped after {} records ({} empty reads)",
        summary.records, summary.empty_reads
    );

    Ok(())
}
