//! Saga node binary

use settlement_saga::{Config, Saga};
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Payrail node");

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    let saga = Saga::start(&config)?;
    tracing::info!("Saga components wired");

    tokio::signal::ctrl_c().await?;

    saga.quiesce().await;
    tracing::info!("Shutting down Payrail node");
    Ok(())
}
