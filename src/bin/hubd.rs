//! OracleBox hub daemon
//!
//! Loads the config, probes the hardware and runs until SIGINT or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oraclebox_hub::{config::AppConfig, daemon::Daemon, hardware::Hardware};

#[derive(Parser)]
#[command(name = "oraclebox-hubd", about = "OracleBox hub daemon", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the command server bind address
    #[arg(long)]
    command_addr: Option<SocketAddr>,

    /// Override the satellite ingest bind address
    #[arg(long)]
    satellite_addr: Option<SocketAddr>,

    /// Run with null drivers (no tuner, LEDs or mixer)
    #[arg(long)]
    no_hardware: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting OracleBox hub {}", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(addr) = cli.command_addr {
        config.network.command_addr = addr;
    }
    if let Some(addr) = cli.satellite_addr {
        config.network.satellite_addr = addr;
    }
    if cli.no_hardware {
        config.hardware.disabled = true;
    }

    let hardware = Hardware::detect(&config);
    let daemon = Daemon::start(config, hardware)
        .await
        .context("starting hub")?;

    wait_for_signal().await?;
    daemon.shutdown().await;
    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => tracing::warn!("SIGINT received"),
        _ = sigterm.recv() => tracing::warn!("SIGTERM received"),
    }
    Ok(())
}
