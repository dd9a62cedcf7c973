//! Agent entry point.
//!
//! Loads the device config, wires the IoT hub broker into the agent loop,
//! and runs until an OS signal requests shutdown.

use clap::{Parser, Subcommand};
use rewst_agent::config::Device;
use rewst_agent::observability;
use rewst_agent::transport::mqtt::IotHubBroker;
use rewst_agent::{shutdown, Agent};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

/// Rewst remote device agent.
#[derive(Parser)]
#[command(name = "rewst_remote_agent")]
#[command(about = "Persistent remote-command agent for Rewst-managed devices")]
#[command(version)]
struct Cli {
    /// Device configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent
    Run,
    /// Validate the device configuration
    Config {
        /// Show the loaded configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let device = match load_configuration(&cli.config) {
        Ok(device) => device,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            process::exit(1);
        }
    };

    observability::init_for_device(&device);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        os = std::env::consts::OS,
        "starting rewst remote agent"
    );

    let result = match cli.command {
        Commands::Run => run_agent(device).await,
        Commands::Config { show } => handle_config_command(device, show),
    };

    if let Err(e) = result {
        error!("command failed: {e}");
        process::exit(1);
    }

    info!("agent shutdown complete");
}

fn load_configuration(config_path: &Option<PathBuf>) -> Result<Device, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => Ok(Device::load_from_file(path)?),
        None => {
            let default = PathBuf::from("config.json");
            if default.exists() {
                return Ok(Device::load_from_file(&default)?);
            }
            Err("no configuration file found; pass one with -c/--config or create config.json"
                .into())
        }
    }
}

async fn run_agent(device: Device) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        device_id = %device.device_id,
        org_id = %device.rewst_org_id,
        "agent starting"
    );

    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let mut agent = Agent::new(device, IotHubBroker::new(), shutdown_rx);
    agent.run().await?;

    signal_task.abort();
    Ok(())
}

fn handle_config_command(device: Device, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", serde_json::to_string_pretty(&device)?);
    }

    info!("configuration is valid");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
