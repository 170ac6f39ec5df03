//! WiSafe2 bridge daemon
//!
//! Connects to the FireAngel WiSafe2 serial bridge, keeps entity states for
//! the bridge and every alarm it relays, and accepts commands on stdin.

mod app;
mod cli;
mod console;

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use wisafe_bridge::{available_ports, Coordinator};
use wisafe_event_bus::EventBus;

use crate::app::WiSafe2;
use crate::cli::{Cli, Commands};
use crate::console::ConsoleCommand;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run {
            config,
            all_entities,
        } => run(&config, all_entities).await,
        Commands::Ports => list_ports(),
        Commands::Send {
            port,
            baud,
            command,
        } => send_once(&port, baud, &command).await,
    }
}

async fn run(config_path: &Path, all_entities: bool) -> Result<()> {
    info!(config = %config_path.display(), "Starting WiSafe2 bridge");

    let config = wisafe_config::load_config(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let app = WiSafe2::new(&config, all_entities);

    let notifications = app.spawn_notification_log();
    let renderer = app.spawn_renderer();

    if !app.coordinator.start().await {
        renderer.abort();
        notifications.abort();
        bail!("could not connect to the bridge on {}", config.serial_port);
    }

    info!("WiSafe2 bridge is running, type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    // stdin closed: keep running until interrupted
                    Ok(None) => {
                        tokio::signal::ctrl_c().await?;
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Console read failed");
                        tokio::signal::ctrl_c().await?;
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<ConsoleCommand>() {
                    Ok(command) => {
                        if !app.execute(command).await {
                            break;
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
        }
    }

    info!("Shutting down...");
    app.coordinator.stop().await;
    renderer.abort();
    notifications.abort();
    Ok(())
}

fn list_ports() -> Result<()> {
    let ports = available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}

async fn send_once(port: &str, baud_rate: u32, command: &str) -> Result<()> {
    let coordinator = Coordinator::new(port, baud_rate, Arc::new(EventBus::new()));
    if !coordinator.start().await {
        bail!("could not connect to the bridge on {}", port);
    }
    let sent = coordinator.send(command).await;
    coordinator.stop().await;

    if !sent {
        bail!("failed to send '{}'", command);
    }
    println!("sent {}", command);
    Ok(())
}
