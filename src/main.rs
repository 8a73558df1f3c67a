//! Sockrelay - SOCKS5 CONNECT proxy
//!
//! This is the main entry point for the Sockrelay application.

use anyhow::Result;
use clap::Parser;
use sockrelay::config::{load_config, Config};
use sockrelay::server::run_server;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Sockrelay - SOCKS5 proxy supporting CONNECT with optional password auth
#[derive(Parser, Debug)]
#[command(name = "sockrelay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the configuration file
    #[arg(long)]
    listen: Option<String>,

    /// Username for password authentication
    #[arg(short, long, requires = "password")]
    username: Option<String>,

    /// Password for password authentication
    #[arg(short, long, requires = "username")]
    password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let config = load_config(path)?;
                info!("Configuration loaded from: {:?}", path);
                config
            }
            None => Config::default(),
        };

        if let Some(listen) = self.listen {
            config.server.listen_addr = listen;
        }
        if let (Some(username), Some(password)) = (self.username, self.password) {
            config.socks.username = Some(username);
            config.socks.password = Some(password);
            config.socks.auth_required = true;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    info!("Sockrelay v{}", sockrelay::VERSION);
    let config = args.into_config()?;

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // Handle Ctrl+C and termination signals (cross-platform)
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx_clone.send(true);
    });

    run_server(config, shutdown_rx).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("Failed to setup SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down...");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    // On Windows, only handle Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl+C, shutting down...");
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
