//! Server module for Sockrelay
//!
//! Binds the SOCKS5 listener and dispatches each accepted connection
//! to its own session task.

#[allow(clippy::module_inception)]
mod server;

pub use server::Server;

use crate::config::Config;
use anyhow::Result;
use tokio::sync::broadcast;

/// Bind and run a server with the given configuration
pub async fn run_server(config: Config, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
    let server = Server::bind(config).await?;
    server.run(shutdown_rx).await
}
