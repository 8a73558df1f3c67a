//! # Sockrelay - SOCKS5 CONNECT Proxy
//!
//! Sockrelay is a small SOCKS5 (RFC 1928) proxy server. It accepts TCP
//! clients, optionally authenticates them with username/password
//! (RFC 1929), opens a TCP connection to the requested target and relays
//! bytes in both directions until either side closes or the session idles
//! out.
//!
//! ## Features
//!
//! - **CONNECT only**: BIND and UDP ASSOCIATE are answered with
//!   "command not supported"
//! - **IPv4, IPv6 and domain targets**: domains are resolved through a
//!   pluggable [`socks::Resolver`]
//! - **Precise reply codes**: resolution and connect failures map onto
//!   the closest SOCKS5 reply
//! - **Bounded everything**: every handshake stage, the outbound connect
//!   and the relay have their own timeouts
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sockrelay::config::load_config;
//! use sockrelay::server::run_server;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     run_server(config, shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! Each accepted connection is driven by a [`socks::Session`]:
//!
//! ```text
//! Greeting -> AuthNegotiation -> Request -> Connecting -> Relaying -> Closed
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod server;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{ProxyError, Socks5ReplyCode, SocksError};
pub use server::{run_server, Server};

/// Version of the Sockrelay library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
