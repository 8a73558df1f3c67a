//! Server configuration types
//!
//! Defines the main configuration structures for the Sockrelay server.

use super::TcpConfig;
use crate::error::ProxyError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest relay chunk accepted by validation
pub const MIN_RELAY_BUFFER_SIZE: usize = 8 * 1024;

/// Largest relay chunk accepted by validation
pub const MAX_RELAY_BUFFER_SIZE: usize = 64 * 1024;

/// Longest username or password RFC 1929 can carry
const MAX_CREDENTIAL_LEN: usize = 255;

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// SOCKS5 session configuration
    #[serde(default)]
    pub socks: SocksConfig,

    /// Socket options for accepted and outbound connections
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl Config {
    /// Validate every section of the configuration
    pub fn validate(&self) -> Result<(), ProxyError> {
        self.server.validate()?;
        self.socks.validate()
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:1080".to_string()
}

/// Listener configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address to accept SOCKS5 clients on (e.g., "0.0.0.0:1080")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Upper bound on concurrently running sessions
    #[serde(default)]
    pub max_connections: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: None,
        }
    }
}

impl ServerConfig {
    /// Validate the listener configuration
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.listen_addr.trim().is_empty() {
            return Err(ProxyError::Config("listen_addr must not be empty".to_string()));
        }
        if self.max_connections == Some(0) {
            return Err(ProxyError::Config(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_handshake_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    120
}

fn default_relay_buffer_size() -> usize {
    16 * 1024
}

/// SOCKS5 session configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SocksConfig {
    /// Require username/password authentication
    #[serde(default)]
    pub auth_required: bool,

    /// Username for SOCKS5 auth
    #[serde(default)]
    pub username: Option<String>,

    /// Password for SOCKS5 auth
    #[serde(default)]
    pub password: Option<String>,

    /// Per-stage timeout for greeting, auth and request reads, in seconds
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout: u64,

    /// Outbound resolve + connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Relay idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,

    /// Relay chunk size in bytes
    #[serde(default = "default_relay_buffer_size")]
    pub relay_buffer_size: usize,
}

impl Default for SocksConfig {
    fn default() -> Self {
        Self {
            auth_required: false,
            username: None,
            password: None,
            handshake_timeout: default_handshake_timeout(),
            connect_timeout: default_connect_timeout(),
            idle_timeout: default_idle_timeout(),
            relay_buffer_size: default_relay_buffer_size(),
        }
    }
}

impl SocksConfig {
    /// Check if authentication credentials are configured
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Handshake stage timeout
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout)
    }

    /// Outbound connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Relay idle timeout
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.auth_required && !self.has_credentials() {
            return Err(ProxyError::Config(
                "Authentication required but no credentials configured".to_string(),
            ));
        }

        for (name, value) in [("username", &self.username), ("password", &self.password)] {
            if let Some(value) = value {
                if value.is_empty() || value.len() > MAX_CREDENTIAL_LEN {
                    return Err(ProxyError::Config(format!(
                        "{} must be between 1 and {} bytes",
                        name, MAX_CREDENTIAL_LEN
                    )));
                }
            }
        }

        if self.handshake_timeout == 0 || self.connect_timeout == 0 || self.idle_timeout == 0 {
            return Err(ProxyError::Config("timeouts must be non-zero".to_string()));
        }

        if !(MIN_RELAY_BUFFER_SIZE..=MAX_RELAY_BUFFER_SIZE).contains(&self.relay_buffer_size) {
            return Err(ProxyError::Config(format!(
                "relay_buffer_size must be between {} and {} bytes",
                MIN_RELAY_BUFFER_SIZE, MAX_RELAY_BUFFER_SIZE
            )));
        }

        Ok(())
    }
}
