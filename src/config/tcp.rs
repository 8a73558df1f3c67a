//! TCP socket configuration
//!
//! Options applied to both accepted client sockets and outbound target sockets.

use serde::{Deserialize, Serialize};

fn default_nodelay() -> bool {
    true
}

/// Default keepalive seconds
fn default_keepalive_secs() -> u64 {
    30
}

/// Default keepalive interval
fn default_keepalive_interval() -> u64 {
    10
}

/// TCP socket configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TcpConfig {
    /// Enable TCP_NODELAY
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,

    /// TCP keepalive timeout in seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// TCP keepalive interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            nodelay: default_nodelay(),
            keepalive_secs: default_keepalive_secs(),
            keepalive_interval: default_keepalive_interval(),
        }
    }
}
