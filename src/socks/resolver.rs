//! Request resolution and outbound connect
//!
//! Validates the requested command, turns an [`AddressSpec`] into socket
//! addresses and opens the outbound TCP connection, classifying every
//! failure so the session can answer with the matching reply code.

use super::types::{AddressSpec, RequestHeader, SocksCommand};
use crate::error::{ConnectFailure, SocksError};
use crate::transport::SocketOpts;
use async_trait::async_trait;
use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

/// Name resolution collaborator
///
/// Implementations turn a host name into candidate socket addresses.
/// An empty result is treated the same as a failed lookup.
#[async_trait]
pub trait Resolver: Send + Sync + Debug {
    /// Resolve `host` to the addresses to try, in order
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;
}

/// Resolver backed by the operating system via [`tokio::net::lookup_host`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok(tokio::net::lookup_host((host, port)).await?.collect())
    }
}

/// Accept only CONNECT; every other command is rejected with its raw byte
pub fn validate_command(header: &RequestHeader) -> Result<SocksCommand, SocksError> {
    match SocksCommand::from_byte(header.command) {
        Some(SocksCommand::Connect) => Ok(SocksCommand::Connect),
        _ => Err(SocksError::UnsupportedCommand(header.command)),
    }
}

/// Resolves targets and opens outbound connections
#[derive(Debug, Clone)]
pub struct Connector {
    resolver: Arc<dyn Resolver>,
    connect_timeout: Duration,
    socket_opts: SocketOpts,
}

impl Connector {
    /// Create a connector using the given resolver and timeout
    pub fn new(resolver: Arc<dyn Resolver>, connect_timeout: Duration) -> Self {
        Connector {
            resolver,
            connect_timeout,
            socket_opts: SocketOpts::default(),
        }
    }

    /// Set socket options applied to outbound connections
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Resolve a target to the addresses to try
    ///
    /// Literal IPs are returned as-is; domains go through the resolver,
    /// bounded by the connect timeout. A name that is empty or not UTF-8
    /// cannot be looked up and fails like an unknown host.
    pub async fn resolve(&self, target: &AddressSpec) -> Result<Vec<SocketAddr>, SocksError> {
        let port = target.port();
        let host = match target {
            AddressSpec::Domain(..) => match target.domain().filter(|h| !h.is_empty()) {
                Some(host) => host.to_string(),
                None => {
                    debug!("Unresolvable domain name: {:?}", target);
                    return Err(SocksError::ResolutionFailed(target.to_string()));
                }
            },
            _ => return Ok(target.socket_addr().into_iter().collect()),
        };

        let lookup = tokio::time::timeout(self.connect_timeout, self.resolver.resolve(&host, port));
        let result = lookup.await;
        let addrs = match result {
            Ok(Ok(addrs)) => addrs,
            Ok(Err(e)) => {
                debug!("Failed to resolve {}: {}", host, e);
                return Err(SocksError::ResolutionFailed(host));
            }
            Err(_) => {
                debug!("Resolution of {} timed out", host);
                return Err(SocksError::ResolutionFailed(host));
            }
        };

        if addrs.is_empty() {
            return Err(SocksError::ResolutionFailed(host));
        }
        Ok(addrs)
    }

    /// Resolve and connect to a target
    ///
    /// Candidates are tried in order until one connects; the whole attempt
    /// shares a single connect deadline and the last failure is reported.
    pub async fn connect(&self, target: &AddressSpec) -> Result<TcpStream, SocksError> {
        let addrs = self.resolve(target).await?;
        let deadline = Instant::now() + self.connect_timeout;
        let mut reason = ConnectFailure::Other;

        for addr in addrs {
            debug!("Connecting to target: {}", addr);
            match tokio::time::timeout_at(deadline, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    self.socket_opts.hint(&stream);
                    return Ok(stream);
                }
                Ok(Err(e)) => {
                    debug!("Failed to connect to {}: {}", addr, e);
                    reason = ConnectFailure::from(&e);
                }
                Err(_) => {
                    debug!("Connection timeout to {}", addr);
                    reason = ConnectFailure::TimedOut;
                    break;
                }
            }
        }

        Err(SocksError::ConnectFailed {
            target: target.to_string(),
            reason,
        })
    }
}
