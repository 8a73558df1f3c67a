//! SOCKS5 listener
//!
//! Accepts client connections and runs one [`Session`] task per connection.

use crate::config::{Config, SocksConfig};
use crate::error::ProxyError;
use crate::socks::{Connector, Resolver, Session, SystemResolver};
use crate::transport::SocketOpts;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Pause after a failed accept, e.g. when out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A bound SOCKS5 server
pub struct Server {
    listener: TcpListener,
    config: Arc<SocksConfig>,
    socket_opts: SocketOpts,
    resolver: Arc<dyn Resolver>,
    limit: Option<Arc<Semaphore>>,
}

impl Server {
    /// Validate the configuration and bind the listener
    pub async fn bind(config: Config) -> Result<Self, ProxyError> {
        config.validate()?;

        let listener = TcpListener::bind(&config.server.listen_addr)
            .await
            .map_err(|source| ProxyError::Bind {
                addr: config.server.listen_addr.clone(),
                source,
            })?;

        Ok(Server {
            listener,
            socket_opts: SocketOpts::from_tcp_config(&config.tcp),
            limit: config
                .server
                .max_connections
                .map(|n| Arc::new(Semaphore::new(n))),
            config: Arc::new(config.socks),
            resolver: Arc::new(SystemResolver),
        })
    }

    /// Replace the name resolver used for domain targets
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, ProxyError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until a shutdown signal arrives
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        info!("SOCKS5 server listening on {}", self.local_addr()?);
        if self.config.auth_required {
            info!("Username/password authentication required");
        }

        let connector = Connector::new(self.resolver.clone(), self.config.connect_timeout())
            .with_socket_opts(self.socket_opts.clone());

        loop {
            let permit = match &self.limit {
                Some(limit) => tokio::select! {
                    permit = limit.clone().acquire_owned() => Some(permit?),
                    _ = shutdown_rx.recv() => break,
                },
                None => None,
            };

            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
                _ = shutdown_rx.recv() => break,
            };

            self.socket_opts.hint(&stream);
            let session = Session::new(stream, self.config.clone(), connector.clone());

            tokio::spawn(
                async move {
                    let _permit = permit;
                    debug!("Accepted connection");
                    match session.run().await {
                        Ok(_) => {}
                        Err(e) if e.is_transport() => debug!("Session aborted: {}", e),
                        Err(e) => warn!("Session rejected: {}", e),
                    }
                }
                .instrument(info_span!("session", peer = %peer)),
            );
        }

        info!("Shutdown signal received, no longer accepting connections");
        Ok(())
    }
}
