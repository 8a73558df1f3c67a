//! Test utilities and mocks for Sockrelay
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use sockrelay::config::Config;
use sockrelay::socks::Resolver;
use sockrelay::Server;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// A loopback port with nothing listening on it
pub async fn refused_port() -> u16 {
    let (_listener, addr) = create_test_listener().await;
    addr.port()
}

/// Start an echo server that serves one connection
pub async fn spawn_echo_server() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (mut reader, mut writer) = stream.split();
        let _ = tokio::io::copy(&mut reader, &mut writer).await;
    });
    addr
}

/// Resolver answering from a fixed table; unknown names fail
#[derive(Debug, Default)]
pub struct MapResolver {
    hosts: HashMap<String, SocketAddr>,
}

impl MapResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a host name to an address; the requested port replaces its port
    pub fn host(mut self, name: &str, addr: SocketAddr) -> Self {
        self.hosts.insert(name.to_string(), addr);
        self
    }
}

#[async_trait]
impl Resolver for MapResolver {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        match self.hosts.get(host) {
            Some(addr) => Ok(vec![SocketAddr::new(addr.ip(), port)]),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "unknown host")),
        }
    }
}

/// Test configuration builder
pub struct TestConfigBuilder {
    credentials: Option<(String, String)>,
    handshake_timeout: u64,
    idle_timeout: u64,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        TestConfigBuilder {
            credentials: None,
            handshake_timeout: 2,
            idle_timeout: 5,
        }
    }
}

impl TestConfigBuilder {
    /// Create a new test config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Require username/password authentication
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }

    /// Set the handshake stage timeout in seconds
    pub fn handshake_timeout(mut self, secs: u64) -> Self {
        self.handshake_timeout = secs;
        self
    }

    /// Set the relay idle timeout in seconds
    pub fn idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout = secs;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        let mut config = Config::default();
        config.server.listen_addr = "127.0.0.1:0".to_string();
        config.socks.handshake_timeout = self.handshake_timeout;
        config.socks.connect_timeout = 2;
        config.socks.idle_timeout = self.idle_timeout;
        if let Some((username, password)) = self.credentials {
            config.socks.auth_required = true;
            config.socks.username = Some(username);
            config.socks.password = Some(password);
        }
        config
    }
}

/// A server running in the background for one test
pub struct TestServer {
    /// Address clients connect to
    pub addr: SocketAddr,
    shutdown_tx: broadcast::Sender<bool>,
}

impl TestServer {
    /// Start a server with the system resolver
    pub async fn start(config: Config) -> Self {
        let server = Server::bind(config).await.unwrap();
        Self::spawn(server)
    }

    /// Start a server with the given resolver
    pub async fn start_with_resolver(config: Config, resolver: Arc<dyn Resolver>) -> Self {
        let server = Server::bind(config).await.unwrap().with_resolver(resolver);
        Self::spawn(server)
    }

    fn spawn(server: Server) -> Self {
        let addr = server.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(server.run(shutdown_rx));
        TestServer { addr, shutdown_tx }
    }

    /// Open a client connection to the server
    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Read everything until the server closes, failing after `limit`
pub async fn read_until_close(stream: &mut TcpStream, limit: Duration) -> Vec<u8> {
    let mut out = Vec::new();
    tokio::time::timeout(limit, stream.read_to_end(&mut out))
        .await
        .expect("server did not close the connection")
        .unwrap();
    out
}

/// Run the no-auth greeting and return the selected method
pub async fn greet_no_auth(stream: &mut TcpStream) -> u8 {
    stream
        .write_all(&socks5_mock::create_auth_request_no_auth())
        .await
        .unwrap();
    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply[0], 0x05);
    reply[1]
}

/// Read one ten-byte request reply
pub async fn read_reply(stream: &mut TcpStream) -> [u8; 10] {
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    reply
}

/// Mock SOCKS5 handshake data
pub mod socks5_mock {
    use sockrelay::socks::consts::*;

    /// Create a no-auth method selection request
    pub fn create_auth_request_no_auth() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }

    /// Create a password auth method selection request
    pub fn create_auth_request_password() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_PASSWORD]
    }

    /// Create a username/password sub-negotiation request
    pub fn create_password_auth(username: &str, password: &str) -> Vec<u8> {
        let mut auth = vec![SOCKS5_AUTH_VERSION, username.len() as u8];
        auth.extend_from_slice(username.as_bytes());
        auth.push(password.len() as u8);
        auth.extend_from_slice(password.as_bytes());
        auth
    }

    /// Create a connect command to IPv4 address
    pub fn create_connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
        ];
        cmd.extend_from_slice(&ip);
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// Create a connect command to domain
    pub fn create_connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        cmd.extend_from_slice(domain.as_bytes());
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// Create a request with an arbitrary command byte to an IPv4 address
    pub fn create_command_ipv4(command: u8, ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = create_connect_ipv4(ip, port);
        cmd[1] = command;
        cmd
    }
}
