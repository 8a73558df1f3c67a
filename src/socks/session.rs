//! SOCKS5 session state machine
//!
//! One [`Session`] drives a single accepted client connection through
//! `Greeting -> AuthNegotiation -> Request -> Connecting -> Relaying -> Closed`.
//! There is no retry: the first failure ends the session, after the most
//! specific reply code has been sent when the protocol allows one.

use super::auth;
use super::codec::{self, UNSPECIFIED_BOUND};
use super::consts::SOCKS5_VERSION;
use super::relay::{relay, RelayOptions, RelayOutcome};
use super::resolver::{validate_command, Connector};
use super::types::AddressSpec;
use crate::config::SocksConfig;
use crate::error::{Socks5ReplyCode, SocksError};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Time allowed for shutting a socket down on teardown
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Where a session is in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for the client greeting
    Greeting,
    /// Selecting and running an authentication method
    AuthNegotiation,
    /// Reading the CONNECT request
    Request,
    /// Resolving and connecting to the target
    Connecting,
    /// Relaying bytes between client and target
    Relaying,
    /// Both sockets are closed
    Closed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Greeting => write!(f, "greeting"),
            Stage::AuthNegotiation => write!(f, "authentication"),
            Stage::Request => write!(f, "request"),
            Stage::Connecting => write!(f, "connecting"),
            Stage::Relaying => write!(f, "relaying"),
            Stage::Closed => write!(f, "closed"),
        }
    }
}

async fn within<T, F>(limit: Duration, stage: &'static str, fut: F) -> Result<T, SocksError>
where
    F: Future<Output = Result<T, SocksError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| SocksError::Timeout(stage))?
}

/// Read a CONNECT request and return its target
///
/// The address is consumed before the command is checked so that a
/// rejected request leaves nothing unread on the client stream.
pub async fn read_connect_request<S>(stream: &mut S) -> Result<AddressSpec, SocksError>
where
    S: AsyncRead + Unpin,
{
    let header = codec::read_request(stream).await?;
    if header.version != SOCKS5_VERSION {
        return Err(SocksError::Protocol(format!(
            "Unsupported SOCKS version in request: {}",
            header.version
        )));
    }

    let target = codec::read_address(stream, header.addr_type).await?;
    validate_command(&header)?;

    Ok(target)
}

/// Per-connection SOCKS5 state
pub struct Session<S> {
    client: S,
    config: Arc<SocksConfig>,
    connector: Connector,
    stage: Stage,
    authenticated: bool,
    target: Option<AddressSpec>,
    target_stream: Option<TcpStream>,
    reply_sent: bool,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Create a session for an accepted client stream
    pub fn new(client: S, config: Arc<SocksConfig>, connector: Connector) -> Self {
        Session {
            client,
            config,
            connector,
            stage: Stage::Greeting,
            authenticated: false,
            target: None,
            target_stream: None,
            reply_sent: false,
        }
    }

    /// Current stage
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Whether the client has passed authentication
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// The requested target, once the request has been parsed
    pub fn target(&self) -> Option<&AddressSpec> {
        self.target.as_ref()
    }

    /// Run the session to completion
    ///
    /// Returns how the relay ended, or the error that ended the session
    /// before relaying began. Both sockets are closed either way.
    pub async fn run(mut self) -> Result<RelayOutcome, SocksError> {
        let result = match self.handshake().await {
            Ok(target) => {
                self.stage = Stage::Relaying;
                let opts = RelayOptions {
                    buffer_size: self.config.relay_buffer_size,
                    idle_timeout: self.config.idle_timeout(),
                };
                let target = self.target_stream.insert(target);
                let outcome = relay(&mut self.client, target, opts).await;
                info!(
                    "Session ended ({}): {} bytes up, {} bytes down",
                    outcome.end, outcome.client_to_target, outcome.target_to_client
                );
                Ok(outcome)
            }
            Err(err) => {
                self.reject(&err).await;
                Err(err)
            }
        };

        self.close().await;
        result
    }

    /// Everything up to and including the success reply
    async fn handshake(&mut self) -> Result<TcpStream, SocksError> {
        let limit = self.config.handshake_timeout();

        let greeting = within(limit, "greeting", codec::read_greeting(&mut self.client)).await?;
        debug!("Client offered methods: {:?}", greeting.methods);

        self.stage = Stage::AuthNegotiation;
        let method = within(
            limit,
            "authentication",
            auth::negotiate(&mut self.client, &greeting.methods, &self.config),
        )
        .await?;
        self.authenticated = true;
        debug!("Authentication completed with method: {:?}", method);

        self.stage = Stage::Request;
        let target = within(limit, "request", read_connect_request(&mut self.client)).await?;
        info!("SOCKS5 CONNECT request to {}", target);
        self.target = Some(target.clone());

        self.stage = Stage::Connecting;
        let stream = self.connector.connect(&target).await?;

        self.reply_sent = true;
        let reply =
            codec::write_reply(&mut self.client, Socks5ReplyCode::Succeeded, UNSPECIFIED_BOUND);
        within(limit, "reply", reply).await?;
        info!("SOCKS5 tunnel established to {}", target);

        Ok(stream)
    }

    /// Send the reply code for `err` if the protocol still expects one
    async fn reject(&mut self, err: &SocksError) {
        let expects_reply = matches!(self.stage, Stage::Request | Stage::Connecting);
        if !expects_reply || self.reply_sent || err.is_transport() {
            return;
        }

        let code = err.reply_code();
        self.reply_sent = true;
        let write = codec::write_reply(&mut self.client, code, UNSPECIFIED_BOUND);
        match tokio::time::timeout(CLOSE_GRACE, write).await {
            Ok(Ok(())) => debug!("Sent reply {:?} during {}", code, self.stage),
            Ok(Err(e)) => debug!("Failed to send reply {:?}: {}", code, e),
            Err(_) => debug!("Timed out sending reply {:?}", code),
        }
    }

    /// Close both sockets; safe to call more than once
    async fn close(&mut self) {
        if self.stage == Stage::Closed {
            return;
        }

        let _ = tokio::time::timeout(CLOSE_GRACE, self.client.shutdown()).await;
        if let Some(mut target) = self.target_stream.take() {
            let _ = tokio::time::timeout(CLOSE_GRACE, target.shutdown()).await;
        }

        self.stage = Stage::Closed;
    }
}
