//! Bidirectional relay engine
//!
//! Copies bytes between the client and the target until either side
//! closes, a write fails, or nothing happens for the idle timeout. The
//! relay is symmetric: once one direction ends the whole relay ends.

use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Relay tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOptions {
    /// Largest chunk read from either side before it is written to the peer
    pub buffer_size: usize,
    /// Maximum time without readiness on either stream; also bounds each write
    pub idle_timeout: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        RelayOptions {
            buffer_size: 16 * 1024,
            idle_timeout: Duration::from_secs(120),
        }
    }
}

/// Which event ended the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The client closed its side
    ClientClosed,
    /// The target closed its side
    TargetClosed,
    /// Reading from or writing to the client failed
    ClientError,
    /// Reading from or writing to the target failed
    TargetError,
    /// No data flowed for the idle timeout
    IdleTimeout,
}

impl fmt::Display for RelayEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayEnd::ClientClosed => write!(f, "client closed"),
            RelayEnd::TargetClosed => write!(f, "target closed"),
            RelayEnd::ClientError => write!(f, "client error"),
            RelayEnd::TargetError => write!(f, "target error"),
            RelayEnd::IdleTimeout => write!(f, "idle timeout"),
        }
    }
}

/// Summary of a finished relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Why the relay stopped
    pub end: RelayEnd,
    /// Bytes copied from client to target
    pub client_to_target: u64,
    /// Bytes copied from target to client
    pub target_to_client: u64,
}

enum Ready {
    Client(io::Result<usize>),
    Target(io::Result<usize>),
    Idle,
}

/// Write a whole chunk, bounded by `limit`
async fn forward<W>(peer: &mut W, chunk: &[u8], limit: Duration) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    match tokio::time::timeout(limit, peer.write_all(chunk)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
    }
}

/// Relay data between `client` and `target`
///
/// Waits for readability on both streams at once, reads at most one chunk
/// from the ready side and writes all of it to the other side before waiting
/// again, so at most one chunk per direction is ever buffered. The streams
/// are shut down on return; closing them is left to the caller.
pub async fn relay<A, B>(client: &mut A, target: &mut B, opts: RelayOptions) -> RelayOutcome
where
    A: AsyncRead + AsyncWrite + Unpin + ?Sized,
    B: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let mut client_buf = vec![0u8; opts.buffer_size];
    let mut target_buf = vec![0u8; opts.buffer_size];
    let mut client_to_target = 0u64;
    let mut target_to_client = 0u64;

    let end = loop {
        let ready = tokio::select! {
            r = client.read(&mut client_buf) => Ready::Client(r),
            r = target.read(&mut target_buf) => Ready::Target(r),
            _ = tokio::time::sleep(opts.idle_timeout) => Ready::Idle,
        };

        match ready {
            Ready::Client(Ok(0)) => break RelayEnd::ClientClosed,
            Ready::Client(Ok(n)) => {
                if let Err(e) = forward(target, &client_buf[..n], opts.idle_timeout).await {
                    debug!("client->target write failed: {}", e);
                    break RelayEnd::TargetError;
                }
                client_to_target += n as u64;
            }
            Ready::Client(Err(e)) => {
                debug!("client read failed: {}", e);
                break RelayEnd::ClientError;
            }
            Ready::Target(Ok(0)) => break RelayEnd::TargetClosed,
            Ready::Target(Ok(n)) => {
                if let Err(e) = forward(client, &target_buf[..n], opts.idle_timeout).await {
                    debug!("target->client write failed: {}", e);
                    break RelayEnd::ClientError;
                }
                target_to_client += n as u64;
            }
            Ready::Target(Err(e)) => {
                debug!("target read failed: {}", e);
                break RelayEnd::TargetError;
            }
            Ready::Idle => break RelayEnd::IdleTimeout,
        }
    };

    // Best effort: either side may already be gone.
    let grace = Duration::from_secs(1);
    let _ = tokio::time::timeout(grace, client.shutdown()).await;
    let _ = tokio::time::timeout(grace, target.shutdown()).await;

    debug!(
        "Relay finished ({}): {} bytes up, {} bytes down",
        end, client_to_target, target_to_client
    );

    RelayOutcome {
        end,
        client_to_target,
        target_to_client,
    }
}
