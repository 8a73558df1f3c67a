//! SOCKS5 wire codec
//!
//! Reads and writes the fixed binary layouts of the greeting, the
//! username/password sub-negotiation, the request and the reply. Every
//! read is fixed-size or length-prefixed; a stream that ends early is
//! reported as [`SocksError::ConnectionClosed`], never as a partial value.

use super::consts::*;
use super::types::{AddressSpec, RequestHeader};
use crate::error::{Socks5ReplyCode, SocksError};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bound address reported in every reply
pub const UNSPECIFIED_BOUND: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);

/// Client greeting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Protocol version byte
    pub version: u8,
    /// Offered authentication method ids
    pub methods: Vec<u8>,
}

/// Raw RFC 1929 credentials as sent by the client
#[derive(Clone, PartialEq, Eq)]
pub struct UserPass {
    /// Username bytes
    pub username: Vec<u8>,
    /// Password bytes
    pub password: Vec<u8>,
}

impl std::fmt::Debug for UserPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserPass")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("password", &"<redacted>")
            .finish()
    }
}

async fn read_u8<S: AsyncRead + Unpin>(stream: &mut S) -> Result<u8, SocksError> {
    let mut buf = [0u8; 1];
    stream.read_exact(&mut buf).await?;
    Ok(buf[0])
}

async fn read_vec<S: AsyncRead + Unpin>(stream: &mut S, len: usize) -> Result<Vec<u8>, SocksError> {
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}

async fn write_flush<S: AsyncWrite + Unpin>(stream: &mut S, bytes: &[u8]) -> Result<(), SocksError> {
    stream.write_all(bytes).await?;
    stream.flush().await?;
    Ok(())
}

/// Read the client greeting
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
///
/// A version other than 5 fails before the method list is read.
pub async fn read_greeting<S>(stream: &mut S) -> Result<Greeting, SocksError>
where
    S: AsyncRead + Unpin,
{
    let version = read_u8(stream).await?;
    if version != SOCKS5_VERSION {
        return Err(SocksError::Protocol(format!(
            "Unsupported SOCKS version: {}",
            version
        )));
    }

    let nmethods = read_u8(stream).await? as usize;
    let methods = read_vec(stream, nmethods).await?;

    Ok(Greeting { version, methods })
}

/// Write the method selection reply
pub async fn write_method_selection<S>(stream: &mut S, method: u8) -> Result<(), SocksError>
where
    S: AsyncWrite + Unpin,
{
    write_flush(stream, &[SOCKS5_VERSION, method]).await
}

/// Read an RFC 1929 username/password request
///
/// ```text
/// +----+------+----------+------+----------+
/// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
/// +----+------+----------+------+----------+
/// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
/// +----+------+----------+------+----------+
/// ```
pub async fn read_auth_user_pass<S>(stream: &mut S) -> Result<UserPass, SocksError>
where
    S: AsyncRead + Unpin,
{
    let version = read_u8(stream).await?;
    if version != SOCKS5_AUTH_VERSION {
        return Err(SocksError::Protocol(format!(
            "Invalid auth version: {}",
            version
        )));
    }

    let username_len = read_u8(stream).await? as usize;
    let username = read_vec(stream, username_len).await?;

    let password_len = read_u8(stream).await? as usize;
    let password = read_vec(stream, password_len).await?;

    Ok(UserPass { username, password })
}

/// Write the username/password sub-negotiation status
pub async fn write_auth_result<S>(stream: &mut S, ok: bool) -> Result<(), SocksError>
where
    S: AsyncWrite + Unpin,
{
    let status = if ok {
        SOCKS5_AUTH_STATUS_SUCCESS
    } else {
        SOCKS5_AUTH_STATUS_FAILURE
    };
    write_flush(stream, &[SOCKS5_AUTH_VERSION, status]).await
}

/// Read the fixed request header: VER CMD RSV ATYP
pub async fn read_request<S>(stream: &mut S) -> Result<RequestHeader, SocksError>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;

    Ok(RequestHeader {
        version: header[0],
        command: header[1],
        addr_type: header[3],
    })
}

/// Read a destination address of the given type, followed by its port
///
/// The only failure besides a short read is an unknown address type.
pub async fn read_address<S>(stream: &mut S, addr_type: u8) -> Result<AddressSpec, SocksError>
where
    S: AsyncRead + Unpin,
{
    match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let mut octets = [0u8; 4];
            stream.read_exact(&mut octets).await?;
            let port = read_port(stream).await?;
            Ok(AddressSpec::Ipv4(Ipv4Addr::from(octets), port))
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            // Any bytes, even none, are passed on; the resolver decides.
            let len = read_u8(stream).await? as usize;
            let domain = read_vec(stream, len).await?;
            let port = read_port(stream).await?;
            Ok(AddressSpec::Domain(domain, port))
        }

        SOCKS5_ADDR_TYPE_IPV6 => {
            let mut octets = [0u8; 16];
            stream.read_exact(&mut octets).await?;
            let port = read_port(stream).await?;
            Ok(AddressSpec::Ipv6(Ipv6Addr::from(octets), port))
        }

        other => Err(SocksError::UnsupportedAddressType(other)),
    }
}

/// Read a port in network byte order
pub async fn read_port<S>(stream: &mut S) -> Result<u16, SocksError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf).await?;
    Ok(u16::from_be_bytes(buf))
}

/// Encode a reply
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   |    4     |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
pub fn encode_reply(code: Socks5ReplyCode, bound: SocketAddrV4) -> [u8; SOCKS5_REPLY_LEN] {
    let mut reply = [0u8; SOCKS5_REPLY_LEN];
    reply[0] = SOCKS5_VERSION;
    reply[1] = code.into();
    reply[2] = SOCKS5_RESERVED;
    reply[3] = SOCKS5_ADDR_TYPE_IPV4;
    reply[4..8].copy_from_slice(&bound.ip().octets());
    reply[8..10].copy_from_slice(&bound.port().to_be_bytes());
    reply
}

/// Write a reply
pub async fn write_reply<S>(
    stream: &mut S,
    code: Socks5ReplyCode,
    bound: SocketAddrV4,
) -> Result<(), SocksError>
where
    S: AsyncWrite + Unpin,
{
    write_flush(stream, &encode_reply(code, bound)).await
}
