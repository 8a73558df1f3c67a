//! SOCKS5 type definitions
//!
//! Defines the core types used in SOCKS5 protocol handling.

use super::consts::*;
use crate::error::SocksError;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

/// SOCKS5 command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - wait for incoming connection (not implemented)
    Bind,
    /// UDP ASSOCIATE - establish UDP relay (not implemented)
    UdpAssociate,
}

impl SocksCommand {
    /// Parse a command byte into SocksCommand
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_CMD_TCP_CONNECT => Some(SocksCommand::Connect),
            SOCKS5_CMD_TCP_BIND => Some(SocksCommand::Bind),
            SOCKS5_CMD_UDP_ASSOCIATE => Some(SocksCommand::UdpAssociate),
            _ => None,
        }
    }

    /// Convert SocksCommand to byte
    pub fn to_byte(self) -> u8 {
        match self {
            SocksCommand::Connect => SOCKS5_CMD_TCP_CONNECT,
            SocksCommand::Bind => SOCKS5_CMD_TCP_BIND,
            SocksCommand::UdpAssociate => SOCKS5_CMD_UDP_ASSOCIATE,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::UdpAssociate => write!(f, "UDP ASSOCIATE"),
        }
    }
}

/// The fixed four-byte request header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Protocol version byte
    pub version: u8,
    /// Raw command byte
    pub command: u8,
    /// Raw address type byte
    pub addr_type: u8,
}

/// Target address parsed from a SOCKS5 request
///
/// Immutable once parsed. Domain names are kept as the raw bytes the
/// client sent, unresolved, so the resolver can classify lookup failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSpec {
    /// IPv4 address with port
    Ipv4(Ipv4Addr, u16),
    /// IPv6 address with port
    Ipv6(Ipv6Addr, u16),
    /// Domain name bytes with port
    Domain(Vec<u8>, u16),
}

impl AddressSpec {
    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            AddressSpec::Ipv4(_, port) | AddressSpec::Ipv6(_, port) => *port,
            AddressSpec::Domain(_, port) => *port,
        }
    }

    /// Get the address type byte for SOCKS5 protocol
    pub fn addr_type(&self) -> u8 {
        match self {
            AddressSpec::Ipv4(..) => SOCKS5_ADDR_TYPE_IPV4,
            AddressSpec::Ipv6(..) => SOCKS5_ADDR_TYPE_IPV6,
            AddressSpec::Domain(..) => SOCKS5_ADDR_TYPE_DOMAIN,
        }
    }

    /// The socket address for literal IP targets, `None` for domains
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            AddressSpec::Ipv4(ip, port) => Some(SocketAddr::from((*ip, *port))),
            AddressSpec::Ipv6(ip, port) => Some(SocketAddr::from((*ip, *port))),
            AddressSpec::Domain(..) => None,
        }
    }

    /// Domain name as text, if it is valid UTF-8
    pub fn domain(&self) -> Option<&str> {
        match self {
            AddressSpec::Domain(name, _) => std::str::from_utf8(name).ok(),
            _ => None,
        }
    }

    /// Serialize the address to bytes for SOCKS5 protocol
    ///
    /// Fails for a domain longer than the 255 bytes its length prefix can
    /// describe.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SocksError> {
        let mut bytes = vec![self.addr_type()];

        match self {
            AddressSpec::Ipv4(ip, _) => bytes.extend_from_slice(&ip.octets()),
            AddressSpec::Ipv6(ip, _) => bytes.extend_from_slice(&ip.octets()),
            AddressSpec::Domain(domain, _) => {
                let len = u8::try_from(domain.len()).map_err(|_| {
                    SocksError::Protocol(format!("Domain name too long: {} bytes", domain.len()))
                })?;
                bytes.push(len);
                bytes.extend_from_slice(domain);
            }
        }
        bytes.extend_from_slice(&self.port().to_be_bytes());

        Ok(bytes)
    }
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpec::Ipv4(ip, port) => write!(f, "{}:{}", ip, port),
            AddressSpec::Ipv6(ip, port) => write!(f, "[{}]:{}", ip, port),
            AddressSpec::Domain(domain, port) => {
                write!(f, "{}:{}", String::from_utf8_lossy(domain), port)
            }
        }
    }
}

impl From<SocketAddr> for AddressSpec {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => AddressSpec::Ipv4(*v4.ip(), v4.port()),
            SocketAddr::V6(v6) => AddressSpec::Ipv6(*v6.ip(), v6.port()),
        }
    }
}
